pub mod config;
mod error;
pub mod handlers;
pub mod imaging;

use actix_multipart::form::MultipartFormConfig;
use actix_web::web;

pub use error::ServerErr;

/// Registers the API routes. The app must also carry a `web::Data<Classifier>` and, to get
/// `{"detail": ..}` bodies on malformed uploads, the `form_config` below.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::health))
        .route("/attack", web::post().to(handlers::attack));
}

/// Limits uploads to `max_upload_bytes` and renders form errors like every other API error.
pub fn form_config(max_upload_bytes: usize) -> MultipartFormConfig {
    MultipartFormConfig::default()
        .memory_limit(max_upload_bytes)
        .total_limit(max_upload_bytes)
        .error_handler(|e, _| ServerErr::BadForm(e.to_string()).into())
}
