use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::{Context, Result};
use fgsm::model::simple_cnn;
use log::info;
use machine_learning::Classifier;
use server::config::ServerConfig;

#[actix_rt::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = ServerConfig::from_env()?;

    let classifier = Classifier::from_checkpoint(&config.checkpoint, simple_cnn())
        .with_context(|| format!("loading checkpoint {}", config.checkpoint.display()))?;
    let classifier = web::Data::new(classifier);
    let max_upload_bytes = config.max_upload_bytes;

    let mut http = HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .app_data(classifier.clone())
            .app_data(server::form_config(max_upload_bytes))
            .configure(server::configure)
    });

    if let Some(workers) = config.workers {
        http = http.workers(workers.get());
    }

    let addr = (config.host.as_str(), config.port);
    info!("listening at {}:{}", addr.0, addr.1);
    http.bind(addr)?.run().await?;

    Ok(())
}
