use std::{error::Error, fmt};

use actix_web::{HttpResponse, ResponseError, error::BlockingError, http::StatusCode};
use fgsm::FgsmErr;
use image::ImageError;
use machine_learning::MlErr;
use serde_json::json;

/// Failures of the HTTP endpoints. They are rendered as `{"detail": "<message>"}`.
#[derive(Debug)]
pub enum ServerErr {
    BadImage(ImageError),
    BadForm(String),
    Attack(FgsmErr),
    Encode(ImageError),
    Blocking(BlockingError),
}

impl fmt::Display for ServerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerErr::BadImage(e) => write!(f, "could not decode image: {e}"),
            ServerErr::BadForm(msg) => write!(f, "invalid form: {msg}"),
            ServerErr::Attack(e) => write!(f, "{e}"),
            ServerErr::Encode(e) => write!(f, "could not encode adversarial image: {e}"),
            ServerErr::Blocking(e) => write!(f, "attack task failed: {e}"),
        }
    }
}

impl Error for ServerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServerErr::BadImage(e) | ServerErr::Encode(e) => Some(e),
            ServerErr::Attack(e) => Some(e),
            _ => None,
        }
    }
}

impl ResponseError for ServerErr {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerErr::BadImage(_)
            | ServerErr::BadForm(_)
            | ServerErr::Attack(FgsmErr::InvalidEpsilon(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.to_string() }))
    }
}

impl From<FgsmErr> for ServerErr {
    fn from(e: FgsmErr) -> Self {
        ServerErr::Attack(e)
    }
}

impl From<MlErr> for ServerErr {
    fn from(e: MlErr) -> Self {
        ServerErr::Attack(FgsmErr::Ml(e))
    }
}

impl From<BlockingError> for ServerErr {
    fn from(e: BlockingError) -> Self {
        ServerErr::Blocking(e)
    }
}
