use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PredictionError>;

/// Error taxonomy for the prediction pipeline.
///
/// Malformed individual field values are deliberately NOT represented here:
/// they are absorbed by the feature builder's coercion (unparseable → 0.0)
/// so a single bad field never blocks a response. Only structural problems
/// (artifact/schema drift) and inference-engine faults surface to callers.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Feature width mismatch: expected {expected} columns, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Model artifact error: {0}")]
    Artifact(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for PredictionError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        HttpResponse::build(code).json(ErrorResponse {
            error: self.to_string(),
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            PredictionError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
