//! HTTP surface: thin plumbing over the predictor. Parses the request
//! body, calls the core, renders its output as JSON.

use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::error::Result;
use crate::models::{PredictRequest, PredictResponse};
use crate::services::predictor::Predictor;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/predict", web::post().to(predict))
        .route("/health", web::get().to(health_check));
}

pub async fn predict(
    predictor: web::Data<Predictor>,
    body: web::Json<PredictRequest>,
) -> Result<HttpResponse> {
    let records = body.into_inner().into_records();
    let predictions = predictor.predict(&records)?;
    Ok(HttpResponse::Ok().json(PredictResponse {
        model_version: predictor.version_label(),
        predictions,
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
    })
}
