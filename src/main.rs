use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use student_outcome_service::{api, Config, Predictor};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!("Starting {}", config.service.service_name);

    // The artifact is loaded once and fixed for the process lifetime. If
    // neither the optimized nor the original artifact loads, refuse to
    // start serving.
    let predictor = Predictor::load(&config.model).context("Failed to load a model artifact")?;
    info!(
        "Serving {} schema model: {}",
        predictor.variant().as_str(),
        predictor.version_label()
    );

    let predictor = web::Data::new(predictor);
    let port = config.service.http_port;
    info!("HTTP server listening on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        App::new()
            .app_data(predictor.clone())
            .configure(api::configure_routes)
    })
    .bind(("0.0.0.0", port))
    .with_context(|| format!("Failed to bind port {}", port))?
    .run()
    .await
    .context("HTTP server error")
}
