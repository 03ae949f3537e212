use anyhow::Result;
use student_outcome_service::services::training::{run_training, TrainConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TrainConfig::from_env();
    let report = run_training(&config)?;

    info!(
        "Training complete: {} at {:.2}% held-out accuracy ({} candidates evaluated)",
        report.model_name,
        report.accuracy * 100.0,
        report.candidate_results.len()
    );
    Ok(())
}
