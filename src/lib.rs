pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{PredictionError, Result};
pub use services::predictor::Predictor;
