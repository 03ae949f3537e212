use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub http_port: u16,
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Optimized (extended-schema) artifact, preferred at startup.
    pub optimized_path: String,
    /// Original (base-schema) artifact, the startup fallback.
    pub original_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Config {
            service: ServiceConfig {
                http_port: env::var("PORT")
                    .unwrap_or_else(|_| "9696".to_string())
                    .parse()
                    .expect("PORT must be a valid u16"),
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "student-outcome-service".to_string()),
            },
            model: ModelConfig {
                optimized_path: env::var("MODEL_OPTIMIZED_PATH")
                    .unwrap_or_else(|_| "models/model_optimized.json".to_string()),
                original_path: env::var("MODEL_ORIGINAL_PATH")
                    .unwrap_or_else(|_| "models/model_original.json".to_string()),
            },
        }
    }
}
