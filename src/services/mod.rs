pub mod artifact;
pub mod features;
pub mod predictor;
pub mod schema;
pub mod training;

pub use artifact::ModelArtifact;
pub use predictor::Predictor;
pub use schema::SchemaVariant;
