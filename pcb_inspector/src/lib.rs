mod annotate;
mod page;
mod prediction;
mod routes;
mod storage;
mod sweeper;
mod telemetry;

pub mod app;
pub mod config;
pub mod server;

pub use app::start_app;
pub use prediction::{DetectionStatus, PredictionError, PredictionOutcome, PredictionService};
pub use routes::{PredictImageError, IMAGE_FIELD};
pub use storage::{Artifact, ArtifactStore, StorageError};
pub use telemetry::Metrics;
