use crate::bounding_box::Detection;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Session mutex poisoned: {0}")]
    SessionPoisoned(String),
    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// An object detector running on a decoded frame.
///
/// Implementations are synchronous and may block for the whole inference;
/// callers on an async runtime should move the call onto a blocking thread.
pub trait Detector: Send + Sync + 'static {
    /// Side of the square the frame is letterboxed into before inference.
    fn input_size(&self) -> u32;

    fn detect(&self, frame: &DynamicImage) -> Result<Vec<Detection>, DetectorError>;
}
