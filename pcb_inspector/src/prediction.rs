use crate::{
    annotate::render_overlay,
    storage::{Artifact, ArtifactStore, StorageError},
};
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::{fmt, io::Cursor, sync::Arc};
use thiserror::Error;
use tracing::instrument;
use yolo_detector::{Detection, Detector, DetectorError};

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Failed to decode image: {0}")]
    InvalidImage(#[source] image::ImageError),
    #[error("Detector failed: {0}")]
    Detector(#[from] DetectorError),
    #[error("Failed to store annotated image: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStatus {
    ObjectsDetected,
    NoObjectsDetected,
}

impl DetectionStatus {
    pub fn from_detections(detections: &[Detection]) -> Self {
        if detections.is_empty() {
            DetectionStatus::NoObjectsDetected
        } else {
            DetectionStatus::ObjectsDetected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionStatus::ObjectsDetected => "Objects Detected",
            DetectionStatus::NoObjectsDetected => "No Objects Detected",
        }
    }
}

impl fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub status: DetectionStatus,
    pub detections: Vec<Detection>,
    pub artifact: Artifact,
}

/// Decode, detect, annotate and store one uploaded image.
pub struct PredictionService {
    detector: Arc<dyn Detector>,
    store: Arc<ArtifactStore>,
}

impl PredictionService {
    pub fn new(detector: Arc<dyn Detector>, store: Arc<ArtifactStore>) -> Self {
        Self { detector, store }
    }

    pub fn store(&self) -> Arc<ArtifactStore> {
        self.store.clone()
    }

    /// Runs the whole pipeline on the calling thread. Inference blocks.
    #[instrument(skip(self, image_data), fields(bytes = image_data.len()))]
    pub fn predict(&self, image_data: &[u8]) -> Result<PredictionOutcome, PredictionError> {
        let frame = decode_frame(image_data).map_err(PredictionError::InvalidImage)?;
        tracing::debug!(
            "Decoded {}x{} frame, running detector at {}",
            frame.width(),
            frame.height(),
            self.detector.input_size()
        );

        let detections = self.detector.detect(&frame)?;
        let status = DetectionStatus::from_detections(&detections);

        let annotated = render_overlay(&frame, &detections);
        let artifact = self.store.save(&annotated)?;

        tracing::info!(
            "{} ({} boxes), stored as {}",
            status,
            detections.len(),
            artifact.key
        );

        Ok(PredictionOutcome {
            status,
            detections,
            artifact,
        })
    }
}

/// Decodes an upload and applies its EXIF orientation, so phone photos are
/// inspected upright.
fn decode_frame(image_data: &[u8]) -> Result<DynamicImage, image::ImageError> {
    let mut decoder = ImageReader::new(Cursor::new(image_data))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .into_decoder()?;
    let orientation = decoder.orientation()?;

    let mut frame = DynamicImage::from_decoder(decoder)?;
    frame.apply_orientation(orientation);
    Ok(frame)
}
