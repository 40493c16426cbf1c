mod bounding_box;
mod detector;
mod labels;
mod ort_detector;
mod postprocessing;
mod preprocessing;

pub mod config;

pub use bounding_box::{BoundingBox, Detection};
pub use detector::{Detector, DetectorError};
pub use labels::{ClassLabels, ColorLabel, LabelsError};
pub use ort_detector::OrtDetector;
pub use preprocessing::{letterbox_frame, Letterbox};
