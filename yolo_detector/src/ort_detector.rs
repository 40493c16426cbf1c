use crate::{
    bounding_box::{BoundingBox, Detection},
    config::{ModelConfig, Validatable},
    detector::{Detector, DetectorError},
    labels::ClassLabels,
    postprocessing::{extract_boxes, non_max_suppression},
    preprocessing::letterbox_frame,
};
use image::{DynamicImage, GenericImageView};
use ndarray::{Array, ArrayD, IxDyn, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};
use tracing::instrument;

const OUTPUT_NAME: &str = "output0";

/// YOLOv8 detector backed by a pool of ONNX Runtime sessions.
pub struct OrtDetector {
    sessions: Vec<Mutex<Session>>,
    counter: AtomicUsize,
    labels: ClassLabels,
    input_size: u32,
    min_probability: f32,
    iou_threshold: f32,
}

impl OrtDetector {
    pub fn new(model_config: &ModelConfig, labels: ClassLabels) -> Result<Self, DetectorError> {
        model_config
            .validate()
            .map_err(DetectorError::Configuration)?;
        if model_config.input_size == 0 {
            return Err(DetectorError::Configuration(
                "input_size must be positive".to_string(),
            ));
        }

        ort::init().with_name("yolo_detector").commit()?;

        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_path())?;
                Ok(Mutex::new(session))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            num_instances,
            model_config.get_path()
        );

        Ok(Self {
            sessions,
            counter: AtomicUsize::new(0),
            labels,
            input_size: model_config.input_size,
            min_probability: model_config.min_probability,
            iou_threshold: model_config.iou_threshold,
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<ArrayD<f32>, DetectorError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| DetectorError::SessionPoisoned(e.to_string()))?;

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.as_standard_layout().to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)?;
        let outputs = session.run(ort::inputs![tensor_ref])?;

        let (shape, data) = outputs[OUTPUT_NAME].try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();

        ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
            .map_err(|e| DetectorError::UnexpectedOutput(format!("invalid tensor shape: {}", e)))
    }

    fn label(&self, bbox: BoundingBox) -> Detection {
        let color_label = self.labels.resolve(bbox.class_id);
        Detection {
            x1: bbox.x1,
            y1: bbox.y1,
            x2: bbox.x2,
            y2: bbox.y2,
            class_id: bbox.class_id,
            class_label: color_label.label,
            red: color_label.red,
            green: color_label.green,
            blue: color_label.blue,
            confidence: bbox.confidence,
        }
    }
}

impl Detector for OrtDetector {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    #[instrument(skip(self, frame))]
    fn detect(&self, frame: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let (input, letterbox) = letterbox_frame(frame, self.input_size);
        let outputs = self.run_inference(&input)?;

        let boxes = extract_boxes(outputs.view(), &letterbox, self.min_probability)?;
        let detections: Vec<Detection> = non_max_suppression(boxes, self.iou_threshold)
            .into_iter()
            .map(|bbox| self.label(bbox))
            .collect();

        tracing::debug!("Returning {} detections", detections.len());
        for (i, detection) in detections.iter().enumerate() {
            tracing::debug!(
                "Detection {}: class={}, confidence={:.3}, bbox=({:.1}, {:.1}, {:.1}, {:.1})",
                i,
                detection.class_label,
                detection.confidence,
                detection.x1,
                detection.y1,
                detection.x2,
                detection.y2
            );
        }

        Ok(detections)
    }
}
