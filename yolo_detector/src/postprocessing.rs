use crate::{bounding_box::BoundingBox, detector::DetectorError, preprocessing::Letterbox};
use ndarray::{s, ArrayViewD, Axis, Ix2};

/// Decodes a YOLOv8 `[1, 4 + classes, candidates]` output into boxes in
/// original frame coordinates.
pub fn extract_boxes(
    output: ArrayViewD<f32>,
    letterbox: &Letterbox,
    min_probability: f32,
) -> Result<Vec<BoundingBox>, DetectorError> {
    let shape = output.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
        return Err(DetectorError::UnexpectedOutput(format!(
            "expected [1, 4 + classes, candidates], got {:?}",
            shape
        )));
    }

    let view = output
        .index_axis(Axis(0), 0)
        .into_dimensionality::<Ix2>()
        .map_err(|e| DetectorError::UnexpectedOutput(e.to_string()))?;
    let num_candidates = view.shape()[1];
    let mut boxes = Vec::new();

    for i in 0..num_candidates {
        let scores = view.slice(s![4.., i]);
        let Some((class_id, &prob)) = scores
            .indexed_iter()
            .filter(|(_, score)| !score.is_nan())
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };

        if prob < min_probability {
            continue;
        }

        let xc = view[[0, i]];
        let yc = view[[1, i]];
        let w = view[[2, i]];
        let h = view[[3, i]];

        boxes.push(BoundingBox {
            class_id,
            confidence: prob,
            x1: letterbox.unmap_x(xc - w / 2.),
            y1: letterbox.unmap_y(yc - h / 2.),
            x2: letterbox.unmap_x(xc + w / 2.),
            y2: letterbox.unmap_y(yc + h / 2.),
        });
    }

    Ok(boxes)
}

/// Greedy per-class NMS, highest confidence first.
pub fn non_max_suppression(mut boxes: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));
    let mut result: Vec<BoundingBox> = Vec::new();

    for candidate in boxes {
        let suppressed = result.iter().any(|kept| {
            kept.class_id == candidate.class_id && kept.iou(&candidate) >= iou_threshold
        });
        if !suppressed {
            result.push(candidate);
        }
    }

    result
}
