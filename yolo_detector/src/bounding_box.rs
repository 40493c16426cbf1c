#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub class_id: usize,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let width = self.x2.min(other.x2) - self.x1.max(other.x1);
        let height = self.y2.min(other.y2) - self.y1.max(other.y1);
        width.max(0.0) * height.max(0.0)
    }

    pub fn union(&self, other: &BoundingBox) -> f32 {
        self.area() + other.area() - self.intersection(other)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let union = self.union(other);
        if union <= 0.0 {
            return 0.0;
        }
        self.intersection(other) / union
    }
}

/// A box resolved against the class labels, in original image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_id: usize,
    pub class_label: String,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox {
            class_id: 0,
            confidence: 1.0,
            x1,
            y1,
            x2,
            y2,
        }
    }

    #[test]
    fn test_iou_of_overlapping_boxes() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 0.0, 15.0, 10.0);

        assert_eq!(a.intersection(&b), 50.0);
        assert_eq!(a.union(&b), 150.0);
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_disjoint_boxes_do_not_intersect() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(20.0, 20.0, 30.0, 30.0);

        assert_eq!(a.intersection(&b), 0.0);
        assert_eq!(a.iou(&b), 0.0);
    }
}
