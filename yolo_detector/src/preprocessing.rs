use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::{Array, Ix4};

const PAD_VALUE: u8 = 114;

/// Geometry of a letterboxed frame, needed to map boxes back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub resized_width: u32,
    pub resized_height: u32,
    pub width: u32,
    pub height: u32,
}

impl Letterbox {
    pub fn new(width: u32, height: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / width as f32).min(input_size as f32 / height as f32);
        let resized_width = ((width as f32 * scale).round() as u32).clamp(1, input_size);
        let resized_height = ((height as f32 * scale).round() as u32).clamp(1, input_size);

        Self {
            scale,
            pad_x: (input_size - resized_width) / 2,
            pad_y: (input_size - resized_height) / 2,
            resized_width,
            resized_height,
            width,
            height,
        }
    }

    /// Maps an x coordinate from model input space to the original frame.
    pub fn unmap_x(&self, x: f32) -> f32 {
        ((x - self.pad_x as f32) / self.scale).clamp(0.0, self.width as f32)
    }

    pub fn unmap_y(&self, y: f32) -> f32 {
        ((y - self.pad_y as f32) / self.scale).clamp(0.0, self.height as f32)
    }
}

pub fn letterbox_frame(frame: &DynamicImage, input_size: u32) -> (Array<f32, Ix4>, Letterbox) {
    let (img_width, img_height) = frame.dimensions();
    let letterbox = Letterbox::new(img_width, img_height, input_size);
    let resized = frame
        .resize_exact(
            letterbox.resized_width,
            letterbox.resized_height,
            FilterType::Triangle,
        )
        .to_rgb8();

    let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([PAD_VALUE; 3]));
    image::imageops::overlay(
        &mut canvas,
        &resized,
        letterbox.pad_x as i64,
        letterbox.pad_y as i64,
    );

    let size = input_size as usize;
    let mut input = Array::zeros((1, 3, size, size));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    (input, letterbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_letterbox_wide_frame() {
        let letterbox = Letterbox::new(832, 416, 416);

        assert_eq!(letterbox.scale, 0.5);
        assert_eq!((letterbox.resized_width, letterbox.resized_height), (416, 208));
        assert_eq!(letterbox.pad_x, 0);
        assert_eq!(letterbox.pad_y, 104);
    }

    #[test]
    fn test_unmap_round_trips_through_padding() {
        let letterbox = Letterbox::new(832, 416, 416);

        assert_eq!(letterbox.unmap_x(208.0), 416.0);
        assert_eq!(letterbox.unmap_y(104.0), 0.0);
        assert_eq!(letterbox.unmap_y(312.0), 416.0);
        // Coordinates falling in the padding clamp to the frame.
        assert_eq!(letterbox.unmap_y(0.0), 0.0);
        assert_eq!(letterbox.unmap_y(416.0), 416.0);
    }

    #[test]
    fn test_letterbox_frame() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 50, Rgb([255, 0, 0]));
        let frame = DynamicImage::ImageRgb8(img);

        let (input, letterbox) = letterbox_frame(&frame, 416);

        assert_eq!(input.shape(), &[1, 3, 416, 416]);
        assert_eq!(letterbox.width, 100);
        assert_eq!(letterbox.height, 50);
        assert_eq!(letterbox.pad_y, 104);

        // Padding rows are grey, the centre is the red frame.
        let grey = PAD_VALUE as f32 / 255.;
        assert_eq!(input[[0, 0, 0, 0]], grey);
        assert!((input[[0, 0, 208, 208]] - 1.0).abs() < 0.01);
        assert!(input[[0, 1, 208, 208]] < 0.01);
    }
}
