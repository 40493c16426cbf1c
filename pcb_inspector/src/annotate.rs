use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use yolo_detector::Detection;

const GLYPH_SIZE: u32 = 8;

/// Draws every detection on a copy of the frame: a rectangle in its class
/// colour and a `label: confidence` tab above it.
pub fn render_overlay(frame: &DynamicImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = frame.to_rgb8();
    let thickness = line_thickness(canvas.width(), canvas.height());

    for detection in detections {
        let color = Rgb([detection.red, detection.green, detection.blue]);
        let Some(corners) = clamp_corners(
            &canvas,
            (detection.x1, detection.y1, detection.x2, detection.y2),
        ) else {
            continue;
        };
        let label = format!("{}: {:.2}", detection.class_label, detection.confidence);

        draw_rectangle(&mut canvas, corners, color, thickness);
        draw_label(&mut canvas, &label, (corners.0, corners.1), color, thickness);
    }

    canvas
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)?;
    Ok(buf)
}

// Scales with the frame so boxes stay visible on large boards.
fn line_thickness(width: u32, height: u32) -> u32 {
    ((((width + height) as f32) / 2.0 * 0.003).round() as u32).max(2)
}

/// Orders and clamps box corners to pixel coordinates inside the canvas.
fn clamp_corners(
    canvas: &RgbImage,
    corners: (f32, f32, f32, f32),
) -> Option<(u32, u32, u32, u32)> {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let clamp = |value: f32, max: u32| value.max(0.0).min((max - 1) as f32) as u32;
    Some((
        clamp(corners.0.min(corners.2), width),
        clamp(corners.1.min(corners.3), height),
        clamp(corners.0.max(corners.2), width),
        clamp(corners.1.max(corners.3), height),
    ))
}

fn draw_rectangle(
    canvas: &mut RgbImage,
    (x1, y1, x2, y2): (u32, u32, u32, u32),
    color: Rgb<u8>,
    thickness: u32,
) {
    let t = thickness.saturating_sub(1);
    fill_rect(canvas, x1, y1, x2, (y1 + t).min(y2), color);
    fill_rect(canvas, x1, y2.saturating_sub(t).max(y1), x2, y2, color);
    fill_rect(canvas, x1, y1, (x1 + t).min(x2), y2, color);
    fill_rect(canvas, x2.saturating_sub(t).max(x1), y1, x2, y2, color);
}

/// Draws `text` on a tab filled with the box colour, sitting on top of the
/// box's upper-left corner. When the box touches the top edge the tab goes
/// inside the box instead.
fn draw_label(
    canvas: &mut RgbImage,
    text: &str,
    (x1, y1): (u32, u32),
    color: Rgb<u8>,
    thickness: u32,
) {
    let (width, height) = canvas.dimensions();
    let scale = (thickness / 2).max(1);
    let pad = scale;
    let glyph = GLYPH_SIZE * scale;
    let tab_height = glyph + 2 * pad;
    let tab_width = text.chars().count() as u32 * glyph + 2 * pad;

    let top = if y1 >= tab_height { y1 - tab_height } else { y1 };
    let right = (x1 + tab_width - 1).min(width - 1);
    let bottom = (top + tab_height - 1).min(height - 1);
    fill_rect(canvas, x1, top, right, bottom, color);

    let ink = text_color(color);
    for (index, c) in text.chars().enumerate() {
        let Some(rows) = BASIC_FONTS.get(c) else {
            continue;
        };
        let origin_x = x1 + pad + index as u32 * glyph;
        let origin_y = top + pad;

        for (row, bits) in rows.iter().enumerate() {
            for column in 0..GLYPH_SIZE {
                if bits & (1 << column) == 0 {
                    continue;
                }
                let x = origin_x + column * scale;
                let y = origin_y + row as u32 * scale;
                if x > right || y > bottom {
                    continue;
                }
                fill_rect(
                    canvas,
                    x,
                    y,
                    (x + scale - 1).min(right),
                    (y + scale - 1).min(bottom),
                    ink,
                );
            }
        }
    }
}

// White on dark class colours, black on light ones.
fn text_color(background: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = background.0;
    let luminance = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    if luminance < 128.0 {
        Rgb([255, 255, 255])
    } else {
        Rgb([0, 0, 0])
    }
}

// Inclusive bounds, already clamped to the canvas.
fn fill_rect(canvas: &mut RgbImage, x1: u32, y1: u32, x2: u32, y2: u32, color: Rgb<u8>) {
    for y in y1..=y2 {
        for x in x1..=x2 {
            canvas.put_pixel(x, y, color);
        }
    }
}
