//! Image preprocessing for the hand landmark pipeline

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use ndarray::Array4;
use anyhow::Result;

/// Input size of the palm detection model
pub const PALM_INPUT_SIZE: (u32, u32) = (192, 192);

/// Input size of the hand landmark model
pub const LANDMARK_INPUT_SIZE: (u32, u32) = (224, 224);

/// Letterbox the image to the palm detector input and convert to NCHW
pub fn preprocess_for_palm(image: &DynamicImage) -> (Array4<f32>, ResizeInfo) {
    let (target_w, target_h) = PALM_INPUT_SIZE;
    let resize_info = ResizeInfo::new(image.dimensions(), PALM_INPUT_SIZE);

    let resized = resize_with_padding(image, target_w, target_h);
    (image_to_nchw(&resized.to_rgb8()), resize_info)
}

/// Resize image with padding to maintain aspect ratio
fn resize_with_padding(image: &DynamicImage, target_w: u32, target_h: u32) -> DynamicImage {
    let (orig_w, orig_h) = image.dimensions();

    let scale = f32::min(
        target_w as f32 / orig_w as f32,
        target_h as f32 / orig_h as f32,
    );

    let new_w = ((orig_w as f32 * scale) as u32).clamp(1, target_w);
    let new_h = ((orig_h as f32 * scale) as u32).clamp(1, target_h);

    let resized = image.resize_exact(new_w, new_h, image::imageops::FilterType::Triangle);

    let mut padded = ImageBuffer::from_pixel(target_w, target_h, Rgb([0u8, 0, 0]));

    // Center the image
    let offset_x = (target_w - new_w) / 2;
    let offset_y = (target_h - new_h) / 2;

    image::imageops::replace(&mut padded, &resized.to_rgb8(), offset_x as i64, offset_y as i64);

    DynamicImage::ImageRgb8(padded)
}

/// Convert an RGB image to a 1x3xHxW tensor scaled to [0, 1]
pub fn image_to_nchw(rgb: &RgbImage) -> Array4<f32> {
    let (width, height) = rgb.dimensions();

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
        tensor[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
        tensor[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
    }

    tensor
}

/// A rotated rectangle in original image pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    /// Clockwise rotation in radians
    pub rotation: f32,
}

impl RotatedRect {
    /// Map a point given in output crop coordinates, normalized to [0, 1],
    /// back to image pixels
    pub fn to_image(&self, u: f32, v: f32) -> (f32, f32) {
        let lx = (u - 0.5) * self.width;
        let ly = (v - 0.5) * self.height;
        let (sin, cos) = self.rotation.sin_cos();
        (
            self.center_x + lx * cos - ly * sin,
            self.center_y + lx * sin + ly * cos,
        )
    }
}

/// Sample a rotated rectangle of the image into an `out_width` x `out_height` crop.
/// Pixels falling outside the source are left black.
pub fn warp_rotated_rect(
    image: &RgbImage,
    rect: &RotatedRect,
    out_width: u32,
    out_height: u32,
) -> RgbImage {
    let mut output = ImageBuffer::from_pixel(out_width, out_height, Rgb([0u8, 0, 0]));
    if image.width() < 2 || image.height() < 2 {
        return output;
    }

    for y in 0..out_height {
        for x in 0..out_width {
            let u = (x as f32 + 0.5) / out_width as f32;
            let v = (y as f32 + 0.5) / out_height as f32;
            let (src_x, src_y) = rect.to_image(u, v);

            // Bilinear interpolation
            if src_x >= 0.0 && src_x < (image.width() - 1) as f32
                && src_y >= 0.0 && src_y < (image.height() - 1) as f32
            {
                let x0 = src_x as u32;
                let y0 = src_y as u32;
                let fx = src_x - x0 as f32;
                let fy = src_y - y0 as f32;

                let p00 = image.get_pixel(x0, y0);
                let p01 = image.get_pixel(x0, y0 + 1);
                let p10 = image.get_pixel(x0 + 1, y0);
                let p11 = image.get_pixel(x0 + 1, y0 + 1);

                let mut pixel = [0u8; 3];
                for c in 0..3 {
                    let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
                        + p10[c] as f32 * fx * (1.0 - fy)
                        + p01[c] as f32 * (1.0 - fx) * fy
                        + p11[c] as f32 * fx * fy;
                    pixel[c] = v.clamp(0.0, 255.0) as u8;
                }

                output.put_pixel(x, y, Rgb(pixel));
            }
        }
    }

    output
}

/// Decode image from bytes with EXIF orientation handling
/// This ensures images are correctly oriented regardless of how they were captured
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(data)?;
    Ok(apply_exif_orientation(data, image))
}

/// Apply EXIF orientation to correct image rotation
/// Mobile phones often store images with EXIF orientation tags instead of rotating pixels
fn apply_exif_orientation(data: &[u8], image: DynamicImage) -> DynamicImage {
    use std::io::Cursor;

    let orientation = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
        Ok(exif_data) => exif_data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1),
        Err(_) => 1,
    };

    // See: https://exiftool.org/TagNames/EXIF.html (Orientation)
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Letterbox geometry used to map detector output back to the original image
pub struct ResizeInfo {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl ResizeInfo {
    pub fn new(original: (u32, u32), target: (u32, u32)) -> Self {
        let (orig_w, orig_h) = original;
        let (target_w, target_h) = target;

        let scale = f32::min(
            target_w as f32 / orig_w as f32,
            target_h as f32 / orig_h as f32,
        );

        let new_w = ((orig_w as f32 * scale) as u32).clamp(1, target_w);
        let new_h = ((orig_h as f32 * scale) as u32).clamp(1, target_h);

        Self {
            scale,
            offset_x: (target_w - new_w) / 2,
            offset_y: (target_h - new_h) / 2,
        }
    }

    /// Convert letterboxed model coordinates back to original image pixels
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let x = (x - self.offset_x as f32) / self.scale;
        let y = (y - self.offset_y as f32) / self.scale;
        (x, y)
    }
}
