use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use log::debug;

use crate::config::DetectorConfig;
use crate::error::{GridScanError, Result};

/// Turn a raw frame into a binary mask with ink as foreground (255).
///
/// The frame is center-cropped to a square, scaled to the working size,
/// converted to grayscale, blurred and adaptively thresholded. A frame that is
/// already a working-size mask in that polarity is returned unchanged.
pub fn normalize(frame: &DynamicImage, config: &DetectorConfig) -> Result<GrayImage> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(GridScanError::EmptyFrame {
            width: frame.width(),
            height: frame.height(),
        });
    }

    let square = crop_to_square(frame);
    let side = config.working_size;
    let resized = if square.width() == side {
        square
    } else {
        square.resize_exact(side, side, FilterType::Triangle)
    };
    let gray = to_grayscale(&resized);

    if is_normalized_mask(&gray) {
        debug!("frame is already a binary mask, skipping threshold");
        return Ok(gray);
    }

    let blurred = apply_blur(&gray, config.blur_sigma);
    Ok(adaptive_threshold_inv(
        &blurred,
        config.threshold_block_size,
        config.threshold_offset,
    ))
}

/// Center crop along the longer axis; nothing is stretched.
pub fn crop_to_square(img: &DynamicImage) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if w == h {
        return img.clone();
    }

    let side = w.min(h);
    let x = (w - side) / 2;
    let y = (h - side) / 2;
    img.crop_imm(x, y, side, side)
}

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Locally adaptive binarization, inverted.
///
/// The threshold of each pixel is the Gaussian-weighted mean of its
/// `block_size` neighborhood minus `offset`. Pixels at or below it (ink) become
/// 255, everything else 0.
pub fn adaptive_threshold_inv(img: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let local_mean = gaussian_blur_f32(img, block_sigma(block_size));

    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let value = img.get_pixel(x, y)[0] as i32;
        let threshold = local_mean.get_pixel(x, y)[0] as i32 - offset;
        if value <= threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

// Sigma of a Gaussian kernel spanning `block_size` pixels.
fn block_sigma(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// True if every pixel is 0 or 255 and foreground is the minority.
fn is_normalized_mask(img: &GrayImage) -> bool {
    let mut foreground = 0usize;
    for p in img.pixels() {
        match p[0] {
            0 => {}
            255 => foreground += 1,
            _ => return false,
        }
    }
    let total = (img.width() * img.height()) as usize;
    foreground * 2 < total
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn crops_landscape_symmetrically() {
        let mut img = RgbImage::from_pixel(101, 60, Rgb([255, 255, 255]));
        // marker in the first kept column
        img.put_pixel(20, 0, Rgb([0, 0, 0]));
        let square = crop_to_square(&DynamicImage::ImageRgb8(img)).to_rgb8();

        assert_eq!(square.dimensions(), (60, 60));
        assert_eq!(square.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn crops_portrait_symmetrically() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(40, 91));
        let square = crop_to_square(&img);
        assert_eq!((square.width(), square.height()), (40, 40));
    }

    #[test]
    fn output_has_working_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([200, 180, 160])));
        let config = DetectorConfig::default();
        let mask = normalize(&img, &config).unwrap();
        assert_eq!(mask.dimensions(), (512, 512));
    }

    #[test]
    fn dark_line_becomes_foreground() {
        let mut img = GrayImage::from_pixel(40, 40, Luma([230]));
        for y in 0..40 {
            for x in 19..22 {
                img.put_pixel(x, y, Luma([20]));
            }
        }
        let mask = adaptive_threshold_inv(&img, 5, 6);

        assert_eq!(mask.get_pixel(20, 20)[0], 255);
        assert_eq!(mask.get_pixel(5, 20)[0], 0);
        assert_eq!(mask.get_pixel(35, 20)[0], 0);
    }

    #[test]
    fn uniform_frame_has_no_foreground() {
        let img = GrayImage::from_pixel(64, 64, Luma([90]));
        let mask = adaptive_threshold_inv(&img, 5, 6);
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn empty_frame_is_rejected() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 10));
        let err = normalize(&img, &DetectorConfig::default()).unwrap_err();
        assert!(matches!(err, GridScanError::EmptyFrame { .. }));
    }
}
