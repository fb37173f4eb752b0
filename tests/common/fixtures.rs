use std::sync::atomic::{AtomicUsize, Ordering};

use gridscan::Recognizer;
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use imageproc::rect::Rect;

/// A valid puzzle with 30 givens.
pub const SAMPLE_GRID: &str =
    "530070000600195000098000060800060003400803001700020006060000280000419005000080079";

/// Top-left corner of the rendered grid.
pub const GRID_ORIGIN: i32 = 40;
/// Distance between neighbouring grid lines.
pub const GRID_PITCH: i32 = 48;
const LINE_WIDTH: u32 = 3;
const MARK_SIZE: u32 = 7;
/// Where inside a cell a digit mark sits, per third.
const MARK_OFFSETS: [f32; 3] = [0.32, 0.5, 0.68];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Render a puzzle as black lines on white paper, 512x512.
///
/// Each digit `d` is printed as a small square mark whose position inside the
/// cell encodes it: row `(d-1)/3`, column `(d-1)%3` of a 3x3 layout.
/// [`PositionCodeRecognizer`] reads these marks back.
pub fn render_grid(grid: &str) -> RgbImage {
    render_grid_on(512, 512, 0, 0, grid)
}

/// Same as [`render_grid`] but on a larger sheet, shifted by `(dx, dy)`.
pub fn render_grid_on(width: u32, height: u32, dx: i32, dy: i32, grid: &str) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let black = Rgb([0u8, 0, 0]);
    let origin_x = GRID_ORIGIN + dx;
    let origin_y = GRID_ORIGIN + dy;
    let span = (9 * GRID_PITCH) as u32 + LINE_WIDTH;
    let half = (LINE_WIDTH / 2) as i32;

    for k in 0..=9 {
        let x = origin_x + k * GRID_PITCH - half;
        let y = origin_y + k * GRID_PITCH - half;
        draw_filled_rect_mut(&mut img, Rect::at(x, origin_y - half).of_size(LINE_WIDTH, span), black);
        draw_filled_rect_mut(&mut img, Rect::at(origin_x - half, y).of_size(span, LINE_WIDTH), black);
    }

    for (idx, ch) in grid.chars().enumerate() {
        let digit = ch.to_digit(10).expect("grid must be digits");
        if digit == 0 {
            continue;
        }
        let (row, col) = ((idx / 9) as i32, (idx % 9) as i32);
        let code = (digit - 1) as usize;
        let cx = origin_x + col * GRID_PITCH + (GRID_PITCH as f32 * MARK_OFFSETS[code % 3]).round() as i32;
        let cy = origin_y + row * GRID_PITCH + (GRID_PITCH as f32 * MARK_OFFSETS[code / 3]).round() as i32;
        let m = (MARK_SIZE / 2) as i32;
        draw_filled_rect_mut(&mut img, Rect::at(cx - m, cy - m).of_size(MARK_SIZE, MARK_SIZE), black);
    }

    img
}

/// The rendered grid as seen by a slightly tilted camera.
pub fn render_skewed_grid(grid: &str) -> RgbImage {
    let flat = render_grid(grid);
    let projection = Projection::from_control_points(
        [(0.0, 0.0), (511.0, 0.0), (511.0, 511.0), (0.0, 511.0)],
        [(18.0, 10.0), (500.0, 24.0), (492.0, 503.0), (8.0, 490.0)],
    )
    .expect("control points are not degenerate");
    warp(&flat, &projection, Interpolation::Bilinear, Rgb([255, 255, 255]))
}

/// A frame with no structure at all.
pub fn solid_frame(width: u32, height: u32, value: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([value, value, value])))
}

/// Decodes the position of the dark mark in a glyph back into a digit.
pub struct PositionCodeRecognizer;

impl Recognizer for PositionCodeRecognizer {
    fn recognize(&self, glyph: &GrayImage) -> gridscan::Result<Option<String>> {
        let (w, h) = glyph.dimensions();
        let (mut sum_x, mut sum_y, mut count) = (0f32, 0f32, 0f32);
        for (x, y, p) in glyph.enumerate_pixels() {
            if p[0] < 128 {
                sum_x += x as f32;
                sum_y += y as f32;
                count += 1.0;
            }
        }
        if count < 2.0 {
            return Ok(None);
        }

        let third = |sum: f32, side: u32| {
            let f = (sum / count + 0.5) / side as f32;
            ((f * 3.0) as u32).min(2)
        };
        let digit = 1 + third(sum_y, h) * 3 + third(sum_x, w);
        Ok(Some(digit.to_string()))
    }
}

/// Counts calls and never recognizes anything.
#[derive(Default)]
pub struct CountingRecognizer {
    calls: AtomicUsize,
}

impl CountingRecognizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Recognizer for CountingRecognizer {
    fn recognize(&self, _glyph: &GrayImage) -> gridscan::Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}
