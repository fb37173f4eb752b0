mod common;

use common::*;
use gridscan::detection::{find_grid, normalize};
use gridscan::Point;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point as PixelPoint;
use imageproc::rect::Rect;

fn near(p: Point, x: i32, y: i32, tol: i32) -> bool {
    (p.x - x).abs() <= tol && (p.y - y).abs() <= tol
}

#[test]
fn no_contours_is_not_found() {
    let mask = GrayImage::new(512, 512);
    assert!(find_grid(&mask, &DetectorConfig::default()).is_none());
}

#[test]
fn triangle_is_not_a_grid() {
    let mut mask = GrayImage::new(512, 512);
    let white = Luma([255u8]);
    draw_line_segment_mut(&mut mask, (50.0, 450.0), (256.0, 60.0), white);
    draw_line_segment_mut(&mut mask, (256.0, 60.0), (460.0, 450.0), white);
    draw_line_segment_mut(&mut mask, (460.0, 450.0), (50.0, 450.0), white);

    assert!(find_grid(&mask, &DetectorConfig::default()).is_none());
}

#[test]
fn largest_outline_wins() {
    let mut mask = GrayImage::new(512, 512);
    let white = Luma([255u8]);
    draw_hollow_rect_mut(&mut mask, Rect::at(100, 120).of_size(300, 280), white);
    draw_hollow_rect_mut(&mut mask, Rect::at(10, 10).of_size(60, 60), white);

    let found = find_grid(&mask, &DetectorConfig::default()).expect("quadrilateral");
    let q = found.quad;
    assert!(near(q.top_left, 100, 120, 2), "{q:?}");
    assert!(near(q.top_right, 399, 120, 2), "{q:?}");
    assert!(near(q.bottom_right, 399, 399, 2), "{q:?}");
    assert!(near(q.bottom_left, 100, 399, 2), "{q:?}");
    assert_eq!(found.rectified.dimensions(), (333, 333));

    // the outline lands on the inset destination square
    assert!(found.rectified.get_pixel(6, 166)[0] > 0);
    assert!(found.rectified.get_pixel(326, 166)[0] > 0);
    assert_eq!(found.rectified.get_pixel(166, 166)[0], 0);
    assert_eq!(found.rectified.get_pixel(1, 1)[0], 0);
}

#[test]
fn slightly_bowed_top_edge_still_has_four_corners() {
    // paper that is not flat: the top edge bulges up by 4px in the middle,
    // so the topmost traced pixel lies mid-edge
    let mut mask = GrayImage::new(512, 512);
    let outline = [
        PixelPoint::new(100, 104),
        PixelPoint::new(256, 100),
        PixelPoint::new(412, 104),
        PixelPoint::new(412, 412),
        PixelPoint::new(100, 412),
    ];
    draw_polygon_mut(&mut mask, &outline, Luma([255u8]));

    let found = find_grid(&mask, &DetectorConfig::default()).expect("grid outline");
    let q = found.quad;
    assert!(near(q.top_left, 100, 104, 3), "{q:?}");
    assert!(near(q.top_right, 412, 104, 3), "{q:?}");
    assert!(near(q.bottom_right, 412, 412, 3), "{q:?}");
    assert!(near(q.bottom_left, 100, 412, 3), "{q:?}");
}

#[test]
fn rendered_grid_is_located() {
    init_logging();
    let frame = DynamicImage::ImageRgb8(render_grid(SAMPLE_GRID));
    let config = DetectorConfig::default();
    let mask = normalize(&frame, &config).unwrap();

    let found = find_grid(&mask, &config).expect("grid outline");
    let q = found.quad;
    let lo = GRID_ORIGIN;
    let hi = GRID_ORIGIN + 9 * GRID_PITCH;
    assert!(near(q.top_left, lo, lo, 4), "{q:?}");
    assert!(near(q.top_right, hi, lo, 4), "{q:?}");
    assert!(near(q.bottom_right, hi, hi, 4), "{q:?}");
    assert!(near(q.bottom_left, lo, hi, 4), "{q:?}");
}

#[test]
fn skewed_grid_is_located() {
    let frame = DynamicImage::ImageRgb8(render_skewed_grid(SAMPLE_GRID));
    let config = DetectorConfig::default();
    let mask = normalize(&frame, &config).unwrap();

    let found = find_grid(&mask, &config).expect("grid outline");
    let q = found.quad;
    assert!(q.top_left.x < q.top_right.x && q.bottom_left.x < q.bottom_right.x);
    assert!(q.top_left.y < q.bottom_left.y && q.top_right.y < q.bottom_right.y);
}
