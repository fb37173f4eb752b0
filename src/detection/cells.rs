use image::GrayImage;
use log::debug;

use crate::config::DetectorConfig;
use crate::detection::contours::{dilate_once, find_contours};
use crate::models::{BoundingBox, CellRegion, CELL_COUNT, GRID_SIDE};

/// Split a rectified grid image into its 81 cells in row-major order.
///
/// Every contour (outer and hole) is a candidate; a candidate survives if its
/// bounding box is roughly square and roughly one 81st of the image. Anything
/// other than exactly 81 survivors is reported as `None`.
pub fn segment(rectified: &GrayImage, config: &DetectorConfig) -> Option<Vec<CellRegion>> {
    let mut rects = find_cell_rects(rectified, config);
    if rects.len() != CELL_COUNT {
        debug!("cells: expected {CELL_COUNT} candidates, found {}", rects.len());
        return None;
    }

    order_row_major(&mut rects);

    rects
        .into_iter()
        .map(|bbox| crop_cell(rectified, bbox))
        .collect()
}

/// Filtered and shrunk cell rectangles, in contour order.
pub fn find_cell_rects(rectified: &GrayImage, config: &DetectorConfig) -> Vec<BoundingBox> {
    let dilated = dilate_once(rectified);
    let contours = find_contours(&dilated);
    let expected_area = config.expected_cell_area();

    let rects: Vec<BoundingBox> = contours
        .iter()
        .filter_map(|c| c.bounding_box())
        .filter(|b| is_cell_candidate(b, expected_area, config))
        .filter_map(|b| b.shrink(config.cell_shrink as i32))
        .collect();

    debug!(
        "cells: {} of {} contours look like cells",
        rects.len(),
        contours.len()
    );
    rects
}

/// Aspect and area gates for a single candidate.
pub fn is_cell_candidate(bbox: &BoundingBox, expected_area: i64, config: &DetectorConfig) -> bool {
    if (bbox.aspect_ratio() - 1.0).abs() > config.aspect_tolerance {
        return false;
    }
    (bbox.area() - expected_area).abs() <= config.area_tolerance
}

/// Sort 81 rectangles into reading order.
///
/// A stable sort by y puts the rows in sequence; each consecutive run of nine
/// is then one row and is stable-sorted by x. Grouping by rank rather than by
/// y value keeps rows intact when the grid is slightly tilted.
pub fn order_row_major(rects: &mut [BoundingBox]) {
    rects.sort_by_key(|r| r.y);
    for row in rects.chunks_mut(GRID_SIDE) {
        row.sort_by_key(|r| r.x);
    }
}

fn crop_cell(img: &GrayImage, bbox: BoundingBox) -> Option<CellRegion> {
    let bbox = bbox.clamp_to(img.width(), img.height())?;
    let image = image::imageops::crop_imm(
        img,
        bbox.x as u32,
        bbox.y as u32,
        bbox.width as u32,
        bbox.height as u32,
    )
    .to_image();
    Some(CellRegion { bbox, image })
}
