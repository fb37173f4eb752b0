use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use log::debug;

use crate::config::DetectorConfig;
use crate::detection::contours::{
    apply_mask, approximate_polygon, dilate_once, fill_contour, find_external_contours,
};
use crate::models::Quadrilateral;

/// The located grid outline and the perspective-corrected grid image.
#[derive(Debug, Clone)]
pub struct GridBorder {
    pub quad: Quadrilateral,
    pub rectified: GrayImage,
}

/// Locate the outer grid quadrilateral in a binary mask and rectify it.
///
/// Returns `None` when the mask has no outer contour, when the largest one does
/// not reduce to four vertices, or when the four corners are degenerate.
pub fn find_grid(mask: &GrayImage, config: &DetectorConfig) -> Option<GridBorder> {
    let dilated = dilate_once(mask);
    let contours = find_external_contours(&dilated);
    debug!("border: {} outer contours", contours.len());

    let largest = contours
        .iter()
        .max_by(|a, b| a.area().total_cmp(&b.area()))?;

    let poly = approximate_polygon(&largest.points, config.polygon_epsilon);
    let Some(quad) = Quadrilateral::from_unordered(&poly) else {
        debug!("border: largest contour reduces to {} vertices", poly.len());
        return None;
    };
    debug!("border: grid corners {:?}", quad.corners());

    // Nothing outside the grid outline may reach the cell search.
    let outline = fill_contour(mask.width(), mask.height(), &largest.points);
    let masked = apply_mask(mask, &outline);

    let Some(projection) = perspective_map(&quad, config.rectified_size, config.warp_margin)
    else {
        debug!("border: degenerate quadrilateral");
        return None;
    };

    let mut rectified = GrayImage::new(config.rectified_size, config.rectified_size);
    warp_into(
        &masked,
        &projection,
        Interpolation::Bilinear,
        Luma([0]),
        &mut rectified,
    );

    Some(GridBorder { quad, rectified })
}

/// Homography from the grid corners onto a square of side `size` inset by `margin`.
pub fn perspective_map(quad: &Quadrilateral, size: u32, margin: u32) -> Option<Projection> {
    let lo = margin as f32;
    let hi = (size - margin - 1) as f32;
    let destination = [(lo, lo), (hi, lo), (hi, hi), (lo, hi)];
    Projection::from_control_points(quad.corners_f32(), destination)
}
