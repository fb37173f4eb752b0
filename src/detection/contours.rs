use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::geometry::contour_area;
use imageproc::morphology::dilate;

use crate::models::{BoundingBox, Point};

/// A traced border of a foreground region (or of a hole inside one).
#[derive(Debug, Clone)]
pub struct Contour {
    pub points: Vec<Point>,
    /// Index of the enclosing contour; `None` for outermost borders.
    pub parent: Option<usize>,
}

impl Contour {
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.points)
    }

    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    pub fn is_outermost(&self) -> bool {
        self.parent.is_none()
    }
}

/// Grow foreground by one pixel in every direction (3x3 square, one pass).
pub fn dilate_once(mask: &GrayImage) -> GrayImage {
    dilate(mask, Norm::LInf, 1)
}

/// Every border in the mask, outer and hole, with parent links.
pub fn find_contours(mask: &GrayImage) -> Vec<Contour> {
    imageproc::contours::find_contours::<i32>(mask)
        .into_iter()
        .map(|c| Contour {
            points: c.points.iter().map(|&p| p.into()).collect(),
            parent: c.parent,
        })
        .collect()
}

/// Only the outermost borders; holes and anything nested are dropped.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    find_contours(mask)
        .into_iter()
        .filter(Contour::is_outermost)
        .collect()
}

/// Absolute enclosed area of a closed polygon.
pub fn polygon_area(points: &[Point]) -> f64 {
    contour_area(&to_imageproc_points(points))
}

fn to_imageproc_points(points: &[Point]) -> Vec<imageproc::point::Point<i32>> {
    points.iter().map(|&p| p.into()).collect()
}

/// Simplify a closed curve with Douglas-Peucker.
///
/// The curve is split at two mutually distant points: the point farthest from
/// the first traced point, and the point farthest from that one. Both halves
/// are simplified on their own, so the traced start point only survives if it
/// is a real vertex and no vertex is repeated.
pub fn approximate_polygon(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let a = farthest_from(points, 0);
    let b = farthest_from(points, a);
    if a == b {
        return vec![points[a]];
    }
    let (start, end) = (a.min(b), a.max(b));

    let first_half = &points[start..=end];
    let second_half: Vec<Point> = points[end..]
        .iter()
        .chain(&points[..=start])
        .copied()
        .collect();

    let mut result = douglas_peucker(first_half, epsilon);
    result.pop();
    let mut rest = douglas_peucker(&second_half, epsilon);
    rest.pop();
    result.extend(rest);
    result
}

fn farthest_from(points: &[Point], origin: usize) -> usize {
    let o = points[origin];
    let mut best = origin;
    let mut best_dist = 0i64;
    for (i, p) in points.iter().enumerate() {
        let dx = (p.x - o.x) as i64;
        let dy = (p.y - o.y) as i64;
        let d = dx * dx + dy * dy;
        if d > best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

// Open-curve Douglas-Peucker; keeps both endpoints.
fn douglas_peucker(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end - start <= 1 {
            continue;
        }

        let mut max_dist = 0.0;
        let mut max_index = start;
        for i in (start + 1)..end {
            let dist = point_to_line_distance(points[i], points[start], points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }

        if max_dist > epsilon {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn point_to_line_distance(p: Point, a: Point, b: Point) -> f64 {
    let (px, py) = (p.x as f64, p.y as f64);
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (bx, by) = (b.x as f64, b.y as f64);
    let dx = bx - ax;
    let dy = by - ay;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }
    ((px - ax) * dy - (py - ay) * dx).abs() / len
}

/// Filled mask (255 inside and on the border) of a closed contour.
pub fn fill_contour(width: u32, height: u32, points: &[Point]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);

    let mut poly = to_imageproc_points(points);
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }

    match poly.len() {
        0 => {}
        1 | 2 => {
            for p in &poly {
                if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
                    mask.put_pixel(p.x as u32, p.y as u32, Luma([255]));
                }
            }
        }
        _ => draw_polygon_mut(&mut mask, &poly, Luma([255u8])),
    }
    mask
}

/// Keep `img` where `mask` is set, zero elsewhere.
pub fn apply_mask(img: &GrayImage, mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if mask.get_pixel(x, y)[0] > 0 {
            *img.get_pixel(x, y)
        } else {
            Luma([0])
        }
    })
}
