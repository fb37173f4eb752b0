use std::fmt;
use std::str::FromStr;

use image::GrayImage;

use crate::error::GridScanError;

/// Number of rows (and columns) in the puzzle grid.
pub const GRID_SIDE: usize = 9;

/// Number of cells in the puzzle grid.
pub const CELL_COUNT: usize = GRID_SIDE * GRID_SIDE;

/// Integer pixel position, as traced by the contour finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<imageproc::point::Point<i32>> for Point {
    fn from(p: imageproc::point::Point<i32>) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<Point> for imageproc::point::Point<i32> {
    fn from(p: Point) -> Self {
        imageproc::point::Point::new(p.x, p.y)
    }
}

/// Axis-aligned rectangle in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    /// Tight bounding box of a point set (inclusive of the extreme pixels).
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    /// Move every side inward by `border` pixels. Returns `None` if nothing is left.
    pub fn shrink(&self, border: i32) -> Option<Self> {
        let width = self.width - 2 * border;
        let height = self.height - 2 * border;
        if width <= 0 || height <= 0 {
            return None;
        }

        Some(Self {
            x: self.x + border,
            y: self.y + border,
            width,
            height,
        })
    }

    /// Clamp to an image of the given size. Returns `None` if the overlap is empty.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<Self> {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x + self.width).min(image_width as i32);
        let y1 = (self.y + self.height).min(image_height as i32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Four grid corners, always stored clockwise from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrilateral {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl Quadrilateral {
    /// Order four vertices given in any order.
    ///
    /// The points are split by ascending y into a top and a bottom pair, and each
    /// pair is then ordered by ascending x. Any other vertex count is rejected.
    pub fn from_unordered(points: &[Point]) -> Option<Self> {
        if points.len() != 4 {
            return None;
        }

        let mut by_y = points.to_vec();
        by_y.sort_by_key(|p| (p.y, p.x));
        let (top, bottom) = by_y.split_at_mut(2);
        top.sort_by_key(|p| (p.x, p.y));
        bottom.sort_by_key(|p| (p.x, p.y));

        Some(Self {
            top_left: top[0],
            top_right: top[1],
            bottom_right: bottom[1],
            bottom_left: bottom[0],
        })
    }

    /// Corners in clockwise order starting at the top-left.
    pub fn corners(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    pub fn corners_f32(&self) -> [(f32, f32); 4] {
        self.corners().map(|p| (p.x as f32, p.y as f32))
    }
}

/// One located grid cell: its rectangle in the rectified image and the crop.
#[derive(Debug, Clone)]
pub struct CellRegion {
    pub bbox: BoundingBox,
    pub image: GrayImage,
}

/// The 81 recognized cells in row-major order; `'0'` marks a blank cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridString(String);

impl GridString {
    /// Assemble from per-cell digits. Rejects anything but 81 ASCII digits.
    pub fn from_digits<I>(digits: I) -> Result<Self, GridScanError>
    where
        I: IntoIterator<Item = char>,
    {
        let s: String = digits.into_iter().collect();
        s.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digit at `(row, col)`, `0` meaning blank.
    pub fn cell(&self, row: usize, col: usize) -> Option<u8> {
        if row >= GRID_SIDE || col >= GRID_SIDE {
            return None;
        }
        self.0
            .as_bytes()
            .get(row * GRID_SIDE + col)
            .map(|b| b - b'0')
    }

    pub fn rows(&self) -> impl Iterator<Item = &str> {
        (0..GRID_SIDE).map(move |r| &self.0[r * GRID_SIDE..(r + 1) * GRID_SIDE])
    }

    /// Number of non-blank cells.
    pub fn givens(&self) -> usize {
        self.0.bytes().filter(|&b| b != b'0').count()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl FromStr for GridString {
    type Err = GridScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let len = s.chars().count();
        if len != CELL_COUNT {
            return Err(GridScanError::MalformedGrid(format!(
                "expected {CELL_COUNT} cells, got {len}"
            )));
        }
        if let Some(bad) = s.chars().find(|c| !c.is_ascii_digit()) {
            return Err(GridScanError::MalformedGrid(format!(
                "unexpected character {bad:?}"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for GridString {
    type Error = GridScanError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl AsRef<str> for GridString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GridString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, row) in self.rows().enumerate() {
            if r > 0 && r % 3 == 0 {
                writeln!(f, "------+-------+------")?;
            }
            for (c, ch) in row.chars().enumerate() {
                if c > 0 && c % 3 == 0 {
                    write!(f, "| ")?;
                }
                let shown = if ch == '0' { '.' } else { ch };
                if c + 1 == GRID_SIDE {
                    writeln!(f, "{shown}")?;
                } else {
                    write!(f, "{shown} ")?;
                }
            }
        }
        Ok(())
    }
}
