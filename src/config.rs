use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::ocr::RecognizerMode;
use crate::error::{GridScanError, Result};

/// Tuning parameters for one grid detector.
///
/// The epsilons and margins were chosen empirically for printed puzzles
/// photographed at arm's length. Different camera profiles can run side by side
/// with their own `DetectorConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Side of the square frame the preprocessor works on.
    pub working_size: u32,
    /// Side of the perspective-corrected grid image.
    pub rectified_size: u32,
    /// Sigma of the denoising blur applied before thresholding.
    pub blur_sigma: f32,
    /// Neighborhood (odd, in pixels) of the adaptive threshold.
    pub threshold_block_size: u32,
    /// Constant subtracted from the local mean by the adaptive threshold.
    pub threshold_offset: i32,
    /// Douglas-Peucker tolerance used to reduce the grid outline to a quadrilateral.
    pub polygon_epsilon: f64,
    /// Inset of the destination square inside the rectified image.
    pub warp_margin: u32,
    /// Maximum `|w/h - 1|` for a cell candidate.
    pub aspect_tolerance: f32,
    /// Maximum absolute deviation (px²) from the expected cell area.
    pub area_tolerance: i64,
    /// Border stripped from each side of a cell before cropping.
    pub cell_shrink: u32,
    /// Side of the glyph image handed to the recognizer.
    pub glyph_size: u32,
    /// What the recognizer is asked to find in each glyph.
    pub recognizer_mode: RecognizerMode,
    /// Per-cell deadline for the recognizer; expiry reads as a blank cell.
    pub recognizer_timeout_ms: Option<u64>,
    /// Cap on attempts made by [`crate::GridPipeline::scan`].
    pub max_attempts: Option<usize>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            working_size: 512,
            rectified_size: 333,
            blur_sigma: 0.8,
            threshold_block_size: 5,
            threshold_offset: 6,
            polygon_epsilon: 10.0,
            warp_margin: 5,
            aspect_tolerance: 0.3,
            area_tolerance: 1000,
            cell_shrink: 5,
            glyph_size: 20,
            recognizer_mode: RecognizerMode::SingleDigit,
            recognizer_timeout_ms: None,
            max_attempts: Some(10),
        }
    }
}

impl DetectorConfig {
    /// Load a JSON config; absent keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| GridScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| GridScanError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<usize>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_recognizer_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.recognizer_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn recognizer_timeout(&self) -> Option<Duration> {
        self.recognizer_timeout_ms.map(Duration::from_millis)
    }

    /// Expected pixel area of one cell in the rectified image.
    pub fn expected_cell_area(&self) -> i64 {
        let side = self.rectified_size as i64;
        side * side / crate::models::CELL_COUNT as i64
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> { Err(GridScanError::InvalidConfig(msg.to_string())) };

        if self.working_size == 0 || self.rectified_size == 0 {
            return invalid("working_size and rectified_size must be non-zero");
        }
        if self.threshold_block_size == 0 || self.threshold_block_size % 2 == 0 {
            return invalid("threshold_block_size must be odd");
        }
        if self.blur_sigma <= 0.0 {
            return invalid("blur_sigma must be positive");
        }
        if self.polygon_epsilon <= 0.0 {
            return invalid("polygon_epsilon must be positive");
        }
        if 2 * self.warp_margin + 1 >= self.rectified_size {
            return invalid("warp_margin leaves no room for the rectified grid");
        }
        if self.aspect_tolerance < 0.0 || self.area_tolerance < 0 {
            return invalid("tolerances must not be negative");
        }
        let cell_side = self.rectified_size / crate::models::GRID_SIDE as u32;
        if 2 * self.cell_shrink >= cell_side {
            return invalid("cell_shrink would consume an entire cell");
        }
        if self.glyph_size == 0 {
            return invalid("glyph_size must be non-zero");
        }
        if self.max_attempts == Some(0) {
            return invalid("max_attempts must be at least 1");
        }
        Ok(())
    }
}
