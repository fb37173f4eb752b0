use std::fmt;
use std::sync::Arc;

use image::DynamicImage;
use log::{debug, info, warn};

use crate::config::DetectorConfig;
use crate::detection::ocr::{DigitReader, Recognizer, TimeoutRecognizer};
use crate::detection::{border, cells, preprocessing};
use crate::error::{GridScanError, Result};
use crate::models::{CellRegion, GridString};
use crate::source::FrameSource;

/// Progress of a single attempt through the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttemptStage {
    Acquired,
    Preprocessed,
    BorderFound,
    Segmented,
    Extracted,
}

/// The stage that ended a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    BorderDetection,
    CellSegmentation,
}

impl FailedStage {
    /// Last stage completed before the miss.
    pub fn reached(&self) -> AttemptStage {
        match self {
            FailedStage::BorderDetection => AttemptStage::Preprocessed,
            FailedStage::CellSegmentation => AttemptStage::BorderFound,
        }
    }
}

impl fmt::Display for FailedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailedStage::BorderDetection => write!(f, "grid border not found"),
            FailedStage::CellSegmentation => write!(f, "grid cells not found"),
        }
    }
}

/// Outcome of running one frame through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Found(GridString),
    Failed(FailedStage),
}

impl Attempt {
    pub fn stage(&self) -> AttemptStage {
        match self {
            Attempt::Found(_) => AttemptStage::Extracted,
            Attempt::Failed(stage) => stage.reached(),
        }
    }

    pub fn grid(&self) -> Option<&GridString> {
        match self {
            Attempt::Found(grid) => Some(grid),
            Attempt::Failed(_) => None,
        }
    }

    pub fn into_grid(self) -> Option<GridString> {
        match self {
            Attempt::Found(grid) => Some(grid),
            Attempt::Failed(_) => None,
        }
    }
}

/// Drives frames through preprocessing, border detection, cell segmentation
/// and digit extraction.
pub struct GridPipeline {
    config: DetectorConfig,
    reader: DigitReader,
}

impl GridPipeline {
    /// Build a pipeline around a recognizer. The config is validated here.
    pub fn new(config: DetectorConfig, recognizer: Arc<dyn Recognizer>) -> Result<Self> {
        config.validate()?;

        let recognizer: Arc<dyn Recognizer> = match config.recognizer_timeout() {
            Some(timeout) => Arc::new(TimeoutRecognizer::new(recognizer, timeout)?),
            None => recognizer,
        };
        let reader = DigitReader::new(recognizer, config.glyph_size);

        Ok(Self { config, reader })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run one frame. A grid that cannot be found is `Ok(Attempt::Failed)`;
    /// only an unusable frame is an error.
    pub fn attempt(&self, frame: &DynamicImage) -> Result<Attempt> {
        debug!("attempt: {:?} {}x{}", AttemptStage::Acquired, frame.width(), frame.height());

        let mask = preprocessing::normalize(frame, &self.config)?;
        debug!("attempt: {:?}", AttemptStage::Preprocessed);

        let Some(grid) = border::find_grid(&mask, &self.config) else {
            return Ok(Attempt::Failed(FailedStage::BorderDetection));
        };
        debug!("attempt: {:?}", AttemptStage::BorderFound);

        let Some(regions) = cells::segment(&grid.rectified, &self.config) else {
            return Ok(Attempt::Failed(FailedStage::CellSegmentation));
        };
        debug!("attempt: {:?}", AttemptStage::Segmented);

        let grid = self.read_cells(&regions)?;
        info!("grid found: {}", grid.as_str());
        Ok(Attempt::Found(grid))
    }

    /// Read the 81 ordered cells into a grid string.
    pub fn read_cells(&self, cells: &[CellRegion]) -> Result<GridString> {
        GridString::from_digits(cells.iter().map(|cell| self.reader.read(&cell.image)))
    }

    /// Attempt frames from `source` until a grid is found.
    ///
    /// Stops with [`GridScanError::NoGridDetected`] once `max_attempts` frames
    /// have failed or the source runs dry. A source with no frame at all is
    /// [`GridScanError::NoFrame`].
    pub fn scan<S: FrameSource + ?Sized>(&self, source: &mut S) -> Result<GridString> {
        let mut attempts = 0usize;

        loop {
            if let Some(max) = self.config.max_attempts {
                if attempts >= max {
                    warn!("giving up after {attempts} attempt(s)");
                    return Err(GridScanError::NoGridDetected { attempts });
                }
            }

            let Some(frame) = source.next_frame()? else {
                if attempts == 0 {
                    return Err(GridScanError::NoFrame);
                }
                warn!("frame source exhausted after {attempts} attempt(s)");
                return Err(GridScanError::NoGridDetected { attempts });
            };
            attempts += 1;

            match self.attempt(&frame)? {
                Attempt::Found(grid) => return Ok(grid),
                Attempt::Failed(stage) => debug!("attempt {attempts} failed: {stage}"),
            }
        }
    }
}
