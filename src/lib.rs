pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod source;

pub use config::DetectorConfig;
pub use detection::{DigitReader, OcrsRecognizer, Recognizer, RecognizerMode, TimeoutRecognizer};
pub use error::{GridScanError, Result};
pub use models::{BoundingBox, CellRegion, GridString, Point, Quadrilateral};
pub use pipeline::{Attempt, AttemptStage, FailedStage, GridPipeline};
pub use source::{FrameSequence, FrameSource, StaticImageSource};
