mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from gridscan for tests
pub use gridscan::{
    Attempt, DetectorConfig, FailedStage, FrameSequence, GridPipeline, GridScanError, GridString,
    Recognizer,
};
