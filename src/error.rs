use std::path::PathBuf;

/// Errors surfaced by the grid scanner.
///
/// A grid that is simply not visible in a frame is not an error; stages report
/// that as `None` and the controller as [`crate::pipeline::Attempt::Failed`].
#[derive(thiserror::Error, Debug)]
pub enum GridScanError {
    #[error("frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("frame source has no frame available")]
    NoFrame,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("malformed grid string: {0}")]
    MalformedGrid(String),
    #[error("no grid detected after {attempts} attempt(s)")]
    NoGridDetected { attempts: usize },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("recognizer failed: {0}")]
    Recognizer(String),
}

pub type Result<T> = std::result::Result<T, GridScanError>;
