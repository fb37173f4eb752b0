use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};

use crate::error::{GridScanError, Result};

/// Supplies frames to [`crate::GridPipeline::scan`].
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<DynamicImage>>;
}

/// A single image file, read again for every frame request.
///
/// Every attempt sees the same picture, so the attempt cap of the caller is
/// what ends a scan that keeps failing.
pub struct StaticImageSource {
    path: PathBuf,
}

impl StaticImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for StaticImageSource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        load_image(&self.path).map(Some)
    }
}

/// A fixed list of frames, each yielded once.
pub struct FrameSequence {
    frames: VecDeque<DynamicImage>,
}

impl FrameSequence {
    pub fn new(frames: impl IntoIterator<Item = DynamicImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// Decode every path up front, in the given order.
    pub fn from_paths<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Self> {
        let frames = paths
            .into_iter()
            .map(|p| load_image(p.as_ref()))
            .collect::<Result<VecDeque<_>>>()?;
        Ok(Self { frames })
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for FrameSequence {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        Ok(self.frames.pop_front())
    }
}

/// Open and decode an image file.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let reader = ImageReader::open(path).map_err(|source| GridScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    reader.decode().map_err(|source| GridScanError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
