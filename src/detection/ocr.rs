use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use log::{debug, warn};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use serde::{Deserialize, Serialize};

use crate::error::{GridScanError, Result};

/// Character returned for a cell without a readable digit.
pub const BLANK: char = '0';

const DIGITS: &str = "0123456789";

/// What the recognizer is asked to find in a glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerMode {
    /// One character out of `0-9`.
    #[default]
    SingleDigit,
    /// One character out of the engine's full alphabet. Smudges and grid line
    /// residue then come back as letters or symbols and read as blank instead
    /// of being forced onto the closest digit.
    SingleCharacter,
}

impl RecognizerMode {
    /// Character whitelist for the engine; `None` means unrestricted.
    pub fn allowed_chars(&self) -> Option<&'static str> {
        match self {
            RecognizerMode::SingleDigit => Some(DIGITS),
            RecognizerMode::SingleCharacter => None,
        }
    }
}

/// Classifies one small glyph image.
///
/// Implementations receive a dark glyph on a light background and return the
/// recognized text, or `None` when nothing was recognized.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, glyph: &GrayImage) -> Result<Option<String>>;
}

/// Reads a single cell crop as one digit, `'0'` meaning blank.
pub struct DigitReader {
    recognizer: Arc<dyn Recognizer>,
    glyph_size: u32,
}

impl DigitReader {
    pub fn new(recognizer: Arc<dyn Recognizer>, glyph_size: u32) -> Self {
        Self {
            recognizer,
            glyph_size,
        }
    }

    /// Resize and invert the cell, then ask the recognizer.
    ///
    /// No answer, an answer other than one digit, and recognizer errors all
    /// read as [`BLANK`]; a single bad cell never fails the grid.
    pub fn read(&self, cell: &GrayImage) -> char {
        if cell.width() == 0 || cell.height() == 0 {
            return BLANK;
        }

        let glyph = prepare_glyph(cell, self.glyph_size);
        match self.recognizer.recognize(&glyph) {
            Ok(Some(text)) => single_digit(&text).unwrap_or(BLANK),
            Ok(None) => BLANK,
            Err(e) => {
                warn!("recognizer error, reading cell as blank: {e}");
                BLANK
            }
        }
    }
}

/// Scale to `size`x`size` and flip to dark-on-light.
pub fn prepare_glyph(cell: &GrayImage, size: u32) -> GrayImage {
    let mut glyph = image::imageops::resize(cell, size, size, FilterType::CatmullRom);
    image::imageops::invert(&mut glyph);
    glyph
}

fn single_digit(text: &str) -> Option<char> {
    let mut chars = text.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_digit() => Some(c),
        _ => None,
    }
}

struct Job {
    id: u64,
    glyph: GrayImage,
}

struct Channels {
    jobs: Sender<Job>,
    answers: Receiver<(u64, Result<Option<String>>)>,
    next_id: u64,
}

/// Puts a deadline on every call to another recognizer.
///
/// Calls are handed to one long-lived worker thread. If it has not answered in
/// time the cell reads as blank. While the worker is still stuck on an expired
/// call, further cells read as blank at once, so a hung recognizer costs one
/// thread and one blocked call no matter how many attempts follow.
pub struct TimeoutRecognizer {
    channels: Mutex<Channels>,
    busy: Arc<AtomicBool>,
    timeout: Duration,
}

impl TimeoutRecognizer {
    pub fn new(inner: Arc<dyn Recognizer>, timeout: Duration) -> Result<Self> {
        let (job_sender, job_receiver) = mpsc::channel::<Job>();
        let (answer_sender, answer_receiver) = mpsc::channel();
        let busy = Arc::new(AtomicBool::new(false));

        let worker_busy = Arc::clone(&busy);
        std::thread::Builder::new()
            .name("recognizer".to_string())
            .spawn(move || {
                // ends once the TimeoutRecognizer and its job sender are dropped
                for job in job_receiver {
                    let answer = inner.recognize(&job.glyph);
                    // cleared before answering, so the caller never sees a stale flag
                    worker_busy.store(false, Ordering::SeqCst);
                    let _ = answer_sender.send((job.id, answer));
                }
            })
            .map_err(|e| GridScanError::Recognizer(format!("cannot start recognizer thread: {e}")))?;

        Ok(Self {
            channels: Mutex::new(Channels {
                jobs: job_sender,
                answers: answer_receiver,
                next_id: 0,
            }),
            busy,
            timeout,
        })
    }
}

impl Recognizer for TimeoutRecognizer {
    fn recognize(&self, glyph: &GrayImage) -> Result<Option<String>> {
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| GridScanError::Recognizer("recognizer lock poisoned".to_string()))?;

        if self.busy.load(Ordering::SeqCst) {
            debug!("recognizer still busy with an expired call, reading cell as blank");
            return Ok(None);
        }

        let id = channels.next_id;
        channels.next_id += 1;
        self.busy.store(true, Ordering::SeqCst);
        let job = Job {
            id,
            glyph: glyph.clone(),
        };
        if channels.jobs.send(job).is_err() {
            return Err(GridScanError::Recognizer(
                "recognizer thread is gone".to_string(),
            ));
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match channels.answers.recv_timeout(left) {
                Ok((answer_id, answer)) if answer_id == id => return answer,
                // a late answer to an expired call
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => {
                    warn!("recognizer timed out after {:?}", self.timeout);
                    return Ok(None);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(GridScanError::Recognizer(
                        "recognizer thread exited without an answer".to_string(),
                    ));
                }
            }
        }
    }
}

/// Side of the white canvas a glyph is centered on before text detection.
const CANVAS_SIZE: u32 = 100;

/// Digit recognizer backed by the ocrs engine.
pub struct OcrsRecognizer {
    engine: OcrEngine,
}

impl OcrsRecognizer {
    /// Load models from the standard ocrs cache (`~/.cache/ocrs`).
    pub fn from_default_cache(mode: RecognizerMode) -> Result<Self> {
        let home_dir = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| GridScanError::Recognizer("cannot locate home directory".to_string()))?;

        let cache_dir = Path::new(&home_dir).join(".cache/ocrs");
        Self::from_model_paths(
            cache_dir.join("text-detection.rten"),
            cache_dir.join("text-recognition.rten"),
            mode,
        )
    }

    /// Load models from explicit paths, restricted to the characters of `mode`.
    pub fn from_model_paths(
        detection_model_path: impl Into<PathBuf>,
        recognition_model_path: impl Into<PathBuf>,
        mode: RecognizerMode,
    ) -> Result<Self> {
        let detection_model_path = detection_model_path.into();
        let recognition_model_path = recognition_model_path.into();

        if !detection_model_path.exists() || !recognition_model_path.exists() {
            return Err(GridScanError::Recognizer(format!(
                "OCR models not found. Please run: ocrs-cli --help (or download models manually)\n\
                 Expected locations:\n  - {}\n  - {}",
                detection_model_path.display(),
                recognition_model_path.display()
            )));
        }

        let load = |path: &Path| {
            Model::load_file(path).map_err(|e| {
                GridScanError::Recognizer(format!("failed to load {}: {e}", path.display()))
            })
        };
        let detection_model = load(&detection_model_path)?;
        let recognition_model = load(&recognition_model_path)?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            allowed_chars: mode.allowed_chars().map(str::to_string),
            ..Default::default()
        })
        .map_err(|e| GridScanError::Recognizer(e.to_string()))?;
        debug!("ocrs engine ready in {mode:?} mode");

        Ok(Self { engine })
    }
}

// The text detector needs some background around a lone character.
fn pad_glyph(glyph: &GrayImage) -> GrayImage {
    let (w, h) = glyph.dimensions();
    let side = CANVAS_SIZE.max(w).max(h);
    let mut canvas = GrayImage::from_pixel(side, side, Luma([255u8]));
    let offset_x = (side - w) / 2;
    let offset_y = (side - h) / 2;
    image::imageops::overlay(&mut canvas, glyph, offset_x.into(), offset_y.into());
    canvas
}

impl Recognizer for OcrsRecognizer {
    fn recognize(&self, glyph: &GrayImage) -> Result<Option<String>> {
        let padded = pad_glyph(glyph);
        let img = DynamicImage::ImageLuma8(padded).to_rgb8();

        let to_err = |e: &dyn std::fmt::Display| GridScanError::Recognizer(e.to_string());
        let img_source =
            ImageSource::from_bytes(img.as_raw(), img.dimensions()).map_err(|e| to_err(&e))?;
        let ocr_input = self.engine.prepare_input(img_source).map_err(|e| to_err(&e))?;
        let text = self.engine.get_text(&ocr_input).map_err(|e| to_err(&e))?;

        let text = text.trim();
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text.to_string()))
        }
    }
}
