pub mod preprocessing;
pub mod contours;
pub mod border;
pub mod cells;
pub mod ocr;

pub use border::{find_grid, GridBorder};
pub use cells::segment;
pub use ocr::{DigitReader, OcrsRecognizer, Recognizer, RecognizerMode, TimeoutRecognizer};
pub use preprocessing::normalize;
