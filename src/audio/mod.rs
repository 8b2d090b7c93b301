pub mod capture;
pub mod format;
pub mod session;
pub mod wav;

pub use capture::{CaptureDevice, CaptureError, CaptureHandle, CpalCaptureDevice};
pub use format::AudioFormat;
pub use session::{RecordingOutcome, RecordingSession};
