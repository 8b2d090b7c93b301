use super::capture::{CaptureDevice, CaptureError, CaptureHandle};
use super::format::AudioFormat;
use std::time::{Duration, Instant};

/// What a finished session produced.
#[derive(Debug)]
pub enum RecordingOutcome {
    /// Raw little-endian PCM, ready for the encoder.
    Captured(Vec<u8>),
    /// Fewer bytes than the accidental-tap threshold; dropped without a
    /// transcription attempt.
    TooShort { bytes: usize },
}

/// One push-to-talk capture attempt.
///
/// Owns the running capture handle. `end` consumes the session, so the device
/// and its buffer are released exactly once on every path, including the
/// too-short one; an abandoned session releases them on drop.
pub struct RecordingSession {
    handle: Box<dyn CaptureHandle>,
    format: AudioFormat,
    started_at: Instant,
}

impl RecordingSession {
    pub fn begin(
        device: &dyn CaptureDevice,
        format: AudioFormat,
        window: Duration,
    ) -> Result<Self, CaptureError> {
        let handle = device.open(format, window)?;
        Ok(Self {
            handle,
            format,
            started_at: Instant::now(),
        })
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn end(self) -> RecordingOutcome {
        let pcm = self.handle.stop();
        if pcm.len() < self.format.min_capture_bytes() {
            RecordingOutcome::TooShort { bytes: pcm.len() }
        } else {
            RecordingOutcome::Captured(pcm)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FixedDevice {
        pcm: Vec<u8>,
        stops: Rc<RefCell<usize>>,
    }

    struct FixedHandle {
        pcm: Vec<u8>,
        stops: Rc<RefCell<usize>>,
    }

    impl CaptureDevice for FixedDevice {
        fn open(
            &self,
            _format: AudioFormat,
            _window: Duration,
        ) -> Result<Box<dyn CaptureHandle>, CaptureError> {
            Ok(Box::new(FixedHandle {
                pcm: self.pcm.clone(),
                stops: self.stops.clone(),
            }))
        }
    }

    impl CaptureHandle for FixedHandle {
        fn stop(self: Box<Self>) -> Vec<u8> {
            *self.stops.borrow_mut() += 1;
            self.pcm
        }
    }

    fn run_session(pcm_len: usize) -> (RecordingOutcome, usize) {
        let stops = Rc::new(RefCell::new(0));
        let device = FixedDevice {
            pcm: vec![0u8; pcm_len],
            stops: stops.clone(),
        };
        let session =
            RecordingSession::begin(&device, AudioFormat::default(), Duration::from_secs(60))
                .unwrap();
        let outcome = session.end();
        let stop_count = *stops.borrow();
        (outcome, stop_count)
    }

    #[test]
    fn test_end_returns_captured_pcm() {
        let (outcome, stops) = run_session(3200);
        assert!(matches!(outcome, RecordingOutcome::Captured(pcm) if pcm.len() == 3200));
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_end_below_threshold_is_too_short() {
        // 1599 bytes at 16 kHz/16-bit/mono is just under 50 ms.
        let (outcome, stops) = run_session(1599);
        assert!(matches!(outcome, RecordingOutcome::TooShort { bytes: 1599 }));
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_end_at_threshold_is_kept() {
        let (outcome, _) = run_session(1600);
        assert!(matches!(outcome, RecordingOutcome::Captured(_)));
    }
}
