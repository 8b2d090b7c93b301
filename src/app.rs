use crate::audio::{AudioFormat, CaptureDevice, RecordingOutcome, RecordingSession};
use crate::audio_feedback::{self, Cue};
use crate::hotkey::HotkeySignals;

use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// How often the poll loop consumes hotkey edges. Short enough that a
/// hold-to-talk press feels instant, long enough not to spin.
const POLL_INTERVAL: Duration = Duration::from_millis(30);

enum CaptureState {
    Idle,
    Recording(RecordingSession),
}

/// The poll loop.
///
/// Sole consumer of the hotkey edge flags and sole owner of the recording
/// session: every session transition is serialized through this one task, so
/// the capture handle needs no locking and two sessions can never overlap.
/// Completed recordings are handed to the utterance pipeline; this task never
/// waits on the network, the encoder, or the clipboard.
pub struct App {
    signals: Arc<HotkeySignals>,
    device: Box<dyn CaptureDevice>,
    format: AudioFormat,
    window: Duration,
    cues: bool,
    utterances: mpsc::UnboundedSender<Vec<u8>>,
    state: CaptureState,
}

impl App {
    pub fn new(
        signals: Arc<HotkeySignals>,
        device: Box<dyn CaptureDevice>,
        format: AudioFormat,
        window: Duration,
        cues: bool,
        utterances: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self {
            signals,
            device,
            format,
            window,
            cues,
            utterances,
            state: CaptureState::Idle,
        }
    }

    /// Runs forever. Spawn on a `LocalSet`; the capture stream is `!Send`.
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(POLL_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            self.poll();
        }
    }

    /// One tick: consume whichever edges fired since the last one. A quick
    /// tap can raise both flags within a single interval; start is applied
    /// first so the pair still forms one (short) session.
    fn poll(&mut self) {
        if self.signals.take_start() {
            self.on_start_edge();
        }
        if self.signals.take_stop() {
            self.on_stop_edge();
        }
    }

    fn on_start_edge(&mut self) {
        if matches!(self.state, CaptureState::Recording(_)) {
            tracing::warn!("Start edge while already recording, ignored");
            return;
        }
        match RecordingSession::begin(self.device.as_ref(), self.format, self.window) {
            Ok(session) => {
                tracing::info!("Recording started");
                self.play_cue(Cue::RecordingStarted);
                self.state = CaptureState::Recording(session);
            }
            // The flag was consumed above, so a failed open cannot re-trigger
            // itself; the next press starts again from a clean Idle.
            Err(e) => tracing::error!("Could not start recording: {}", e),
        }
    }

    fn on_stop_edge(&mut self) {
        match mem::replace(&mut self.state, CaptureState::Idle) {
            CaptureState::Idle => {
                tracing::warn!("Stop edge without an active recording, ignored");
            }
            CaptureState::Recording(session) => {
                let elapsed = session.elapsed();
                match session.end() {
                    RecordingOutcome::Captured(pcm) => {
                        tracing::info!(
                            "Recording stopped: {} bytes in {:.1}s",
                            pcm.len(),
                            elapsed.as_secs_f32()
                        );
                        self.play_cue(Cue::RecordingStopped);
                        if self.utterances.send(pcm).is_err() {
                            tracing::error!("Utterance pipeline is gone, dropping recording");
                        }
                    }
                    RecordingOutcome::TooShort { bytes } => {
                        tracing::info!("Recording too short ({} bytes), dropped", bytes);
                    }
                }
            }
        }
    }

    fn play_cue(&self, cue: Cue) {
        if self.cues {
            audio_feedback::play(cue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CaptureError, CaptureHandle};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Scripted stand-in for the microphone: each `open` pops the next
    /// planned result; every successful open counts its `stop`.
    struct ScriptedDevice {
        script: RefCell<VecDeque<Result<Vec<u8>, CaptureError>>>,
        opens: Rc<RefCell<usize>>,
        stops: Rc<RefCell<usize>>,
    }

    struct ScriptedHandle {
        pcm: Vec<u8>,
        stops: Rc<RefCell<usize>>,
    }

    impl CaptureDevice for ScriptedDevice {
        fn open(
            &self,
            _format: AudioFormat,
            _window: Duration,
        ) -> Result<Box<dyn CaptureHandle>, CaptureError> {
            *self.opens.borrow_mut() += 1;
            let pcm = self
                .script
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(vec![0u8; 3200]))?;
            Ok(Box::new(ScriptedHandle {
                pcm,
                stops: self.stops.clone(),
            }))
        }
    }

    impl CaptureHandle for ScriptedHandle {
        fn stop(self: Box<Self>) -> Vec<u8> {
            *self.stops.borrow_mut() += 1;
            self.pcm
        }
    }

    struct Harness {
        app: App,
        signals: Arc<HotkeySignals>,
        utterances: mpsc::UnboundedReceiver<Vec<u8>>,
        opens: Rc<RefCell<usize>>,
        stops: Rc<RefCell<usize>>,
    }

    fn harness(script: Vec<Result<Vec<u8>, CaptureError>>) -> Harness {
        let opens = Rc::new(RefCell::new(0));
        let stops = Rc::new(RefCell::new(0));
        let device = ScriptedDevice {
            script: RefCell::new(script.into()),
            opens: opens.clone(),
            stops: stops.clone(),
        };
        let signals = Arc::new(HotkeySignals::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(
            signals.clone(),
            Box::new(device),
            AudioFormat::default(),
            Duration::from_secs(60),
            false,
            tx,
        );
        Harness {
            app,
            signals,
            utterances: rx,
            opens,
            stops,
        }
    }

    #[test]
    fn test_press_release_produces_one_utterance() {
        let mut h = harness(vec![Ok(vec![7u8; 3200])]);

        h.signals.press();
        h.app.poll();
        h.signals.release();
        h.app.poll();

        assert_eq!(h.utterances.try_recv().unwrap(), vec![7u8; 3200]);
        assert!(h.utterances.try_recv().is_err());
        assert_eq!(*h.opens.borrow(), 1);
        assert_eq!(*h.stops.borrow(), 1);
    }

    #[test]
    fn test_start_edge_while_recording_never_opens_a_second_device() {
        let mut h = harness(vec![]);

        h.signals.press();
        h.app.poll();
        // Release and re-press land inside one tick: the stray start edge is
        // consumed while still recording and must not open a second device or
        // leave a stuck flag behind.
        h.signals.release();
        h.signals.press();
        h.app.poll();
        h.signals.release();
        h.app.poll();

        assert_eq!(*h.opens.borrow(), 1);
        assert_eq!(*h.stops.borrow(), 1);
        assert_eq!(h.utterances.len(), 1);

        // And the next ordinary press/release pair records normally.
        h.signals.press();
        h.app.poll();
        h.signals.release();
        h.app.poll();
        assert_eq!(*h.opens.borrow(), 2);
        assert_eq!(*h.stops.borrow(), 2);
        assert_eq!(h.utterances.len(), 2);
    }

    #[test]
    fn test_too_short_recording_is_dropped() {
        let mut h = harness(vec![Ok(vec![0u8; 1599])]);

        h.signals.press();
        h.app.poll();
        h.signals.release();
        h.app.poll();

        assert!(h.utterances.try_recv().is_err());
        // Device still released exactly once.
        assert_eq!(*h.stops.borrow(), 1);
    }

    #[test]
    fn test_device_unavailable_leaves_app_ready() {
        let mut h = harness(vec![
            Err(CaptureError::DeviceUnavailable("unplugged".into())),
            Ok(vec![9u8; 3200]),
        ]);

        h.signals.press();
        h.app.poll();
        h.signals.release();
        h.app.poll();
        assert!(h.utterances.try_recv().is_err());

        // Next press works without any manual reset.
        h.signals.press();
        h.app.poll();
        h.signals.release();
        h.app.poll();
        assert_eq!(h.utterances.try_recv().unwrap(), vec![9u8; 3200]);
    }

    #[test]
    fn test_stop_edge_while_idle_is_a_no_op() {
        let mut h = harness(vec![]);

        h.signals.press();
        h.signals.release();
        h.signals.take_start(); // swallow the start so only stop remains
        h.app.poll();

        assert_eq!(*h.opens.borrow(), 0);
        assert!(h.utterances.try_recv().is_err());
    }

    #[test]
    fn test_tap_within_one_tick_forms_one_session() {
        let mut h = harness(vec![Ok(vec![1u8; 3200])]);

        h.signals.press();
        h.signals.release();
        h.app.poll();

        assert_eq!(*h.opens.borrow(), 1);
        assert_eq!(*h.stops.borrow(), 1);
        assert_eq!(h.utterances.try_recv().unwrap(), vec![1u8; 3200]);
    }
}
