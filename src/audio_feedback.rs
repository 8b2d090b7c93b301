use rodio::source::{SineWave, Source};
use rodio::{OutputStreamBuilder, Sink};
use std::time::Duration;

const CUE_DURATION: Duration = Duration::from_millis(120);

/// Audible confirmation that the hotkey did something: a high beep when
/// recording starts, a low one when a kept recording heads off to the
/// transcriber.
#[derive(Debug, Clone, Copy)]
pub enum Cue {
    RecordingStarted,
    RecordingStopped,
}

impl Cue {
    fn frequency(self) -> f32 {
        match self {
            Cue::RecordingStarted => 800.0,
            Cue::RecordingStopped => 400.0,
        }
    }
}

/// Fire-and-forget; a cue that fails to play is only worth a log line.
pub fn play(cue: Cue) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = play_blocking(cue) {
            tracing::warn!("Could not play audio cue: {}", e);
        }
    });
}

fn play_blocking(cue: Cue) -> Result<(), Box<dyn std::error::Error>> {
    let stream_handle = OutputStreamBuilder::open_default_stream()?;
    let sink = Sink::connect_new(stream_handle.mixer());
    sink.append(
        SineWave::new(cue.frequency())
            .take_duration(CUE_DURATION)
            .amplify(0.20),
    );
    sink.sleep_until_end();
    Ok(())
}
