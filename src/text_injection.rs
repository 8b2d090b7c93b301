use anyhow::Context;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Delay for the OS clipboard to propagate before the paste chord fires.
const CLIPBOARD_SETTLE: Duration = Duration::from_millis(100);
/// Delay for the target application to consume the clipboard before restore.
const PASTE_SETTLE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Error)]
pub enum InjectError {
    #[error("Clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    #[error("Clipboard write failed: {0}")]
    CopyFailed(String),

    #[error("Paste keystroke failed: {0}")]
    PasteFailed(String),

    #[error("Injector thread is gone")]
    WorkerGone,
}

pub trait ClipboardText {
    /// Current clipboard text. `None` covers both an empty clipboard and a
    /// failed read; callers treat the two the same way.
    fn get(&mut self) -> Option<String>;
    fn set(&mut self, text: &str) -> Result<(), InjectError>;
    fn clear(&mut self) -> Result<(), InjectError>;
}

pub trait PasteChord {
    /// Hold Ctrl, tap V, release Ctrl.
    fn send(&mut self) -> Result<(), InjectError>;
}

/// Handle for queueing transcripts onto the injector thread.
#[derive(Clone)]
pub struct InjectorHandle {
    tx: mpsc::Sender<String>,
}

impl InjectorHandle {
    pub(crate) fn from_sender(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    /// Queue a transcript for pasting. The queue holds a single slot, so this
    /// waits while a paste sequence is in flight; pastes land in submission
    /// order even when transcriptions overlap.
    pub async fn submit(&self, text: String) -> Result<(), InjectError> {
        self.tx.send(text).await.map_err(|_| InjectError::WorkerGone)
    }
}

/// Start the dedicated injector thread.
///
/// Clipboard and synthetic-input handles live on this one thread for the life
/// of the process: platform clipboards are thread-affine, and an X11-style
/// selection only survives while its owning connection does.
pub fn spawn() -> anyhow::Result<InjectorHandle> {
    let (tx, rx) = mpsc::channel(1);
    thread::Builder::new()
        .name("injector".into())
        .spawn(move || injector_thread(rx))
        .context("Failed to spawn injector thread")?;
    Ok(InjectorHandle::from_sender(tx))
}

fn injector_thread(mut rx: mpsc::Receiver<String>) {
    let mut clipboard = match SystemClipboard::new() {
        Ok(clipboard) => Some(clipboard),
        Err(e) => {
            tracing::error!("Clipboard unavailable, transcripts will be dropped: {}", e);
            None
        }
    };
    let mut chord = match EnigoChord::new() {
        Ok(chord) => Some(chord),
        Err(e) => {
            tracing::error!(
                "Synthetic input unavailable, transcripts will be dropped: {}",
                e
            );
            None
        }
    };

    while let Some(text) = rx.blocking_recv() {
        let (Some(clipboard), Some(chord)) = (clipboard.as_mut(), chord.as_mut()) else {
            tracing::error!("Injector backends missing, dropping {} chars", text.len());
            continue;
        };
        match paste_with(clipboard, chord, &text, thread::sleep) {
            Ok(()) => tracing::info!("Pasted {} chars", text.chars().count()),
            Err(e) => tracing::error!("Paste failed: {}", e),
        }
    }
}

/// One clipboard-preserving paste: snapshot, swap in the transcript, fire the
/// chord, then put the previous content back (or clear when there was none).
/// The snapshot is best-effort and never blocks the paste; restoration
/// failures are only logged.
fn paste_with(
    clipboard: &mut dyn ClipboardText,
    chord: &mut dyn PasteChord,
    text: &str,
    settle: fn(Duration),
) -> Result<(), InjectError> {
    let previous = clipboard.get();

    clipboard.set(text)?;
    settle(CLIPBOARD_SETTLE);
    chord.send()?;
    settle(PASTE_SETTLE);

    let restored = match &previous {
        Some(prev) => clipboard.set(prev),
        None => clipboard.clear(),
    };
    if let Err(e) = restored {
        tracing::warn!("Could not restore clipboard: {}", e);
    }

    Ok(())
}

struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    fn new() -> Result<Self, InjectError> {
        arboard::Clipboard::new()
            .map(|inner| Self { inner })
            .map_err(|e| InjectError::ClipboardUnavailable(e.to_string()))
    }
}

impl ClipboardText for SystemClipboard {
    fn get(&mut self) -> Option<String> {
        self.inner.get_text().ok()
    }

    fn set(&mut self, text: &str) -> Result<(), InjectError> {
        self.inner
            .set_text(text)
            .map_err(|e| InjectError::CopyFailed(e.to_string()))
    }

    fn clear(&mut self) -> Result<(), InjectError> {
        self.inner
            .clear()
            .map_err(|e| InjectError::CopyFailed(e.to_string()))
    }
}

struct EnigoChord {
    inner: enigo::Enigo,
}

impl EnigoChord {
    fn new() -> Result<Self, InjectError> {
        enigo::Enigo::new(&enigo::Settings::default())
            .map(|inner| Self { inner })
            .map_err(|e| InjectError::PasteFailed(e.to_string()))
    }
}

impl PasteChord for EnigoChord {
    fn send(&mut self) -> Result<(), InjectError> {
        use enigo::{Direction, Key, Keyboard};

        let chord = [
            (Key::Control, Direction::Press),
            (Key::Unicode('v'), Direction::Press),
            (Key::Unicode('v'), Direction::Release),
            (Key::Control, Direction::Release),
        ];
        for (key, direction) in chord {
            self.inner
                .key(key, direction)
                .map_err(|e| InjectError::PasteFailed(e.to_string()))?;
        }
        Ok(())
    }
}
