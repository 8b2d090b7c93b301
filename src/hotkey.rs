use anyhow::{Context, Result, bail};
use evdev::uinput::VirtualDevice;
use evdev::{AttributeSet, Device, EventType, KeyCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot start/stop edges bridging the device reader tasks to the poll
/// loop.
///
/// The producer side runs in the event readers and does nothing beyond atomic
/// stores; the poll loop is the only consumer and clears a flag as it reads
/// it. `held` is the producer's own view of the key, so a press only raises
/// `start` while the key is up and a release only raises `stop` while it is
/// down. Auto-repeats change nothing.
#[derive(Default)]
pub struct HotkeySignals {
    start: AtomicBool,
    stop: AtomicBool,
    held: AtomicBool,
}

impl HotkeySignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        if !self.held.swap(true, Ordering::AcqRel) {
            self.start.store(true, Ordering::Release);
        }
    }

    pub fn release(&self) {
        if self.held.swap(false, Ordering::AcqRel) {
            self.stop.store(true, Ordering::Release);
        }
    }

    pub fn take_start(&self) -> bool {
        self.start.swap(false, Ordering::AcqRel)
    }

    pub fn take_stop(&self) -> bool {
        self.stop.swap(false, Ordering::AcqRel)
    }
}

/// Map a configured key name to an evdev key. Only keys that make sense as a
/// dedicated push-to-talk trigger are accepted.
pub fn parse_key(name: &str) -> Result<KeyCode> {
    let key = match name.to_ascii_uppercase().as_str() {
        "SCROLLLOCK" | "SCROLL_LOCK" => KeyCode::KEY_SCROLLLOCK,
        "PAUSE" => KeyCode::KEY_PAUSE,
        "CAPSLOCK" | "CAPS_LOCK" => KeyCode::KEY_CAPSLOCK,
        "RIGHTCTRL" | "RIGHT_CTRL" => KeyCode::KEY_RIGHTCTRL,
        "RIGHTALT" | "RIGHT_ALT" => KeyCode::KEY_RIGHTALT,
        "RIGHTMETA" | "RIGHT_META" => KeyCode::KEY_RIGHTMETA,
        "F13" => KeyCode::KEY_F13,
        "F14" => KeyCode::KEY_F14,
        "F15" => KeyCode::KEY_F15,
        "F16" => KeyCode::KEY_F16,
        other => bail!(
            "Unsupported hotkey {:?} (expected one of SCROLLLOCK, PAUSE, CAPSLOCK, \
             RIGHTCTRL, RIGHTALT, RIGHTMETA, F13-F16)",
            other
        ),
    };
    Ok(key)
}

/// Grab every keyboard that exposes `key` and spawn a reader task per device.
///
/// Grabbed devices are mirrored through a uinput virtual device, so every key
/// except the hotkey keeps working and the hotkey itself never reaches other
/// applications. Returns the number of devices claimed; zero is an error
/// since the hotkey could then never fire.
pub fn install(key: KeyCode, signals: Arc<HotkeySignals>) -> Result<usize> {
    // Snapshot the device list before creating any passthrough device, so we
    // never claim one of our own mirrors.
    let candidates: Vec<(PathBuf, Device)> = evdev::enumerate()
        .filter(|(_, device)| {
            device.name().is_none_or(|n| !n.contains("whisperkey"))
                && device
                    .supported_keys()
                    .is_some_and(|keys| keys.contains(key))
        })
        .collect();

    let mut claimed = 0;
    for (path, device) in candidates {
        match claim_device(&path, device, key, signals.clone()) {
            Ok(()) => {
                tracing::info!("Listening on {}", path.display());
                claimed += 1;
            }
            Err(e) => tracing::warn!("Skipping {}: {:#}", path.display(), e),
        }
    }

    if claimed == 0 {
        bail!("No input device exposes the hotkey; is this user in the `input` group?");
    }
    Ok(claimed)
}

fn claim_device(
    path: &Path,
    mut device: Device,
    key: KeyCode,
    signals: Arc<HotkeySignals>,
) -> Result<()> {
    let mut keys = AttributeSet::<KeyCode>::new();
    if let Some(supported) = device.supported_keys() {
        for code in supported.iter() {
            keys.insert(code);
        }
    }

    let passthrough = VirtualDevice::builder()
        .context("uinput unavailable")?
        .name("whisperkey passthrough")
        .with_keys(&keys)
        .context("Failed to declare passthrough keys")?
        .build()
        .context("Failed to create passthrough device")?;

    device.grab().context("Failed to grab device")?;
    let events = device
        .into_event_stream()
        .context("Failed to open event stream")?;

    let label = path.display().to_string();
    tokio::spawn(read_events(label, events, passthrough, key, signals));
    Ok(())
}

async fn read_events(
    label: String,
    mut events: evdev::EventStream,
    mut passthrough: VirtualDevice,
    key: KeyCode,
    signals: Arc<HotkeySignals>,
) {
    loop {
        let event = match events.next_event().await {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("{}: event stream closed: {}", label, e);
                return;
            }
        };

        if event.event_type() != EventType::KEY {
            continue;
        }

        if event.code() == key.code() {
            // This path races the user's typing; flag stores only.
            match event.value() {
                1 => signals.press(),
                0 => signals.release(),
                _ => {} // auto-repeat, swallowed like the edges
            }
            continue;
        }

        if let Err(e) = passthrough.emit(&[event]) {
            tracing::warn!("{}: passthrough emit failed: {}", label, e);
        }
    }
}
