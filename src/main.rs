mod app;
mod audio;
mod audio_feedback;
mod config;
mod hotkey;
mod logging;
mod pipeline;
mod text_injection;
mod text_processing;
mod transcription;

use app::App;
use audio::{AudioFormat, CpalCaptureDevice};
use config::Config;
use text_processing::TextProcessor;
use transcription::{Transcriber, WhisperClient};

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = logging::init()?;

    tracing::info!("Starting whisperkey push-to-talk dictation");

    let config = Config::load()?;
    config.validate()?;
    let api_key = config::api_key()?;

    // The capture stream is !Send, so the poll loop runs on a LocalSet.
    let local = tokio::task::LocalSet::new();
    local.run_until(run_app(config, api_key)).await
}

async fn run_app(config: Config, api_key: String) -> Result<()> {
    let signals = Arc::new(hotkey::HotkeySignals::new());
    let key = hotkey::parse_key(&config.hotkey)?;
    let claimed = hotkey::install(key, signals.clone())?;

    let transcriber: Arc<dyn Transcriber> = Arc::new(WhisperClient::new(
        &config.endpoint,
        api_key,
        &config.model,
        Duration::from_secs(config.request_timeout_secs),
    )?);
    let processor = Arc::new(TextProcessor::new(&config.word_overrides));
    let injector = text_injection::spawn()?;

    let format = AudioFormat::default(); // 16kHz, 16-bit, mono
    let (utterance_tx, utterance_rx) = mpsc::unbounded_channel();
    pipeline::spawn(utterance_rx, format, transcriber, processor, injector);

    let poller = App::new(
        signals,
        Box::new(CpalCaptureDevice),
        format,
        Duration::from_secs(config.max_record_secs),
        config.audio_feedback,
        utterance_tx,
    );
    tokio::task::spawn_local(poller.run());

    tracing::info!(
        "Ready! Hold {} to dictate ({} input devices claimed)",
        config.hotkey,
        claimed
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, shutting down");
    Ok(())
}
