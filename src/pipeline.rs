use crate::audio::{AudioFormat, wav};
use crate::text_injection::InjectorHandle;
use crate::text_processing::TextProcessor;
use crate::transcription::Transcriber;

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Fan out one worker per finished recording: encode, transcribe, post-
/// process, paste. Workers run concurrently, so a slow transcription never
/// delays the next recording; only the injector's single paste slot orders
/// them at the end.
pub fn spawn(
    mut recordings: mpsc::UnboundedReceiver<Vec<u8>>,
    format: AudioFormat,
    transcriber: Arc<dyn Transcriber>,
    processor: Arc<TextProcessor>,
    injector: InjectorHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(pcm) = recordings.recv().await {
            let transcriber = transcriber.clone();
            let processor = processor.clone();
            let injector = injector.clone();
            tokio::spawn(async move {
                process_utterance(pcm, format, transcriber, processor, injector).await;
            });
        }
    })
}

async fn process_utterance(
    pcm: Vec<u8>,
    format: AudioFormat,
    transcriber: Arc<dyn Transcriber>,
    processor: Arc<TextProcessor>,
    injector: InjectorHandle,
) {
    let wav = match wav::encode(&pcm, format) {
        Ok(wav) => wav,
        Err(e) => {
            tracing::error!("Could not encode recording: {}", e);
            return;
        }
    };

    tracing::info!("Transcribing {} bytes...", wav.len());
    let text = match transcriber.transcribe(wav).await {
        Ok(text) => text,
        // One attempt per utterance; the user re-records instead of retrying.
        Err(e) => {
            tracing::error!("Transcription failed: {}", e);
            return;
        }
    };

    let text = processor.apply(&text);
    if text.is_empty() {
        tracing::info!("Empty transcript, nothing to paste");
        return;
    }

    tracing::info!("Transcription: {}", text);
    if let Err(e) = injector.submit(text).await {
        tracing::error!("Could not queue paste: {}", e);
    }
}
