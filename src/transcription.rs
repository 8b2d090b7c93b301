use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TranscribeError {
    #[error("Transcription request failed: {0}")]
    Network(String),

    #[error("Transcription service returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Could not parse transcription response: {0}")]
    Parse(String),

    #[error("Transcription response has no top-level \"text\" field")]
    MissingText,
}

/// Seam over the speech-to-text service. One attempt per utterance; a failure
/// is terminal for that recording and the user re-records.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, TranscribeError>;
}

/// Client for an OpenAI-compatible `/audio/transcriptions` endpoint.
///
/// Sends the WAV container as a multipart `file` field next to a `model`
/// field, bearer-authorized, with a bounded request timeout.
pub struct WhisperClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl WhisperClient {
    pub fn new(
        endpoint: &str,
        api_key: String,
        model: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            api_key,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, TranscribeError> {
        let file = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscribeError::Network(e.to_string()))?;
        let form = multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone());

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscribeError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscribeError::Network(e.to_string()))?;

        if !status.is_success() {
            // Keep the body verbatim so the log shows what the service
            // objected to.
            return Err(TranscribeError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        extract_text(&body)
    }
}

/// The response carries fields we never read (segments, language, timings);
/// only the top-level `text` counts, so a `text` nested inside some other
/// object is never mistaken for the transcript.
#[derive(Deserialize)]
struct TranscriptionEnvelope {
    text: Option<String>,
}

fn extract_text(body: &str) -> Result<String, TranscribeError> {
    let envelope: TranscriptionEnvelope =
        serde_json::from_str(body).map_err(|e| TranscribeError::Parse(e.to_string()))?;
    match envelope.text {
        Some(text) => Ok(text.trim().to_string()),
        None => Err(TranscribeError::MissingText),
    }
}
