//! Speech-to-text: audio bytes → transcript via an external service.
//!
//! [`WhisperApi`] posts multipart uploads to an OpenAI-compatible
//! `/v1/audio/transcriptions` endpoint. The credential is passed in at
//! construction; nothing is read from the environment.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// A transcript plus whatever metadata the service returned.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechTranscript {
    pub text: String,
    pub metadata: Value,
}

/// The speech-to-text call failed.
#[derive(Debug, Clone, Error)]
pub enum SpeechError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Response(String),
}

/// Transcribes audio.
#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<SpeechTranscript, SpeechError>;
}

/// OpenAI-compatible hosted Whisper transcription.
pub struct WhisperApi {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for WhisperApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperApi")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

impl WhisperApi {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl SpeechService for WhisperApi {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<SpeechTranscript, SpeechError> {
        info!(
            "Transcribing {} ({} bytes) with {}",
            filename,
            audio.len(),
            self.model
        );

        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", Part::bytes(audio).file_name(filename.to_string()));

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SpeechError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let metadata: Value = response
            .json()
            .await
            .map_err(|e| SpeechError::Response(e.to_string()))?;

        let transcript = parse_transcription(metadata)?;
        debug!("Transcript: {} chars", transcript.text.len());
        Ok(transcript)
    }
}

/// Pull the `text` field out of a transcription response, keeping the rest
/// as metadata.
pub fn parse_transcription(metadata: Value) -> Result<SpeechTranscript, SpeechError> {
    if !metadata.is_object() {
        return Err(SpeechError::Response(format!(
            "expected a JSON object, got {metadata}"
        )));
    }
    let text = metadata
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(SpeechTranscript { text, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_field_extracted_metadata_kept() {
        let t = parse_transcription(json!({"text": "hello there", "language": "en"})).unwrap();
        assert_eq!(t.text, "hello there");
        assert_eq!(t.metadata["language"], "en");
    }

    #[test]
    fn missing_text_is_empty() {
        let t = parse_transcription(json!({"duration": 3.2})).unwrap();
        assert_eq!(t.text, "");
    }

    #[test]
    fn non_object_rejected() {
        assert!(parse_transcription(json!(["nope"])).is_err());
    }

    #[test]
    fn debug_hides_key() {
        let api = WhisperApi::new("sk-secret", "whisper-1", "http://localhost/v1");
        assert!(!format!("{api:?}").contains("sk-secret"));
    }
}
