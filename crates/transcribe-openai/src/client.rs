use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use crate::error::Error;
use crate::types::VerboseResponse;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "whisper-1";

/// 25 MiB, the provider's documented hard ceiling on a single upload.
pub const PROVIDER_LIMIT_BYTES: usize = 25 * 1024 * 1024;

pub struct WhisperClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    language: Option<String>,
    max_payload_bytes: usize,
}

#[derive(Default)]
pub struct WhisperClientBuilder {
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    language: Option<String>,
    max_payload_bytes: Option<usize>,
}

impl WhisperClientBuilder {
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = Some(limit);
        self
    }

    pub fn build(self) -> WhisperClient {
        WhisperClient {
            http: reqwest::Client::new(),
            api_base: self.api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: self.api_key.unwrap_or_default(),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            language: self.language,
            max_payload_bytes: self.max_payload_bytes.unwrap_or(PROVIDER_LIMIT_BYTES),
        }
    }
}

impl WhisperClient {
    pub fn builder() -> WhisperClientBuilder {
        WhisperClientBuilder::default()
    }

    /// Transcribe one audio payload. The payload must already be within the
    /// provider limit; the planner upstream exists to guarantee that, and an
    /// oversized payload here is a bug surfaced as [`Error::PayloadTooLarge`]
    /// rather than a provider round-trip.
    pub async fn transcribe(
        &self,
        file_name: &str,
        audio: Bytes,
    ) -> Result<VerboseResponse, Error> {
        if audio.len() > self.max_payload_bytes {
            return Err(Error::PayloadTooLarge {
                size: audio.len(),
                limit: self.max_payload_bytes,
            });
        }

        let mut form = Form::new()
            .part(
                "file",
                Part::stream(audio).file_name(file_name.to_string()),
            )
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let url = format!("{}/audio/transcriptions", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, body });
        }

        let parsed: VerboseResponse = response.json().await?;
        tracing::debug!(
            file = %file_name,
            segments = parsed.segments.len(),
            chars = parsed.text.len(),
            "transcription_response"
        );
        Ok(parsed)
    }
}
