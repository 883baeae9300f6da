use bytes::Bytes;

use ink_dropbox::DropboxClient;
use ink_pipeline::{ChunkSpec, JobNotification, Notifier, StageError, Storage, Transcriber};
use ink_transcribe_openai::WhisperClient;
use ink_transcript::ChunkResult;

/// Dropbox as the pipeline's storage seam, classifying provider errors
/// into the retry taxonomy.
pub struct DropboxStorage {
    client: DropboxClient,
}

impl DropboxStorage {
    pub fn new(client: DropboxClient) -> Self {
        Self { client }
    }
}

fn classify_dropbox(err: ink_dropbox::Error) -> StageError {
    let transient = match &err {
        ink_dropbox::Error::Http(http) => {
            http.is_timeout() || http.is_connect() || http.is_request()
        }
        ink_dropbox::Error::Api { status, .. } => {
            status.as_u16() == 429 || status.is_server_error()
        }
        ink_dropbox::Error::Io(_) => true,
        _ => false,
    };

    if transient {
        StageError::transient(err)
    } else {
        StageError::fatal(err)
    }
}

impl Storage for DropboxStorage {
    async fn download_to(&self, path: &str, dest: &std::path::Path) -> Result<u64, StageError> {
        self.client
            .download_to(path, dest)
            .await
            .map_err(classify_dropbox)
    }

    async fn upload(&self, path: &str, data: Bytes) -> Result<(), StageError> {
        self.client
            .upload(path, data)
            .await
            .map_err(classify_dropbox)
    }
}

/// Whisper batch API as the per-chunk transcriber.
pub struct WhisperTranscriber {
    client: WhisperClient,
}

impl WhisperTranscriber {
    pub fn new(client: WhisperClient) -> Self {
        Self { client }
    }
}

impl Transcriber for WhisperTranscriber {
    async fn transcribe_chunk(
        &self,
        chunk: &ChunkSpec,
        audio: Bytes,
    ) -> Result<ChunkResult, StageError> {
        let file_name = format!("chunk_{:03}.mp3", chunk.index);
        let response = self
            .client
            .transcribe(&file_name, audio)
            .await
            .map_err(|err| {
                if err.is_quota() {
                    StageError::Quota(err.to_string())
                } else if err.is_transient() {
                    StageError::transient(err)
                } else {
                    StageError::fatal(err)
                }
            })?;

        Ok(ChunkResult {
            index: chunk.index,
            language: response.language.clone(),
            segments: response.into_segments(),
        })
    }
}

/// Slack incoming-webhook notifier; configured off when no URL is set.
pub struct SlackNotifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
        }
    }

    fn message_for(notification: &JobNotification) -> String {
        if notification.completed {
            format!(
                "Transcript ready: {} ({} words, {:.0} min)",
                notification.file_name,
                notification.word_count,
                notification.duration_secs / 60.0
            )
        } else {
            format!(
                "Transcription failed: {} ({})",
                notification.file_name,
                notification.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

impl Notifier for SlackNotifier {
    async fn notify(&self, notification: &JobNotification) -> Result<(), StageError> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("no_notification_channel_configured");
            return Ok(());
        };

        let payload = serde_json::json!({ "text": Self::message_for(notification) });
        let response = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(StageError::transient)?;

        if !response.status().is_success() {
            return Err(StageError::transient(format!(
                "notification endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(completed: bool) -> JobNotification {
        JobNotification {
            job_id: "job-1".into(),
            file_name: "standup.mp3".into(),
            completed,
            duration_secs: 2700.0,
            word_count: 5200,
            error: (!completed).then(|| "chunk 2 failed permanently".to_string()),
        }
    }

    #[test]
    fn completion_message_mentions_stats() {
        let text = SlackNotifier::message_for(&notification(true));
        assert!(text.contains("standup.mp3"));
        assert!(text.contains("5200 words"));
        assert!(text.contains("45 min"));
    }

    #[test]
    fn failure_message_carries_the_error() {
        let text = SlackNotifier::message_for(&notification(false));
        assert!(text.contains("failed"));
        assert!(text.contains("chunk 2"));
    }

    #[tokio::test]
    async fn unconfigured_notifier_is_a_noop() {
        let notifier = SlackNotifier::new(None);
        notifier.notify(&notification(true)).await.unwrap();
    }
}
