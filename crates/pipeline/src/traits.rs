use std::future::Future;
use std::path::Path;

use bytes::Bytes;
use ink_transcript::ChunkResult;

use crate::error::StageError;
use crate::planner::ChunkSpec;

/// Byte transfer against the storage provider. Downloads stream to disk
/// because source media can dwarf memory; uploads carry rendered
/// transcripts and stay small. Implementations classify their own
/// failures: network flakes and provider 5xx map to
/// [`StageError::Transient`], everything else is fatal.
pub trait Storage: Send + Sync {
    /// Fetch `path` into `dest`, returning the byte count written.
    fn download_to(
        &self,
        path: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<u64, StageError>> + Send;

    fn upload(
        &self,
        path: &str,
        data: Bytes,
    ) -> impl Future<Output = Result<(), StageError>> + Send;
}

/// One provider call for one chunk: chunk-relative audio in, chunk-relative
/// timed segments out. The implementation sets `index` from the descriptor.
pub trait Transcriber: Send + Sync {
    fn transcribe_chunk(
        &self,
        chunk: &ChunkSpec,
        audio: Bytes,
    ) -> impl Future<Output = Result<ChunkResult, StageError>> + Send;
}

/// Media probing and encoding. The production implementation shells out to
/// ffmpeg; tests substitute a fake so the orchestrator runs without the
/// binary installed.
pub trait MediaProcessor: Send + Sync {
    fn probe_duration(&self, input: &Path) -> impl Future<Output = Result<f64, StageError>> + Send;

    /// Re-encode to the speech profile at `bitrate_bps`; returns the output
    /// size in bytes.
    fn transcode(
        &self,
        input: &Path,
        output: &Path,
        bitrate_bps: u32,
    ) -> impl Future<Output = Result<u64, StageError>> + Send;

    fn extract_slice(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        duration_secs: f64,
        bitrate_bps: u32,
    ) -> impl Future<Output = Result<(), StageError>> + Send;
}

/// ffmpeg/ffprobe-backed [`MediaProcessor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegProcessor;

impl MediaProcessor for FfmpegProcessor {
    async fn probe_duration(&self, input: &Path) -> Result<f64, StageError> {
        Ok(ink_media::probe_duration(input).await?)
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        bitrate_bps: u32,
    ) -> Result<u64, StageError> {
        ink_media::transcode(input, output, ink_media::SpeechProfile { bitrate_bps }).await?;
        let meta = tokio::fs::metadata(output).await?;
        Ok(meta.len())
    }

    async fn extract_slice(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        duration_secs: f64,
        bitrate_bps: u32,
    ) -> Result<(), StageError> {
        ink_media::extract_slice(
            input,
            output,
            start_secs,
            duration_secs,
            ink_media::SpeechProfile { bitrate_bps },
        )
        .await?;
        Ok(())
    }
}

/// Human-facing completion/failure signal. Delivery problems are logged and
/// swallowed by the orchestrator; a finished transcript is never failed
/// retroactively by its announcement.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        notification: &JobNotification,
    ) -> impl Future<Output = Result<(), StageError>> + Send;
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct JobNotification {
    pub job_id: String,
    pub file_name: String,
    pub completed: bool,
    pub duration_secs: f64,
    pub word_count: usize,
    pub error: Option<String>,
}

/// No-op notifier for setups without a notification channel configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    async fn notify(&self, _notification: &JobNotification) -> Result<(), StageError> {
        Ok(())
    }
}
