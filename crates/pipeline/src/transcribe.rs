use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use backon::{ExponentialBuilder, Retryable};
use futures_util::{StreamExt, TryStreamExt, stream};
use ink_transcript::ChunkResult;

use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::planner::ChunkSpec;
use crate::traits::{MediaProcessor, Transcriber};
use crate::workspace::{ChunkPlanFile, JobWorkspace};

/// Transcribe every chunk of the plan against `prepared` audio.
///
/// Chunks are independent and run with bounded parallelism
/// (`max_concurrent_chunks`). Each chunk retries transient provider
/// failures with exponential backoff, `max_retries_per_stage` attempts in
/// total. Results are cached in the workspace as they land, so a restarted
/// job only pays for chunks that never finished. One permanently failed
/// chunk fails the whole stage; no partial set of results escapes.
pub async fn transcribe_chunks<T, M>(
    job_id: &str,
    prepared: &Path,
    plan: &ChunkPlanFile,
    workspace: &JobWorkspace,
    transcriber: &T,
    media: &M,
    cfg: &PipelineConfig,
) -> Result<Vec<ChunkResult>, StageError>
where
    T: Transcriber,
    M: MediaProcessor,
{
    let chunked = plan.chunks.len() > 1;

    let results: Vec<ChunkResult> = stream::iter(plan.chunks.clone())
        .map(|chunk| {
            run_chunk(
                job_id, prepared, chunk, chunked, plan, workspace, transcriber, media, cfg,
            )
        })
        .buffer_unordered(cfg.max_concurrent_chunks.max(1))
        .try_collect()
        .await?;

    Ok(results)
}

#[allow(clippy::too_many_arguments)]
async fn run_chunk<T, M>(
    job_id: &str,
    prepared: &Path,
    chunk: ChunkSpec,
    chunked: bool,
    plan: &ChunkPlanFile,
    workspace: &JobWorkspace,
    transcriber: &T,
    media: &M,
    cfg: &PipelineConfig,
) -> Result<ChunkResult, StageError>
where
    T: Transcriber,
    M: MediaProcessor,
{
    if let Some(cached) = workspace.load_chunk_result(chunk.index).await {
        tracing::info!(job_id = %job_id, chunk = chunk.index, "chunk_result_cached");
        return Ok(cached);
    }

    let audio_path = if chunked {
        let slice = workspace.chunk_slice_path(chunk.index);
        media
            .extract_slice(
                prepared,
                &slice,
                chunk.start_secs,
                chunk.duration_secs(),
                plan.slice_bitrate_bps,
            )
            .await?;
        slice
    } else {
        prepared.to_path_buf()
    };

    let audio = bytes::Bytes::from(tokio::fs::read(&audio_path).await?);

    let attempts = AtomicU32::new(0);
    let backoff = ExponentialBuilder::default()
        .with_jitter()
        .with_min_delay(cfg.retry_base_delay())
        .with_max_delay(cfg.retry_max_delay())
        .with_max_times(cfg.max_retries_per_stage.saturating_sub(1) as usize);

    let result = (|| async {
        attempts.fetch_add(1, Ordering::Relaxed);
        transcriber.transcribe_chunk(&chunk, audio.clone()).await
    })
    .retry(backoff)
    .when(StageError::is_transient)
    .notify(|err, delay| {
        tracing::warn!(
            job_id = %job_id,
            chunk = chunk.index,
            error = %err,
            retry_delay_ms = delay.as_millis(),
            "retrying_chunk_transcription"
        );
    })
    .await;

    let attempts = attempts.load(Ordering::Relaxed);

    match result {
        Ok(result) => {
            workspace.save_chunk_result(&result).await?;
            if chunked {
                let _ = tokio::fs::remove_file(&audio_path).await;
            }
            tracing::info!(
                job_id = %job_id,
                chunk = chunk.index,
                segments = result.segments.len(),
                attempts,
                "chunk_transcribed"
            );
            Ok(result)
        }
        Err(err @ StageError::Quota(_)) => Err(err),
        Err(err) => Err(StageError::ChunkFailed {
            index: chunk.index,
            attempts,
            reason: err.to_string(),
        }),
    }
}
