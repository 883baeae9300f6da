use std::path::PathBuf;

use backon::{ExponentialBuilder, Retryable};
use bytes::Bytes;
use ink_ledger::{FileRef, JobRecord, JobState, JobStore};
use ink_transcript::{ChunkResult, Transcript};

use crate::compress::{CompressOutcome, compress};
use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::planner;
use crate::traits::{JobNotification, MediaProcessor, Notifier, Storage, Transcriber};
use crate::transcribe::transcribe_chunks;
use crate::workspace::{ChunkPlanFile, JobWorkspace};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Ledger(#[from] ink_ledger::Error),
}

/// Drives one job through the stage sequence, recording every transition
/// durably before the next stage runs.
///
/// Restart-safe by construction: the job store remembers which stage was in
/// flight, and every stage either finds its artifacts from a previous
/// attempt (downloaded source, chunk plan, cached chunk results) or redoes
/// its own work. Transient failures retry the current stage only; anything
/// else fails the job with the cause recorded, and no partial output is
/// ever uploaded.
pub struct Orchestrator<S, T, N, M> {
    storage: S,
    transcriber: T,
    notifier: N,
    media: M,
    jobs: JobStore,
    cfg: PipelineConfig,
    work_dir: PathBuf,
    processed_folder: String,
}

impl<S, T, N, M> Orchestrator<S, T, N, M>
where
    S: Storage,
    T: Transcriber,
    N: Notifier,
    M: MediaProcessor,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: S,
        transcriber: T,
        notifier: N,
        media: M,
        jobs: JobStore,
        cfg: PipelineConfig,
        work_dir: impl Into<PathBuf>,
        processed_folder: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            transcriber,
            notifier,
            media,
            jobs,
            cfg,
            work_dir: work_dir.into(),
            processed_folder: processed_folder.into(),
        }
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    /// Run the job to a terminal state. Re-invoking with an id that already
    /// reached a terminal state is a no-op returning the stored record.
    pub async fn run(&self, job_id: &str, file: FileRef) -> Result<JobRecord, OrchestratorError> {
        let mut record = self.jobs.create_or_load(JobRecord::new(job_id, file))?;
        if record.state.is_terminal() {
            tracing::info!(job_id = %job_id, state = %record.state, "job_already_terminal");
            return Ok(record);
        }

        let workspace = JobWorkspace::new(&self.work_dir, job_id);
        if let Err(err) = workspace.ensure().await {
            return self.fail(job_id, &workspace, &record, err).await;
        }

        loop {
            let state = record.state;
            match self.run_stage(&record, &workspace).await {
                Ok(next) => {
                    record = self.jobs.transition(job_id, next)?;
                    tracing::info!(
                        job_id = %job_id,
                        prior = %state,
                        next = %next,
                        "stage_transition"
                    );
                    if next == JobState::Completed {
                        self.announce(&record, None).await;
                        workspace.cleanup().await;
                        return Ok(record);
                    }
                }
                Err(err) => {
                    return self.fail(job_id, &workspace, &record, err).await;
                }
            }
        }
    }

    /// Execute the stage the job is currently in and name the follow-up
    /// state. Transient errors are retried here, bounded per stage.
    async fn run_stage(
        &self,
        record: &JobRecord,
        workspace: &JobWorkspace,
    ) -> Result<JobState, StageError> {
        let state = record.state;
        let backoff = ExponentialBuilder::default()
            .with_jitter()
            .with_min_delay(self.cfg.retry_base_delay())
            .with_max_delay(self.cfg.retry_max_delay())
            .with_max_times(self.cfg.max_retries_per_stage.saturating_sub(1) as usize);

        (|| async {
            let _ = self.jobs.bump_attempt(&record.id, &state.to_string());
            self.execute(state, record, workspace).await
        })
        .retry(backoff)
        .when(StageError::is_transient)
        .notify(|err, delay| {
            tracing::warn!(
                job_id = %record.id,
                stage = %state,
                error = %err,
                retry_delay_ms = delay.as_millis(),
                "retrying_stage"
            );
        })
        .await
    }

    async fn execute(
        &self,
        state: JobState,
        record: &JobRecord,
        workspace: &JobWorkspace,
    ) -> Result<JobState, StageError> {
        match state {
            JobState::Queued => Ok(JobState::Downloading),
            JobState::Downloading => self.download(record, workspace).await,
            JobState::Sizing => self.size(record, workspace).await,
            JobState::Compressing => self.compress_source(record, workspace).await,
            JobState::Chunking => self.chunk(record, workspace).await,
            JobState::Transcribing => self.transcribe(record, workspace).await,
            JobState::Merging => self.merge(record, workspace).await,
            JobState::Formatting => self.format(record, workspace).await,
            JobState::Uploading => self.upload(record, workspace).await,
            JobState::Notifying => Ok(JobState::Completed),
            JobState::Completed | JobState::Failed => Err(StageError::fatal(format!(
                "job {} re-entered terminal state {state}",
                record.id
            ))),
        }
    }

    async fn download(
        &self,
        record: &JobRecord,
        workspace: &JobWorkspace,
    ) -> Result<JobState, StageError> {
        let target = workspace.source_path(&record.file.name);
        if tokio::fs::try_exists(&target).await? {
            tracing::info!(job_id = %record.id, "source_already_downloaded");
            return Ok(JobState::Sizing);
        }

        // Stream into a sibling temp name first so a crash mid-download
        // never leaves a truncated file that a resume would trust.
        let partial = target.with_extension("partial");
        let bytes = self.storage.download_to(&record.file.path, &partial).await?;
        tokio::fs::rename(&partial, &target).await?;

        tracing::info!(
            job_id = %record.id,
            bytes,
            path = %record.file.path,
            "source_downloaded"
        );
        Ok(JobState::Sizing)
    }

    async fn size(
        &self,
        record: &JobRecord,
        workspace: &JobWorkspace,
    ) -> Result<JobState, StageError> {
        let source = workspace.source_path(&record.file.name);
        let size = tokio::fs::metadata(&source).await?.len();
        let duration = self.media.probe_duration(&source).await?;

        let decision = planner::plan(duration, size, &self.cfg)
            .map_err(|err| StageError::Fatal(err.to_string()))?;

        // Video always goes through audio extraction; audio only when the
        // planner asks for it.
        let needs_compression = decision.compress_to_bps.is_some()
            || !ink_media::is_audio_only(&record.file.name);

        tracing::info!(
            job_id = %record.id,
            size_bytes = size,
            duration_secs = duration,
            needs_compression,
            chunked = decision.is_chunked(),
            "source_sized"
        );

        if needs_compression {
            Ok(JobState::Compressing)
        } else {
            Ok(JobState::Chunking)
        }
    }

    async fn compress_source(
        &self,
        record: &JobRecord,
        workspace: &JobWorkspace,
    ) -> Result<JobState, StageError> {
        let source = workspace.source_path(&record.file.name);
        let size = tokio::fs::metadata(&source).await?.len();
        let duration = self.media.probe_duration(&source).await?;

        let bitrate = planner::compression_bitrate(duration, size, &self.cfg)
            .unwrap_or(self.cfg.bitrate_ceiling_bps);

        let outcome = compress(
            &self.media,
            &source,
            &workspace.prepared_path(),
            bitrate,
            &self.cfg,
        )
        .await?;

        if let CompressOutcome::StillOver { size_bytes } = outcome {
            tracing::info!(
                job_id = %record.id,
                size_bytes,
                "compressed_audio_still_over_limit_escalating_to_chunking"
            );
        }
        Ok(JobState::Chunking)
    }

    async fn chunk(
        &self,
        record: &JobRecord,
        workspace: &JobWorkspace,
    ) -> Result<JobState, StageError> {
        if workspace.load_plan().await?.is_some() {
            tracing::info!(job_id = %record.id, "chunk_plan_already_present");
            return Ok(JobState::Transcribing);
        }

        let prepared = self.prepared_audio(record, workspace).await?;
        let size = tokio::fs::metadata(&prepared).await?.len();
        let duration = self.media.probe_duration(&prepared).await?;

        let chunks = planner::plan_chunks(duration, size, &self.cfg)
            .map_err(|err| StageError::Fatal(err.to_string()))?;
        let plan = ChunkPlanFile {
            duration_secs: duration,
            slice_bitrate_bps: planner::slice_bitrate(duration, size, &self.cfg),
            chunks,
        };

        tracing::info!(
            job_id = %record.id,
            chunks = plan.chunks.len(),
            slice_bitrate_bps = plan.slice_bitrate_bps,
            "chunk_plan_computed"
        );
        workspace.save_plan(&plan).await?;
        Ok(JobState::Transcribing)
    }

    async fn transcribe(
        &self,
        record: &JobRecord,
        workspace: &JobWorkspace,
    ) -> Result<JobState, StageError> {
        let plan = self.required_plan(workspace).await?;
        let prepared = self.prepared_audio(record, workspace).await?;

        transcribe_chunks(
            &record.id,
            &prepared,
            &plan,
            workspace,
            &self.transcriber,
            &self.media,
            &self.cfg,
        )
        .await?;

        Ok(JobState::Merging)
    }

    async fn merge(
        &self,
        record: &JobRecord,
        workspace: &JobWorkspace,
    ) -> Result<JobState, StageError> {
        let plan = self.required_plan(workspace).await?;

        let mut results: Vec<ChunkResult> = Vec::with_capacity(plan.chunks.len());
        for chunk in &plan.chunks {
            let result = workspace.load_chunk_result(chunk.index).await.ok_or_else(|| {
                StageError::fatal(format!("chunk {} has no stored result", chunk.index))
            })?;
            results.push(result);
        }

        let offsets: Vec<f64> = plan.chunks.iter().map(|c| c.start_secs).collect();
        let transcript = ink_transcript::merge(&offsets, plan.duration_secs, results)
            .map_err(|err| StageError::Fatal(err.to_string()))?;

        tracing::info!(
            job_id = %record.id,
            segments = transcript.segments.len(),
            words = transcript.word_count(),
            "chunks_merged"
        );

        let json = serde_json::to_vec_pretty(&transcript).map_err(StageError::fatal)?;
        tokio::fs::write(workspace.transcript_path(), json).await?;
        Ok(JobState::Formatting)
    }

    async fn format(
        &self,
        record: &JobRecord,
        workspace: &JobWorkspace,
    ) -> Result<JobState, StageError> {
        let transcript = self.stored_transcript(workspace).await?;
        let markdown = ink_transcript::to_markdown(&record.file.name, &transcript);
        tokio::fs::write(workspace.markdown_path(), markdown).await?;
        Ok(JobState::Uploading)
    }

    async fn upload(
        &self,
        record: &JobRecord,
        workspace: &JobWorkspace,
    ) -> Result<JobState, StageError> {
        let stem = std::path::Path::new(&record.file.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&record.file.name)
            .to_string();

        let markdown = tokio::fs::read(workspace.markdown_path()).await?;
        let json = tokio::fs::read(workspace.transcript_path()).await?;

        let md_path = format!("{}/{stem}.md", self.processed_folder);
        let json_path = format!("{}/{stem}.json", self.processed_folder);

        self.storage.upload(&md_path, Bytes::from(markdown)).await?;
        self.storage.upload(&json_path, Bytes::from(json)).await?;

        tracing::info!(
            job_id = %record.id,
            md = %md_path,
            json = %json_path,
            "transcript_uploaded"
        );
        Ok(JobState::Notifying)
    }

    async fn prepared_audio(
        &self,
        record: &JobRecord,
        workspace: &JobWorkspace,
    ) -> Result<PathBuf, StageError> {
        let prepared = workspace.prepared_path();
        if tokio::fs::try_exists(&prepared).await? {
            Ok(prepared)
        } else {
            Ok(workspace.source_path(&record.file.name))
        }
    }

    async fn required_plan(&self, workspace: &JobWorkspace) -> Result<ChunkPlanFile, StageError> {
        workspace
            .load_plan()
            .await?
            .ok_or_else(|| StageError::fatal("chunk plan missing from workspace"))
    }

    async fn stored_transcript(&self, workspace: &JobWorkspace) -> Result<Transcript, StageError> {
        let bytes = tokio::fs::read(workspace.transcript_path()).await?;
        serde_json::from_slice(&bytes).map_err(StageError::fatal)
    }

    async fn fail(
        &self,
        job_id: &str,
        workspace: &JobWorkspace,
        record: &JobRecord,
        err: StageError,
    ) -> Result<JobRecord, OrchestratorError> {
        tracing::error!(job_id = %job_id, stage = %record.state, error = %err, "job_failed");
        let failed = self.jobs.record_failure(job_id, &err.to_string())?;
        self.announce(&failed, Some(err.to_string())).await;
        workspace.cleanup().await;
        Ok(failed)
    }

    /// Best-effort completion/failure signal. A transcript that made it to
    /// storage is never failed because the announcement did not.
    async fn announce(&self, record: &JobRecord, error: Option<String>) {
        let (duration_secs, word_count) = match error {
            Some(_) => (0.0, 0),
            None => {
                // The workspace is about to be cleaned; stats come from the
                // record's last known transcript if still readable.
                let workspace = JobWorkspace::new(&self.work_dir, &record.id);
                match self.stored_transcript(&workspace).await {
                    Ok(t) => (t.duration, t.word_count()),
                    Err(_) => (0.0, 0),
                }
            }
        };

        let notification = JobNotification {
            job_id: record.id.clone(),
            file_name: record.file.name.clone(),
            completed: record.state == JobState::Completed,
            duration_secs,
            word_count,
            error,
        };

        if let Err(err) = self.notifier.notify(&notification).await {
            tracing::warn!(
                job_id = %record.id,
                error = %err,
                "notification_failed_ignoring"
            );
        }
    }
}
