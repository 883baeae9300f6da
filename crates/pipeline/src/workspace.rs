use std::path::{Path, PathBuf};

use ink_transcript::ChunkResult;

use crate::error::StageError;
use crate::planner::ChunkSpec;

/// Durable chunk plan, written once per job and immutable afterwards.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChunkPlanFile {
    pub duration_secs: f64,
    pub slice_bitrate_bps: u32,
    pub chunks: Vec<ChunkSpec>,
}

/// Per-job scratch directory: the downloaded source, the prepared audio,
/// chunk slices, and per-chunk transcription results, all keyed by job id
/// so a restarted worker resumes instead of redoing finished work.
///
/// Nothing here is deleted mid-job; cleanup happens exactly once, at a
/// terminal state (or timeout), via [`JobWorkspace::cleanup`].
pub struct JobWorkspace {
    root: PathBuf,
}

impl JobWorkspace {
    pub fn new(work_dir: &Path, job_id: &str) -> Self {
        Self {
            root: work_dir.join(job_id),
        }
    }

    pub async fn ensure(&self) -> Result<(), StageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_path(&self, file_name: &str) -> PathBuf {
        let ext = ink_media::extension_of(file_name).unwrap_or_else(|| "bin".to_string());
        self.root.join(format!("source.{ext}"))
    }

    pub fn prepared_path(&self) -> PathBuf {
        self.root.join("prepared.mp3")
    }

    pub fn plan_path(&self) -> PathBuf {
        self.root.join("plan.json")
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.root.join("transcript.json")
    }

    pub fn markdown_path(&self) -> PathBuf {
        self.root.join("transcript.md")
    }

    pub fn chunk_slice_path(&self, index: usize) -> PathBuf {
        self.root.join(format!("chunk_{index:03}.mp3"))
    }

    pub fn chunk_result_path(&self, index: usize) -> PathBuf {
        self.root.join(format!("chunk_{index:03}.json"))
    }

    pub async fn save_plan(&self, plan: &ChunkPlanFile) -> Result<(), StageError> {
        let json = serde_json::to_vec_pretty(plan).map_err(StageError::fatal)?;
        tokio::fs::write(self.plan_path(), json).await?;
        Ok(())
    }

    pub async fn load_plan(&self) -> Result<Option<ChunkPlanFile>, StageError> {
        match tokio::fs::read(self.plan_path()).await {
            Ok(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(StageError::fatal)?,
            )),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save_chunk_result(&self, result: &ChunkResult) -> Result<(), StageError> {
        let json = serde_json::to_vec(result).map_err(StageError::fatal)?;
        tokio::fs::write(self.chunk_result_path(result.index), json).await?;
        Ok(())
    }

    /// Cached result from a previous attempt of this job, if any. A corrupt
    /// cache file is treated as absent and re-transcribed.
    pub async fn load_chunk_result(&self, index: usize) -> Option<ChunkResult> {
        let bytes = tokio::fs::read(self.chunk_result_path(index)).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::warn!(
                    chunk = index,
                    error = %err,
                    "discarding_unreadable_chunk_cache"
                );
                None
            }
        }
    }

    pub async fn cleanup(&self) {
        if let Err(err) = tokio::fs::remove_dir_all(&self.root).await
            && err.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(root = %self.root.display(), error = %err, "workspace_cleanup_failed");
        }
    }
}
