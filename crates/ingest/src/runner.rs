use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use ink_ledger::FileRef;

#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: String,
    pub file: FileRef,
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to launch job: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Execution-platform seam. Submission is fire-and-forget: the gateway
/// never waits on job completion, only on hand-off. Idempotency comes from
/// the ledger claim taken before `submit` is called.
pub trait JobRunner: Send + Sync {
    fn submit(&self, request: &JobRequest) -> impl Future<Output = Result<(), RunnerError>> + Send;
}

/// Runs each job as a detached worker process, parameterized through the
/// environment. The worker owns the job from here; the gateway keeps
/// nothing in memory.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    worker_bin: PathBuf,
}

impl ProcessRunner {
    pub fn new(worker_bin: impl Into<PathBuf>) -> Self {
        Self {
            worker_bin: worker_bin.into(),
        }
    }

    pub fn job_env(request: &JobRequest) -> Vec<(&'static str, String)> {
        vec![
            ("JOB_ID", request.job_id.clone()),
            ("TARGET_FILE_ID", request.file.id.clone()),
            ("TARGET_FILE_PATH", request.file.path.clone()),
            ("TARGET_FILE_NAME", request.file.name.clone()),
            ("TARGET_FILE_SIZE", request.file.size.to_string()),
        ]
    }
}

impl JobRunner for ProcessRunner {
    async fn submit(&self, request: &JobRequest) -> Result<(), RunnerError> {
        let mut command = tokio::process::Command::new(&self.worker_bin);
        command
            .envs(Self::job_env(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command.spawn()?;
        tracing::info!(
            job_id = %request.job_id,
            file = %request.file.name,
            pid = child.id(),
            "worker_spawned"
        );
        Ok(())
    }
}
