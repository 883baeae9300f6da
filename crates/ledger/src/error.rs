use crate::jobs::JobState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("store {path} changed underneath the writer (expected version {expected})")]
    Conflict { path: String, expected: u64 },
    #[error("gave up after {attempts} contended writes to {path}")]
    Contention { path: String, attempts: u32 },
    #[error("job {job_id} not found")]
    JobNotFound { job_id: String },
    #[error("job {job_id} is already terminal ({state}) and cannot change")]
    TerminalState { job_id: String, state: JobState },
}
