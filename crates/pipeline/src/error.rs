/// Stage-level failure taxonomy. What a stage returns decides whether the
/// orchestrator retries in place, fails the job, or keeps going:
/// `Transient` is retried with bounded backoff, everything else fails the
/// job immediately with the cause recorded.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("provider quota exhausted: {0}")]
    Quota(String),
    #[error("corrupt or unreadable media: {0}")]
    CorruptMedia(String),
    #[error("chunk {index} failed permanently after {attempts} attempts: {reason}")]
    ChunkFailed {
        index: usize,
        attempts: u32,
        reason: String,
    },
    #[error("{0}")]
    Fatal(String),
}

impl StageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn transient(err: impl std::fmt::Display) -> Self {
        Self::Transient(err.to_string())
    }

    pub fn fatal(err: impl std::fmt::Display) -> Self {
        Self::Fatal(err.to_string())
    }
}

impl From<std::io::Error> for StageError {
    fn from(err: std::io::Error) -> Self {
        Self::Transient(err.to_string())
    }
}

impl From<ink_media::Error> for StageError {
    fn from(err: ink_media::Error) -> Self {
        match err {
            ink_media::Error::CorruptMedia(detail) => Self::CorruptMedia(detail),
            ink_media::Error::Io(io) => Self::Transient(io.to_string()),
            other => Self::Fatal(other.to_string()),
        }
    }
}
