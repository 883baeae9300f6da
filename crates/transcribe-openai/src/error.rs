#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("transcription api error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("payload of {size} bytes exceeds the provider limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
}

impl Error {
    /// Worth retrying: network-level failures, rate limiting, provider 5xx.
    /// Quota exhaustion looks like rate limiting but never recovers within a
    /// job, so it is excluded.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::Api { status, .. } => {
                if self.is_quota() {
                    return false;
                }
                status.as_u16() == 429 || status.is_server_error()
            }
            Self::PayloadTooLarge { .. } => false,
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, Self::Api { body, .. } if body.contains("insufficient_quota"))
    }
}
