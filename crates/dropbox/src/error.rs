#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("dropbox api error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    /// The provider invalidated the change cursor; callers must re-prime
    /// from a fresh listing.
    #[error("change cursor expired or was reset")]
    CursorReset,
}

impl Error {
    pub fn is_cursor_reset(&self) -> bool {
        matches!(self, Self::CursorReset)
    }
}
