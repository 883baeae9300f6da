#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("media is unreadable or corrupt: {0}")]
    CorruptMedia(String),
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: String,
        stderr: String,
    },
    #[error("could not parse {tool} output: {detail}")]
    UnparsableOutput { tool: &'static str, detail: String },
}
