mod client;
mod error;
mod types;

pub use client::{WhisperClient, WhisperClientBuilder};
pub use error::Error;
pub use types::{VerboseResponse, VerboseSegment};
