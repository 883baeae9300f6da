mod client;
mod error;
mod types;
pub mod webhook;

pub use client::{DropboxClient, DropboxClientBuilder};
pub use error::Error;
pub use types::{Entry, EntryTag, ListFolderPage};
