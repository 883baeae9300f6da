mod cursor;
mod error;
mod jobs;
mod processed;
mod store;

pub use cursor::CursorStore;
pub use error::Error;
pub use jobs::{FileRef, JobRecord, JobState, JobStore};
pub use processed::{Claim, DispatchStatus, ProcessedLedger, ProcessedRecord, file_identity};
pub use store::VersionedStore;
