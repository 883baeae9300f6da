mod compress;
mod config;
mod error;
mod orchestrator;
mod planner;
mod traits;
mod transcribe;
mod workspace;

pub use compress::{CompressOutcome, compress};
pub use config::PipelineConfig;
pub use error::StageError;
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use planner::{
    ChunkSpec, PlanDecision, PlanError, compression_bitrate, plan, plan_chunks, slice_bitrate,
};
pub use traits::{
    FfmpegProcessor, JobNotification, MediaProcessor, Notifier, NullNotifier, Storage, Transcriber,
};
pub use transcribe::transcribe_chunks;
pub use workspace::{ChunkPlanFile, JobWorkspace};

pub use ink_ledger::{FileRef, JobRecord, JobState, JobStore};
