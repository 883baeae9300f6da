use std::time::Duration;

fn default_target_bytes() -> u64 {
    24 * 1024 * 1024
}
fn default_provider_limit_bytes() -> u64 {
    25 * 1024 * 1024
}
fn default_chunk_window_secs() -> f64 {
    600.0
}
fn default_min_chunk_window_secs() -> f64 {
    60.0
}
fn default_max_call_secs() -> f64 {
    1800.0
}
fn default_max_retries_per_stage() -> u32 {
    3
}
fn default_max_concurrent_chunks() -> usize {
    4
}
fn default_bitrate_floor_bps() -> u32 {
    16_000
}
fn default_bitrate_ceiling_bps() -> u32 {
    64_000
}
fn default_retry_base_delay_ms() -> u64 {
    1_000
}
fn default_retry_max_delay_ms() -> u64 {
    60_000
}
fn default_job_timeout_secs() -> u64 {
    3_600
}
fn default_claim_ttl_secs() -> u64 {
    24 * 60 * 60
}

/// Every tunable the pipeline reads, in one place. Defaults mirror the
/// provider's 25 MiB upload ceiling with a 24 MiB compression target,
/// ten-minute chunk windows, and a 16-64 kbps speech bitrate clamp.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PipelineConfig {
    /// Compression kicks in above this size.
    #[serde(default = "default_target_bytes")]
    pub target_bytes: u64,
    /// Hard per-upload ceiling imposed by the transcription provider.
    #[serde(default = "default_provider_limit_bytes")]
    pub provider_limit_bytes: u64,
    #[serde(default = "default_chunk_window_secs")]
    pub chunk_window_secs: f64,
    /// Window halving stops here; hitting it fails the plan.
    #[serde(default = "default_min_chunk_window_secs")]
    pub min_chunk_window_secs: f64,
    /// Longest audio sent in a single provider call, regardless of size.
    #[serde(default = "default_max_call_secs")]
    pub max_call_secs: f64,
    /// Total attempts per stage (first try included).
    #[serde(default = "default_max_retries_per_stage")]
    pub max_retries_per_stage: u32,
    #[serde(default = "default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,
    #[serde(default = "default_bitrate_floor_bps")]
    pub bitrate_floor_bps: u32,
    #[serde(default = "default_bitrate_ceiling_bps")]
    pub bitrate_ceiling_bps: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    /// Dispatched-but-unfinished ledger claims older than this are
    /// reclaimable.
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_bytes: default_target_bytes(),
            provider_limit_bytes: default_provider_limit_bytes(),
            chunk_window_secs: default_chunk_window_secs(),
            min_chunk_window_secs: default_min_chunk_window_secs(),
            max_call_secs: default_max_call_secs(),
            max_retries_per_stage: default_max_retries_per_stage(),
            max_concurrent_chunks: default_max_concurrent_chunks(),
            bitrate_floor_bps: default_bitrate_floor_bps(),
            bitrate_ceiling_bps: default_bitrate_ceiling_bps(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            job_timeout_secs: default_job_timeout_secs(),
            claim_ttl_secs: default_claim_ttl_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn claim_ttl(&self) -> Duration {
        Duration::from_secs(self.claim_ttl_secs)
    }
}
