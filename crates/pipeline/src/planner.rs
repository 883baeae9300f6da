use crate::config::PipelineConfig;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChunkSpec {
    pub index: usize,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl ChunkSpec {
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// What to do with a file before transcription: optionally re-encode to a
/// target bitrate, then send it in one or more windows. `chunks` always
/// covers `[0, duration)`; an unchunked file is a single whole-span chunk.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlanDecision {
    pub compress_to_bps: Option<u32>,
    pub chunks: Vec<ChunkSpec>,
}

impl PlanDecision {
    pub fn is_noop(&self) -> bool {
        self.compress_to_bps.is_none() && self.chunks.len() == 1
    }

    pub fn is_chunked(&self) -> bool {
        self.chunks.len() > 1
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("duration must be positive, got {0}")]
    InvalidDuration(f64),
    #[error(
        "cannot fit chunks under the provider limit: window floor {floor_secs}s reached at {bitrate_bps}bps"
    )]
    WindowFloor { floor_secs: f64, bitrate_bps: u32 },
}

/// Bitrate that squeezes the file under the compression target, clamped to
/// the speech-intelligibility floor and to never exceed the source bitrate.
/// `None` when re-encoding cannot help (the source is already at or below
/// the floor).
pub fn compression_bitrate(
    duration_secs: f64,
    size_bytes: u64,
    cfg: &PipelineConfig,
) -> Option<u32> {
    let source_bps = bitrate_of(duration_secs, size_bytes);
    let ceiling = cfg.bitrate_ceiling_bps.min(source_bps);
    if ceiling <= cfg.bitrate_floor_bps {
        return None;
    }

    let ideal = (cfg.target_bytes as f64 * 8.0 / duration_secs) as u32;
    Some(ideal.clamp(cfg.bitrate_floor_bps, ceiling))
}

/// The full planning contract: compression decision plus chunk windows,
/// from the source file's duration and size alone.
pub fn plan(
    duration_secs: f64,
    size_bytes: u64,
    cfg: &PipelineConfig,
) -> Result<PlanDecision, PlanError> {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(PlanError::InvalidDuration(duration_secs));
    }

    let compress_to_bps = if size_bytes <= cfg.target_bytes {
        None
    } else {
        compression_bitrate(duration_secs, size_bytes, cfg)
    };

    let effective_bps = compress_to_bps.unwrap_or_else(|| bitrate_of(duration_secs, size_bytes));
    let estimated_bytes = estimated_size(duration_secs, effective_bps);

    let chunks = if estimated_bytes > cfg.provider_limit_bytes || duration_secs > cfg.max_call_secs
    {
        chunk_windows(duration_secs, effective_bps, cfg)?
    } else {
        whole_span(duration_secs)
    };

    Ok(PlanDecision {
        compress_to_bps,
        chunks,
    })
}

/// Chunk-only planning against a *measured* prepared file, used after
/// compression has already happened (re-compressing is never an option at
/// that point).
pub fn plan_chunks(
    duration_secs: f64,
    size_bytes: u64,
    cfg: &PipelineConfig,
) -> Result<Vec<ChunkSpec>, PlanError> {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(PlanError::InvalidDuration(duration_secs));
    }

    if size_bytes <= cfg.provider_limit_bytes && duration_secs <= cfg.max_call_secs {
        return Ok(whole_span(duration_secs));
    }

    chunk_windows(duration_secs, bitrate_of(duration_secs, size_bytes), cfg)
}

/// Bitrate chunk slices get re-encoded at, chosen so the planner's size
/// estimates hold for the encoded output.
pub fn slice_bitrate(duration_secs: f64, size_bytes: u64, cfg: &PipelineConfig) -> u32 {
    bitrate_of(duration_secs, size_bytes).clamp(cfg.bitrate_floor_bps, cfg.bitrate_ceiling_bps)
}

fn chunk_windows(
    duration_secs: f64,
    effective_bps: u32,
    cfg: &PipelineConfig,
) -> Result<Vec<ChunkSpec>, PlanError> {
    let slice_bps = effective_bps.clamp(cfg.bitrate_floor_bps, cfg.bitrate_ceiling_bps);

    let mut window = cfg.chunk_window_secs.min(cfg.max_call_secs);
    while estimated_size(window, slice_bps) > cfg.provider_limit_bytes {
        window /= 2.0;
        if window < cfg.min_chunk_window_secs {
            return Err(PlanError::WindowFloor {
                floor_secs: cfg.min_chunk_window_secs,
                bitrate_bps: slice_bps,
            });
        }
    }

    let count = (duration_secs / window).ceil() as usize;
    let chunks = (0..count)
        .map(|index| ChunkSpec {
            index,
            start_secs: index as f64 * window,
            end_secs: (index as f64 * window + window).min(duration_secs),
        })
        .collect();
    Ok(chunks)
}

fn whole_span(duration_secs: f64) -> Vec<ChunkSpec> {
    vec![ChunkSpec {
        index: 0,
        start_secs: 0.0,
        end_secs: duration_secs,
    }]
}

fn bitrate_of(duration_secs: f64, size_bytes: u64) -> u32 {
    (size_bytes as f64 * 8.0 / duration_secs) as u32
}

fn estimated_size(duration_secs: f64, bitrate_bps: u32) -> u64 {
    (bitrate_bps as f64 / 8.0 * duration_secs) as u64
}
