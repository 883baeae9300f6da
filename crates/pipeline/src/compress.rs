use std::path::Path;

use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::traits::MediaProcessor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressOutcome {
    /// Output fits under the provider limit.
    Fits { size_bytes: u64 },
    /// Output is still over the limit after the bounded re-encode; the
    /// caller escalates to chunking instead of compressing again.
    StillOver { size_bytes: u64 },
}

/// Re-encode `input` into `output` at `bitrate_bps`. If the result still
/// exceeds the provider limit and the bitrate has room to drop, re-encode
/// exactly once more at the floor. Never loops beyond that: a file that
/// cannot be squeezed under the limit gets chunked, not compressed harder.
pub async fn compress<M: MediaProcessor>(
    media: &M,
    input: &Path,
    output: &Path,
    bitrate_bps: u32,
    cfg: &PipelineConfig,
) -> Result<CompressOutcome, StageError> {
    let size = media.transcode(input, output, bitrate_bps).await?;
    tracing::info!(
        bitrate_bps,
        size_bytes = size,
        limit_bytes = cfg.provider_limit_bytes,
        "compression_pass_done"
    );

    if size <= cfg.provider_limit_bytes {
        return Ok(CompressOutcome::Fits { size_bytes: size });
    }

    if bitrate_bps > cfg.bitrate_floor_bps {
        let size = media
            .transcode(input, output, cfg.bitrate_floor_bps)
            .await?;
        tracing::info!(
            bitrate_bps = cfg.bitrate_floor_bps,
            size_bytes = size,
            "compression_floor_pass_done"
        );
        if size <= cfg.provider_limit_bytes {
            return Ok(CompressOutcome::Fits { size_bytes: size });
        }
        return Ok(CompressOutcome::StillOver { size_bytes: size });
    }

    Ok(CompressOutcome::StillOver { size_bytes: size })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// MediaProcessor whose transcode "output size" is scripted per call.
    struct ScriptedMedia {
        sizes: Mutex<Vec<u64>>,
        calls: Mutex<Vec<u32>>,
    }

    impl ScriptedMedia {
        fn new(sizes: Vec<u64>) -> Self {
            Self {
                sizes: Mutex::new(sizes),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn bitrates_used(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl MediaProcessor for ScriptedMedia {
        async fn probe_duration(&self, _input: &Path) -> Result<f64, StageError> {
            Ok(600.0)
        }

        async fn transcode(
            &self,
            _input: &Path,
            _output: &Path,
            bitrate_bps: u32,
        ) -> Result<u64, StageError> {
            self.calls.lock().unwrap().push(bitrate_bps);
            Ok(self.sizes.lock().unwrap().remove(0))
        }

        async fn extract_slice(
            &self,
            _input: &Path,
            _output: &Path,
            _start_secs: f64,
            _duration_secs: f64,
            _bitrate_bps: u32,
        ) -> Result<(), StageError> {
            Ok(())
        }
    }

    fn paths() -> (PathBuf, PathBuf) {
        (PathBuf::from("/in/a.mp4"), PathBuf::from("/out/a.mp3"))
    }

    #[tokio::test]
    async fn single_pass_when_it_fits() {
        let cfg = PipelineConfig::default();
        let media = ScriptedMedia::new(vec![20 * 1024 * 1024]);
        let (input, output) = paths();

        let outcome = compress(&media, &input, &output, 48_000, &cfg)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CompressOutcome::Fits {
                size_bytes: 20 * 1024 * 1024
            }
        );
        assert_eq!(media.bitrates_used(), vec![48_000]);
    }

    #[tokio::test]
    async fn one_floor_retry_then_fits() {
        let cfg = PipelineConfig::default();
        let media = ScriptedMedia::new(vec![30 * 1024 * 1024, 22 * 1024 * 1024]);
        let (input, output) = paths();

        let outcome = compress(&media, &input, &output, 48_000, &cfg)
            .await
            .unwrap();
        assert!(matches!(outcome, CompressOutcome::Fits { .. }));
        assert_eq!(media.bitrates_used(), vec![48_000, cfg.bitrate_floor_bps]);
    }

    #[tokio::test]
    async fn still_over_after_floor_escalates_not_loops() {
        let cfg = PipelineConfig::default();
        let media = ScriptedMedia::new(vec![40 * 1024 * 1024, 28 * 1024 * 1024]);
        let (input, output) = paths();

        let outcome = compress(&media, &input, &output, 48_000, &cfg)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CompressOutcome::StillOver {
                size_bytes: 28 * 1024 * 1024
            }
        );
        // Exactly two encode passes, never a third.
        assert_eq!(media.bitrates_used().len(), 2);
    }

    #[tokio::test]
    async fn already_at_floor_does_not_retry() {
        let cfg = PipelineConfig::default();
        let media = ScriptedMedia::new(vec![30 * 1024 * 1024]);
        let (input, output) = paths();

        let outcome = compress(&media, &input, &output, cfg.bitrate_floor_bps, &cfg)
            .await
            .unwrap();
        assert!(matches!(outcome, CompressOutcome::StillOver { .. }));
        assert_eq!(media.bitrates_used().len(), 1);
    }
}
