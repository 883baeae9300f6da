use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::Error;

/// Encoder settings shared by every transcode in the pipeline. Speech
/// survives aggressive compression, so everything is re-encoded to mono
/// 22.05 kHz mp3 at a caller-chosen bitrate.
#[derive(Debug, Clone, Copy)]
pub struct SpeechProfile {
    pub bitrate_bps: u32,
}

impl SpeechProfile {
    const CODEC: &'static str = "libmp3lame";
    const CHANNELS: &'static str = "1";
    const SAMPLE_RATE: &'static str = "22050";
}

/// Duration of a media file in seconds, via ffprobe.
pub async fn probe_duration(input: &Path) -> Result<f64, Error> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        // ffprobe failing to read the container at all is how corrupt
        // uploads surface.
        return Err(Error::CorruptMedia(stderr_excerpt(&output.stderr)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let duration: f64 = stdout
        .trim()
        .parse()
        .map_err(|_| Error::UnparsableOutput {
            tool: "ffprobe",
            detail: format!("duration line {:?}", stdout.trim()),
        })?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(Error::CorruptMedia(format!(
            "non-positive duration {duration}"
        )));
    }

    Ok(duration)
}

/// Re-encode `input` to audio-only mp3 at the profile bitrate. Strips any
/// video stream; the transcription provider only wants audio.
pub async fn transcode(input: &Path, output: &Path, profile: SpeechProfile) -> Result<(), Error> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-i"]).arg(input);
    encode_args(&mut cmd, profile);
    cmd.arg(output);

    run_ffmpeg(cmd, output).await
}

/// Extract `[start, start + duration)` from `input` into `output`, encoded
/// with the same speech profile.
pub async fn extract_slice(
    input: &Path,
    output: &Path,
    start_secs: f64,
    duration_secs: f64,
    profile: SpeechProfile,
) -> Result<(), Error> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
        .arg("-ss")
        .arg(format_secs(start_secs))
        .arg("-t")
        .arg(format_secs(duration_secs))
        .arg("-i")
        .arg(input);
    encode_args(&mut cmd, profile);
    cmd.arg(output);

    run_ffmpeg(cmd, output).await
}

fn encode_args(cmd: &mut Command, profile: SpeechProfile) {
    cmd.args(["-vn", "-acodec", SpeechProfile::CODEC])
        .arg("-b:a")
        .arg(profile.bitrate_bps.to_string())
        .args(["-ac", SpeechProfile::CHANNELS])
        .args(["-ar", SpeechProfile::SAMPLE_RATE]);
}

async fn run_ffmpeg(mut cmd: Command, output_path: &Path) -> Result<(), Error> {
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        // Never leave a truncated artifact behind for a later stage to pick up.
        let _ = tokio::fs::remove_file(output_path).await;
        return Err(Error::ToolFailed {
            tool: "ffmpeg",
            status: output.status.to_string(),
            stderr: stderr_excerpt(&output.stderr),
        });
    }

    tracing::debug!(output = %output_path.display(), "ffmpeg_encode_done");
    Ok(())
}

fn format_secs(secs: f64) -> String {
    format!("{secs:.3}")
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    match trimmed.char_indices().nth(500) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
