mod error;
mod ffmpeg;
mod formats;

pub use error::Error;
pub use ffmpeg::{SpeechProfile, extract_slice, probe_duration, transcode};
pub use formats::{SUPPORTED_EXTENSIONS, extension_of, is_audio_only, is_supported_media};
