use std::path::Path;

/// Audio/video extensions the pipeline accepts from the watched folder.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "mp4", "mpeg", "mpga", "m4a", "wav", "webm", "aac", "oga", "ogg", "flac", "mov", "avi",
    "mkv", "wmv", "flv", "3gp",
];

const AUDIO_ONLY_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "flac", "ogg", "oga", "mpga"];

pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn is_supported_media(name: &str) -> bool {
    extension_of(name)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn is_audio_only(name: &str) -> bool {
    extension_of(name)
        .map(|ext| AUDIO_ONLY_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
