/// Gateway-side settings: which folder is watched, which secret signs
/// inbound notifications, and which extensions are worth dispatching.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub raw_folder: String,
    pub app_secret: String,
    pub supported_extensions: Vec<String>,
}

impl IngestConfig {
    pub fn new(raw_folder: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            raw_folder: raw_folder.into(),
            app_secret: app_secret.into(),
            supported_extensions: ink_media::SUPPORTED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }

    pub fn accepts(&self, file_name: &str) -> bool {
        ink_media::extension_of(file_name)
            .map(|ext| self.supported_extensions.iter().any(|s| s == &ext))
            .unwrap_or(false)
    }
}
