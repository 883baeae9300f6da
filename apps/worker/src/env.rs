use std::path::PathBuf;
use std::sync::OnceLock;

use ink_pipeline::PipelineConfig;
use serde::Deserialize;

fn default_processed_folder() -> String {
    "/transcripts/processed".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("inkdrop-work")
}

fn filter_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Deserialize)]
pub struct Env {
    /// Set by the gateway's process runner; manual runs may omit it and get
    /// a fresh id.
    #[serde(default, deserialize_with = "filter_empty")]
    pub job_id: Option<String>,
    pub target_file_path: String,
    pub target_file_name: String,
    #[serde(default)]
    pub target_file_size: u64,
    #[serde(default, deserialize_with = "filter_empty")]
    pub target_file_id: Option<String>,

    pub dropbox_access_token: String,
    pub openai_api_key: String,
    #[serde(default, deserialize_with = "filter_empty")]
    pub openai_model: Option<String>,
    #[serde(default, deserialize_with = "filter_empty")]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "filter_empty")]
    pub slack_webhook_url: Option<String>,

    #[serde(default = "default_processed_folder")]
    pub processed_folder: String,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Loaded from the environment in a second envy pass; flattening trips
    /// over envy's string-typed values for numeric fields.
    #[serde(skip)]
    pub pipeline: PipelineConfig,
}

static ENV: OnceLock<Env> = OnceLock::new();

pub fn env() -> &'static Env {
    ENV.get_or_init(|| {
        let _ = dotenvy::dotenv();
        let pipeline: PipelineConfig =
            envy::from_env().expect("failed to load pipeline configuration");
        let mut env: Env = envy::from_env().expect("failed to load environment");
        env.pipeline = pipeline;
        env
    })
}
