use std::path::PathBuf;
use std::sync::OnceLock;

use serde::Deserialize;

fn default_port() -> u16 {
    8080
}

fn default_raw_folder() -> String {
    "/transcripts/raw".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_worker_bin() -> PathBuf {
    PathBuf::from("inkdrop-worker")
}

fn default_claim_ttl_secs() -> u64 {
    24 * 60 * 60
}

#[derive(Deserialize)]
pub struct Env {
    #[serde(default = "default_port")]
    pub port: u16,

    pub dropbox_access_token: String,
    pub dropbox_app_secret: String,

    #[serde(default = "default_raw_folder")]
    pub raw_folder: String,
    /// Durable cursor/ledger documents live here; shared with workers.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_worker_bin")]
    pub worker_bin: PathBuf,
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: u64,
}

static ENV: OnceLock<Env> = OnceLock::new();

pub fn env() -> &'static Env {
    ENV.get_or_init(|| {
        let _ = dotenvy::dotenv();
        envy::from_env().expect("failed to load environment")
    })
}
