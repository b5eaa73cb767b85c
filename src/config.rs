use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_API_BASE_URL: &str = "CHW_API_BASE_URL";
const ENV_SESSION_FILE: &str = "CHW_SESSION_FILE";
const ENV_TIMEOUT_SECS: &str = "CHW_HTTP_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub session_file: PathBuf,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_file: default_session_file(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn default_session_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("chw-portal")
        .join("session.json")
}

impl ClientConfig {
    /// Read a JSON config file; absent keys keep their defaults.
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let cfg: ClientConfig = serde_json::from_str(&raw).context("parsing JSON")?;
        Ok(cfg.normalized())
    }

    /// Defaults, then the optional file, then `CHW_*` environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var(ENV_API_BASE_URL) {
            debug!(api_base_url = %url, "api base url overridden from env");
            self.api_base_url = url;
        }
        if let Ok(file) = std::env::var(ENV_SESSION_FILE) {
            self.session_file = PathBuf::from(file);
        }
        if let Ok(secs) = std::env::var(ENV_TIMEOUT_SECS) {
            self.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_TIMEOUT_SECS))?;
        }
        Ok(self.normalized())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    fn normalized(mut self) -> Self {
        let trimmed = self.api_base_url.trim().trim_end_matches('/').to_string();
        self.api_base_url = trimmed;
        self
    }
}
