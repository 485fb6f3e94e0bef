use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use super::model::SubmissionKind;

pub const DEFAULT_MAX_LINE_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Judge host, including port if needed.
    pub host: String,
    pub ssl: bool,
    /// Prepended to every endpoint path, e.g. `/api`.
    pub api_prefix: String,
    pub submit_path: String,
    pub self_test_path: String,
    /// Session token to start with.
    pub access_token: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    /// Longest time to wait for a single chunk of the result stream.
    pub idle_timeout_secs: Option<u64>,
    pub max_line_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "localhost:8080".into(),
            ssl: false,
            api_prefix: String::new(),
            submit_path: "/commit/submit".into(),
            self_test_path: "/commit/self_test".into(),
            access_token: None,
            connect_timeout_secs: None,
            idle_timeout_secs: None,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl ClientConfig {
    /// Default location of the config file, `<config dir>/oj-submitter/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("oj-submitter").join("config.toml"))
    }

    pub fn from_toml(s: &str) -> anyhow::Result<ClientConfig> {
        toml::from_str(s).context("parsing client config")
    }

    pub async fn load(path: &Path) -> anyhow::Result<ClientConfig> {
        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&data).with_context(|| format!("in {}", path.display()))
    }

    /// Load `path` if given; otherwise load the default file, or fall back to
    /// defaults if it doesn't exist.
    pub async fn load_or_default(path: Option<&Path>) -> anyhow::Result<ClientConfig> {
        if let Some(path) = path {
            return Self::load(path).await;
        }
        match Self::default_path() {
            Some(p) if tokio::fs::metadata(&p).await.is_ok() => {
                tracing::debug!("Using config file {}", p.display());
                Self::load(&p).await
            }
            _ => Ok(ClientConfig::default()),
        }
    }

    fn base(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}{}", scheme, self.host, self.api_prefix)
    }

    pub fn submit_endpoint(&self) -> String {
        format!("{}{}", self.base(), self.submit_path)
    }

    pub fn self_test_endpoint(&self) -> String {
        format!("{}{}", self.base(), self.self_test_path)
    }

    pub fn endpoint_for(&self, kind: &SubmissionKind) -> String {
        match kind {
            SubmissionKind::Submit => self.submit_endpoint(),
            SubmissionKind::SelfTest(_) => self.self_test_endpoint(),
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}
