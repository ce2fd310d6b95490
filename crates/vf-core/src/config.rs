//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries all
//! sub-configs for the server, tools, queue, relay, and backend selection.
//! Every section defaults sensibly so a completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub queue: QueueConfig,
    pub relay: RelayConfig,
    pub backend: BackendConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Serialize back to TOML (used by `validate` to print the effective config).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Internal(format!("config serialize error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.queue.copy_timeout_secs == 0 {
            warnings.push("queue.copy_timeout_secs is 0; every copy will time out".into());
        }

        if self.queue.max_copies == 0 {
            warnings.push("queue.max_copies is 0; every enqueue will be rejected".into());
        }

        if self.relay.max_upload_mb == 0 {
            warnings.push("relay.max_upload_mb is 0; every upload will be rejected".into());
        }

        if self.backend.video == VideoBackendKind::Remote {
            match self.backend.remote_url.as_deref() {
                None | Some("") => warnings.push(
                    "backend.video is 'remote' but backend.remote_url is not set".into(),
                ),
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    warnings.push(format!("backend.remote_url '{url}' is not an http(s) URL"));
                }
                Some(_) => {}
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
        }
    }
}

/// External tool path overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Job queue and scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Upper bound for one backend call.
    pub copy_timeout_secs: u64,
    /// Largest `copies` value accepted at enqueue time.
    pub max_copies: u32,
    /// Where finished jobs are persisted; `None` disables persistence.
    pub state_path: Option<PathBuf>,
    /// Let the server's background processor drain the queue.
    pub auto_process: bool,
    pub poll_interval_ms: u64,
    /// Directory receiving queue artifacts.
    pub output_dir: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            copy_timeout_secs: 600,
            max_copies: 50,
            state_path: None,
            auto_process: true,
            poll_interval_ms: 1000,
            output_dir: PathBuf::from("./output"),
        }
    }
}

impl QueueConfig {
    pub fn copy_timeout(&self) -> Duration {
        Duration::from_secs(self.copy_timeout_secs)
    }
}

/// HTTP relay (`/process-video`) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Upload ceiling in mebibytes.
    pub max_upload_mb: u64,
    /// Directory processed videos are written to and downloaded from.
    pub output_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_upload_mb: 500,
            output_dir: PathBuf::from("./processed"),
            timeout_secs: 600,
        }
    }
}

impl RelayConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which backend runs video copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoBackendKind {
    /// In-process ffmpeg.
    #[default]
    Local,
    /// A remote relay reached over HTTP.
    Remote,
}

impl std::str::FromStr for VideoBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(Error::Validation(format!(
                "unknown backend '{other}' (expected local or remote)"
            ))),
        }
    }
}

/// Backend selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub video: VideoBackendKind,
    /// Base URL of the remote relay, e.g. `http://transcoder:3001`.
    pub remote_url: Option<String>,
}
