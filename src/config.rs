use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Directory receiving one `.eml` file per (recipient, delivery)
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,
    /// Text sent after `220` when a client connects
    #[serde(default = "default_banner")]
    pub banner: String,
    /// Per-line read deadline. No deadline when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_secs: Option<u64>,
}

fn default_smtp_port() -> u16 {
    2525
}

fn default_spool_dir() -> PathBuf {
    PathBuf::from("mail_spool")
}

fn default_banner() -> String {
    "SMTP Server Ready".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            smtp_port: default_smtp_port(),
            spool_dir: default_spool_dir(),
            banner: default_banner(),
            read_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load() -> anyhow::Result<Self> {
        let config_paths = [
            "config.json",
            "smtp-spool.json",
            "/etc/smtp-spool/config.json",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                tracing::info!("Loading configuration from: {}", path);
                return Self::from_file(path);
            }
        }

        tracing::warn!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }
}
