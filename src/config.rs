use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{LauncherError, Result};

pub const CONFIG_FILE: &str = "launcher.config.json";
const SCHEME_PREFIX_LEN: usize = 23;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub update_host: String,
    pub version_file_name: String,
    pub archive_name: String,
    pub api_base_url: String,
    pub scheme_prefix: String,
    pub web_link_prefix: String,
    pub min_link_len: usize,
    pub meeting_id_len: usize,
    pub content_dir_name: String,
    pub executable_name: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub ping_interval_secs: u64,
    pub launch_cooldown_secs: u64,
    pub handoff_ttl_secs: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            update_host: "https://pdate.ceremeet.com".to_string(),
            version_file_name: "Version.txt".to_string(),
            archive_name: "Ceremeet.zip".to_string(),
            api_base_url: "https://api.ceremeet.com".to_string(),
            scheme_prefix: "ceremeet://ceremeet.io/".to_string(),
            web_link_prefix: "https://ceremeet.io/join/".to_string(),
            min_link_len: 60,
            meeting_id_len: 36,
            content_dir_name: "Ceremeet".to_string(),
            executable_name: if cfg!(target_os = "windows") {
                "ceremeet.exe".to_string()
            } else {
                "ceremeet".to_string()
            },
            request_timeout_secs: 20,
            connect_timeout_secs: 6,
            download_timeout_secs: 600,
            ping_interval_secs: 5,
            launch_cooldown_secs: 10,
            handoff_ttl_secs: 30,
        }
    }
}

impl LauncherConfig {
    /// Defaults, then `launcher.config.json` in `root` if present, then env overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str::<LauncherConfig>(&raw).map_err(|err| {
                LauncherError::Config(format!("invalid {}: {err}", path.display()))
            })?
        } else {
            LauncherConfig::default()
        };

        if let Some(value) = env_non_empty("CEREMEET_UPDATE_HOST") {
            config.update_host = value;
        }
        if let Some(value) = env_non_empty("CEREMEET_API_URL") {
            config.api_base_url = value;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheme_prefix.chars().count() != SCHEME_PREFIX_LEN {
            return Err(LauncherError::Config(format!(
                "scheme_prefix must be {SCHEME_PREFIX_LEN} characters, got '{}'",
                self.scheme_prefix
            )));
        }
        if self.min_link_len < self.scheme_prefix.len() + self.meeting_id_len {
            return Err(LauncherError::Config(format!(
                "min_link_len {} cannot hold prefix and a {}-character meeting id",
                self.min_link_len, self.meeting_id_len
            )));
        }
        if self.update_host.trim().is_empty() || self.api_base_url.trim().is_empty() {
            return Err(LauncherError::Config("remote hosts must be set".to_string()));
        }
        if self.ping_interval_secs == 0 {
            return Err(LauncherError::Config(
                "ping_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn version_url(&self) -> String {
        join_url(&self.update_host, &self.version_file_name)
    }

    pub fn archive_url(&self) -> String {
        join_url(&self.update_host, &self.archive_name)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn launch_cooldown(&self) -> Duration {
        Duration::from_secs(self.launch_cooldown_secs)
    }

    pub fn handoff_ttl(&self) -> Duration {
        Duration::from_secs(self.handoff_ttl_secs)
    }

    pub fn content_dir(&self, install_root: &Path) -> PathBuf {
        install_root.join(&self.content_dir_name)
    }

    pub fn executable_path(&self, install_root: &Path) -> PathBuf {
        self.content_dir(install_root).join(&self.executable_name)
    }

    pub fn version_file(&self, install_root: &Path) -> PathBuf {
        install_root.join(&self.version_file_name)
    }

    pub fn archive_path(&self, install_root: &Path) -> PathBuf {
        install_root.join(&self.archive_name)
    }
}

pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub(crate) fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
