use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;

use crate::config::LauncherConfig;
use crate::errors::{LauncherError, Result};
use crate::services::api_client::build_http_client;
use crate::services::downloader::{DownloadControl, DownloadEvents, Downloader};
use crate::version::Version;

/// Where published content comes from: a version marker and one archive.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn remote_version(&self) -> Result<Version>;

    /// Fetches the archive into `<destination>.part` and returns that path.
    async fn fetch_archive(
        &self,
        destination: &Path,
        events: &DownloadEvents,
        control: watch::Receiver<DownloadControl>,
    ) -> Result<PathBuf>;
}

/// Plain HTTP update host serving `Version.txt` and the content archive.
#[derive(Clone)]
pub struct HttpContentSource {
    client: reqwest::Client,
    version_url: String,
    archive_url: String,
    downloader: Downloader,
}

impl HttpContentSource {
    pub fn new(config: &LauncherConfig, downloader: Downloader) -> Self {
        Self {
            client: build_http_client(config.request_timeout(), config.connect_timeout()),
            version_url: config.version_url(),
            archive_url: config.archive_url(),
            downloader,
        }
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn remote_version(&self) -> Result<Version> {
        let response = self.client.get(&self.version_url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LauncherError::Http {
                status: status.as_u16(),
                body,
            });
        }
        body.parse::<Version>()
    }

    async fn fetch_archive(
        &self,
        destination: &Path,
        events: &DownloadEvents,
        control: watch::Receiver<DownloadControl>,
    ) -> Result<PathBuf> {
        self.downloader
            .download(&self.archive_url, destination, events, control)
            .await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "version", rename_all = "snake_case")]
pub enum UpdateDecision {
    NoUpdate,
    /// Nothing installed; fetch and install `remote`.
    FullInstall(Version),
    /// Installed version differs from `remote` in any direction.
    IncrementalUpdate(Version),
}

impl UpdateDecision {
    pub fn target(&self) -> Option<Version> {
        match self {
            UpdateDecision::NoUpdate => None,
            UpdateDecision::FullInstall(version) | UpdateDecision::IncrementalUpdate(version) => {
                Some(*version)
            }
        }
    }
}

/// A zero marker is treated like a missing one. Downgrades are installed too.
pub fn decide(local: Option<Version>, remote: Version) -> UpdateDecision {
    match local {
        None => UpdateDecision::FullInstall(remote),
        Some(local) if local.is_zero() => UpdateDecision::FullInstall(remote),
        Some(local) if local.is_different(&remote) => UpdateDecision::IncrementalUpdate(remote),
        Some(_) => UpdateDecision::NoUpdate,
    }
}

#[derive(Clone)]
pub struct UpdateChecker {
    source: Arc<dyn ContentSource>,
}

impl UpdateChecker {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self { source }
    }

    pub async fn check(&self, local: Option<Version>) -> Result<UpdateDecision> {
        let remote = self.source.remote_version().await?;
        let decision = decide(local, remote);
        tracing::info!(
            "update check: local {}, remote {} -> {:?}",
            local
                .map(|version| version.to_string())
                .unwrap_or_else(|| "none".to_string()),
            remote,
            decision
        );
        Ok(decision)
    }
}
