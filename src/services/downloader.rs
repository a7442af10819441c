use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};

use crate::config::LauncherConfig;
use crate::errors::{LauncherError, Result};
use crate::services::api_client::build_http_client;

const PARTIAL_SUFFIX: &str = "part";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadControl {
    Running,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadEvent {
    Progress {
        percent: u8,
        downloaded_bytes: u64,
        total_bytes: u64,
    },
    Completed {
        partial_path: PathBuf,
        downloaded_bytes: u64,
    },
    Failed {
        reason: String,
    },
}

pub type DownloadEvents = mpsc::UnboundedSender<DownloadEvent>;

/// Byte accounting for one transfer. Percent never decreases.
#[derive(Clone, Debug)]
pub struct DownloadTask {
    pub url: String,
    pub destination: PathBuf,
    pub total_bytes: Option<u64>,
    pub downloaded_bytes: u64,
    last_percent: Option<u8>,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, destination: PathBuf, total_bytes: Option<u64>) -> Self {
        Self {
            url: url.into(),
            destination,
            total_bytes: total_bytes.filter(|total| *total > 0),
            downloaded_bytes: 0,
            last_percent: None,
        }
    }

    pub fn percent(&self) -> Option<u8> {
        let total = self.total_bytes?;
        let percent = (self.downloaded_bytes.saturating_mul(100) / total).min(100);
        Some(percent as u8)
    }

    /// Adds received bytes; yields the percent only when it moved forward.
    pub fn record(&mut self, bytes: u64) -> Option<u8> {
        self.downloaded_bytes = self.downloaded_bytes.saturating_add(bytes);
        let percent = self.percent()?;
        if self.last_percent.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last_percent = Some(percent);
        Some(percent)
    }
}

pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

/// Deletes the partial file on drop unless the transfer completed.
struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.keep {
            if let Err(err) = std::fs::remove_file(&self.path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        "failed to remove partial download {}: {}",
                        self.path.display(),
                        err
                    );
                }
            }
        }
    }
}

struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    active: Arc<AtomicBool>,
}

impl Downloader {
    pub fn new(config: &LauncherConfig) -> Self {
        Self {
            client: build_http_client(config.download_timeout(), config.connect_timeout()),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    fn acquire(&self) -> Result<ActiveGuard> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| LauncherError::Transition("a download is already running".to_string()))?;
        Ok(ActiveGuard(self.active.clone()))
    }

    /// Streams `url` into `<destination>.part` and returns that path. The caller
    /// (the installer) is the only one that turns it into `destination`.
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
        events: &DownloadEvents,
        control: watch::Receiver<DownloadControl>,
    ) -> Result<PathBuf> {
        let _active = self.acquire()?;
        let result = self.fetch(url, destination, events, control).await;
        match &result {
            Ok(path) => tracing::info!("downloaded {} -> {}", url, path.display()),
            Err(err) => {
                tracing::error!("download of {} failed: {}", url, err);
                let _ = events.send(DownloadEvent::Failed {
                    reason: err.to_string(),
                });
            }
        }
        result
    }

    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        events: &DownloadEvents,
        control: watch::Receiver<DownloadControl>,
    ) -> Result<PathBuf> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LauncherError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let mut task = DownloadTask::new(url, destination.to_path_buf(), response.content_length());
        tracing::info!(
            "downloading {} ({} bytes)",
            url,
            task.total_bytes
                .map(|total| total.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        write_stream(&mut task, response.bytes_stream(), events, control).await
    }
}

/// Drains `stream` into the task's partial file, reporting progress and honouring
/// cancellation. The partial file is removed on every failure path.
pub async fn write_stream<S, B, E>(
    task: &mut DownloadTask,
    mut stream: S,
    events: &DownloadEvents,
    mut control: watch::Receiver<DownloadControl>,
) -> Result<PathBuf>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<LauncherError>,
{
    let partial = PartialFile::new(partial_path(&task.destination));
    if let Some(parent) = partial.path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(&partial.path).await?;
    let mut control_open = true;

    if *control.borrow() == DownloadControl::Cancelled {
        return Err(LauncherError::Cancelled);
    }

    loop {
        tokio::select! {
            changed = control.changed(), if control_open => {
                if changed.is_err() {
                    control_open = false;
                } else if *control.borrow() == DownloadControl::Cancelled {
                    tracing::info!("download of {} cancelled", task.url);
                    return Err(LauncherError::Cancelled);
                }
            }
            next = stream.next() => {
                let Some(next) = next else { break; };
                let chunk = next.map_err(Into::into)?;
                let bytes = chunk.as_ref();
                file.write_all(bytes).await?;
                if let Some(percent) = task.record(bytes.len() as u64) {
                    tracing::debug!("download {} at {}%", task.url, percent);
                    let _ = events.send(DownloadEvent::Progress {
                        percent,
                        downloaded_bytes: task.downloaded_bytes,
                        total_bytes: task.total_bytes.unwrap_or_default(),
                    });
                }
            }
        }
    }

    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let Some(total) = task.total_bytes {
        if task.downloaded_bytes != total {
            return Err(LauncherError::Install(format!(
                "archive truncated: received {} of {} bytes",
                task.downloaded_bytes, total
            )));
        }
    }

    let path = partial.keep();
    let _ = events.send(DownloadEvent::Completed {
        partial_path: path.clone(),
        downloaded_bytes: task.downloaded_bytes,
    });
    Ok(path)
}
