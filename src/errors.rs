use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Install error: {0}")]
    Install(String),
    #[error("Invalid meeting link: {0}")]
    InvalidLink(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Transition rejected: {0}")]
    Transition(String),
    #[error("Operation cancelled")]
    Cancelled,
}

/// Failure families surfaced to the status machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Network,
    Auth,
    Install,
    InvalidLink,
    Internal,
}

impl LauncherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LauncherError::Parse(_) | LauncherError::Serde(_) => ErrorKind::Parse,
            LauncherError::Network(_) | LauncherError::Http { .. } => ErrorKind::Network,
            LauncherError::Auth(_) => ErrorKind::Auth,
            LauncherError::Install(_) | LauncherError::Archive(_) | LauncherError::Io(_) => {
                ErrorKind::Install
            }
            LauncherError::InvalidLink(_) => ErrorKind::InvalidLink,
            LauncherError::NotFound(_)
            | LauncherError::Config(_)
            | LauncherError::Transition(_)
            | LauncherError::Cancelled => ErrorKind::Internal,
        }
    }

    /// Whether the user may retry from `Failed`. Nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Internal) || matches!(self, LauncherError::Cancelled)
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            LauncherError::Http { status, .. } => Some(*status),
            LauncherError::Network(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LauncherError>;
