use std::io;
use std::path::{Path, PathBuf};

use crate::errors::{LauncherError, Result};
use crate::utils::file::write_atomic;
use crate::version::Version;

/// Plain-text `Version.txt` marker beside the installed content.
#[derive(Clone, Debug)]
pub struct VersionStore {
    path: PathBuf,
}

impl VersionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` is the ordinary first-run case. A marker that exists but does not
    /// parse is reported as `LauncherError::Parse`.
    pub fn load(&self) -> Result<Option<Version>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(LauncherError::Io(err)),
        };
        raw.parse::<Version>().map(Some)
    }

    pub fn save(&self, version: Version) -> Result<()> {
        write_atomic(&self.path, version.to_string().as_bytes())?;
        tracing::info!("version marker {} -> {}", self.path.display(), version);
        Ok(())
    }
}
