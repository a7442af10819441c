use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::errors::{LauncherError, Result};
use crate::services::VersionStore;
use crate::utils::file::{is_safe_relative_path, remove_path, scratch_sibling};
use crate::version::Version;

/// Extracts a downloaded archive into the install root and records its version.
///
/// Extraction goes to a hidden staging directory first; the top-level entries are
/// then renamed over the live ones, with the previous entries parked in a backup
/// directory until the swap succeeds. A failure at any point leaves the previous
/// install and version marker in place. An archive that does not contain the
/// companion executable at `entry_point` is rejected before the swap.
#[derive(Clone, Debug)]
pub struct Installer {
    install_root: PathBuf,
    archive_path: PathBuf,
    entry_point: PathBuf,
    versions: VersionStore,
}

impl Installer {
    /// `entry_point` is relative to the install root, e.g. `Ceremeet/ceremeet`.
    pub fn new(
        install_root: PathBuf,
        archive_path: PathBuf,
        entry_point: PathBuf,
        versions: VersionStore,
    ) -> Self {
        Self {
            install_root,
            archive_path,
            entry_point,
            versions,
        }
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub async fn apply(&self, partial_path: &Path, version: Version) -> Result<()> {
        let installer = self.clone();
        let partial_path = partial_path.to_path_buf();
        tokio::task::spawn_blocking(move || installer.apply_blocking(&partial_path, version))
            .await
            .map_err(|err| LauncherError::Install(format!("install task aborted: {err}")))?
    }

    pub fn apply_blocking(&self, partial_path: &Path, version: Version) -> Result<()> {
        fs::create_dir_all(&self.install_root)?;
        self.materialize(partial_path)?;

        let staging = scratch_sibling(&self.install_root, "staging");
        let outcome = extract_zip_archive(&self.archive_path, &staging)
            .and_then(|_| self.verify_staged(&staging))
            .and_then(|_| swap_into(&staging, &self.install_root));
        if let Err(err) = remove_path(&staging) {
            tracing::warn!("failed to clean staging {}: {}", staging.display(), err);
        }
        if let Err(err) = outcome {
            let _ = remove_path(&self.archive_path);
            return Err(err);
        }

        if let Err(err) = fs::remove_file(&self.archive_path) {
            tracing::warn!(
                "installed but could not delete {}: {}",
                self.archive_path.display(),
                err
            );
        }
        self.versions
            .save(version)
            .map_err(|err| LauncherError::Install(format!("version marker not written: {err}")))?;
        tracing::info!(
            "installed version {} into {}",
            version,
            self.install_root.display()
        );
        Ok(())
    }

    fn verify_staged(&self, staging: &Path) -> Result<()> {
        if staging.join(&self.entry_point).is_file() {
            return Ok(());
        }
        Err(LauncherError::Install(format!(
            "archive does not contain {}",
            self.entry_point.display()
        )))
    }

    fn materialize(&self, partial_path: &Path) -> Result<()> {
        if !partial_path.exists() {
            return Err(LauncherError::Install(format!(
                "downloaded archive {} is missing",
                partial_path.display()
            )));
        }
        remove_path(&self.archive_path)?;
        fs::rename(partial_path, &self.archive_path).map_err(|err| {
            let _ = fs::remove_file(partial_path);
            LauncherError::Install(format!(
                "could not move {} into place: {err}",
                partial_path.display()
            ))
        })
    }
}

fn extract_zip_archive(archive_path: &Path, target: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|err| LauncherError::Install(format!("corrupt archive: {err}")))?;
    fs::create_dir_all(target)?;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| LauncherError::Install(format!("corrupt archive entry: {err}")))?;
        let name = entry.name().replace('\\', "/");
        if name.is_empty() {
            continue;
        }
        let entry_path = Path::new(&name);
        if !is_safe_relative_path(entry_path) {
            tracing::warn!("skipping archive entry outside install root: {}", name);
            continue;
        }
        let out_path = target.join(entry_path);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&out_path)?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| LauncherError::Install(format!("failed to extract {name}: {err}")))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

/// Renames every top-level entry of `staging` over `root`, rolling back on failure.
fn swap_into(staging: &Path, root: &Path) -> Result<()> {
    let backup = scratch_sibling(root, "backup");
    fs::create_dir_all(&backup)?;
    let mut swapped: Vec<(PathBuf, Option<PathBuf>)> = Vec::new();

    let result = (|| -> Result<()> {
        for entry in fs::read_dir(staging)? {
            let entry = entry?;
            let name = entry.file_name();
            let target = root.join(&name);
            let parked = if fs::symlink_metadata(&target).is_ok() {
                let parked = backup.join(&name);
                fs::rename(&target, &parked)?;
                Some(parked)
            } else {
                None
            };
            swapped.push((target.clone(), parked));
            fs::rename(entry.path(), &target)?;
        }
        Ok(())
    })();

    if let Err(err) = result {
        tracing::error!("swap into {} failed, rolling back: {}", root.display(), err);
        for (target, parked) in swapped.into_iter().rev() {
            if let Some(parked) = parked {
                let _ = remove_path(&target);
                if let Err(restore_err) = fs::rename(&parked, &target) {
                    tracing::error!(
                        "could not restore {}: {}",
                        target.display(),
                        restore_err
                    );
                }
            } else {
                let _ = remove_path(&target);
            }
        }
        let _ = remove_path(&backup);
        return Err(LauncherError::Install(format!("install swap failed: {err}")));
    }

    if let Err(err) = remove_path(&backup) {
        tracing::warn!("failed to clean backup {}: {}", backup.display(), err);
    }
    Ok(())
}
