use std::path::{Path, PathBuf};

const INSTALL_DIR_NAME: &str = "ceremeet";

fn ensure_dir(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        return None;
    }
    if std::fs::create_dir_all(path).is_ok() {
        return Some(path.to_path_buf());
    }
    None
}

/// Per-user install root holding `Version.txt`, the content directory and logs.
pub fn resolve_root_dir() -> PathBuf {
    if let Ok(value) = std::env::var("CEREMEET_ROOT_DIR") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            let path = PathBuf::from(trimmed);
            if let Some(dir) = ensure_dir(&path) {
                return dir;
            }
        }
    }

    if let Some(app_data) = dirs::data_dir() {
        if let Some(found) = ensure_dir(&app_data.join(INSTALL_DIR_NAME)) {
            return found;
        }
    }

    if let Some(app_local) = dirs::data_local_dir() {
        if let Some(found) = ensure_dir(&app_local.join(INSTALL_DIR_NAME)) {
            return found;
        }
    }

    PathBuf::from(INSTALL_DIR_NAME)
}

pub fn resolve_log_dir(root: &Path) -> PathBuf {
    if let Ok(value) = std::env::var("CEREMEET_LOG_DIR") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            let path = PathBuf::from(trimmed);
            if let Some(dir) = ensure_dir(&path) {
                return dir;
            }
        }
    }

    let root_logs = root.join("logs");
    if let Some(found) = ensure_dir(&root_logs) {
        return found;
    }

    PathBuf::from("logs")
}
