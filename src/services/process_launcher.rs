use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use sysinfo::System;

use crate::errors::{LauncherError, Result};
use crate::locale::Locale;
use crate::services::credential_handoff::HANDOFF_KEY_ENV;
use crate::status::StatusSnapshot;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LaunchOutcome {
    Started { pid: u32 },
    NotFound,
    AlreadyRunning,
    /// Status is not `Ready` or the meeting link is not resolved.
    NotReady,
}

#[derive(Clone, Debug, Serialize)]
pub struct StartedCompanion {
    pub pid: u32,
    pub meeting_id: String,
    pub started_at: i64,
    #[serde(skip)]
    started: Option<Instant>,
}

/// What the companion receives besides the meeting link.
#[derive(Clone, Debug)]
pub struct LaunchContext {
    pub locale: Locale,
    pub email: String,
    /// `handoff://` address and its key; the key goes in the child's environment.
    pub handoff: Option<(String, String)>,
}

#[derive(Clone)]
pub struct ProcessLauncher {
    executable: PathBuf,
    working_dir: PathBuf,
    cooldown: Duration,
    last: Arc<Mutex<Option<StartedCompanion>>>,
}

impl ProcessLauncher {
    pub fn new(executable: PathBuf, working_dir: PathBuf, cooldown: Duration) -> Self {
        Self {
            executable,
            working_dir,
            cooldown,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn last_started(&self) -> Option<StartedCompanion> {
        self.lock().clone()
    }

    /// Refusal that `launch` would return right now, if any. Spawns nothing.
    pub fn preflight(&self, snapshot: &StatusSnapshot) -> Option<LaunchOutcome> {
        let last = self.lock();
        self.refusal(snapshot, &last)
    }

    /// The refusal checks and the spawn run under one lock, so concurrent
    /// callers start at most one companion per cooldown window.
    pub fn launch(
        &self,
        snapshot: &StatusSnapshot,
        context: &LaunchContext,
    ) -> Result<LaunchOutcome> {
        let mut last = self.lock();
        if let Some(refusal) = self.refusal(snapshot, &last) {
            tracing::warn!("launch refused: {:?}", refusal);
            return Ok(refusal);
        }
        let Some((handle, _descriptor)) = snapshot.link.resolved() else {
            return Ok(LaunchOutcome::NotReady);
        };

        let mut cmd = Command::new(&self.executable);
        cmd.current_dir(&self.working_dir)
            .arg(&handle.link)
            .arg(context.locale.as_arg())
            .arg(&context.email);
        match &context.handoff {
            Some((uri, key)) => {
                cmd.arg(uri).env(HANDOFF_KEY_ENV, key);
            }
            None => {
                cmd.arg("");
            }
        }

        let mut child = cmd.spawn().map_err(|err| {
            LauncherError::Install(format!(
                "failed to start {}: {err}",
                self.executable.display()
            ))
        })?;
        let pid = child.id();
        *last = Some(StartedCompanion {
            pid,
            meeting_id: handle.id.clone(),
            started_at: Utc::now().timestamp(),
            started: Some(Instant::now()),
        });
        drop(last);
        tracing::info!("started companion pid {} for meeting {}", pid, handle.id);

        std::thread::spawn(move || match child.wait() {
            Ok(status) => tracing::info!("companion pid {} exited with {}", pid, status),
            Err(err) => tracing::warn!("waiting on companion pid {} failed: {}", pid, err),
        });
        Ok(LaunchOutcome::Started { pid })
    }

    fn refusal(
        &self,
        snapshot: &StatusSnapshot,
        last: &Option<StartedCompanion>,
    ) -> Option<LaunchOutcome> {
        if !snapshot.ready_to_launch() || snapshot.link.is_invalid() {
            return Some(LaunchOutcome::NotReady);
        }
        if !self.executable.is_file() {
            return Some(LaunchOutcome::NotFound);
        }
        let cooling_down = last
            .as_ref()
            .and_then(|last| last.started)
            .is_some_and(|started| started.elapsed() < self.cooldown);
        if cooling_down || self.companion_running() {
            return Some(LaunchOutcome::AlreadyRunning);
        }
        None
    }

    fn companion_running(&self) -> bool {
        let target = std::fs::canonicalize(&self.executable)
            .unwrap_or_else(|_| self.executable.clone());
        let mut sys = System::new();
        sys.refresh_processes();
        sys.processes().values().any(|process| {
            process
                .exe()
                .map(|exe| std::fs::canonicalize(exe).unwrap_or_else(|_| exe.to_path_buf()))
                .is_some_and(|exe| exe == target)
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<StartedCompanion>> {
        match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
