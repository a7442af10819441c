//! Launcher status: the state enum, the events that move it, and the single
//! writer that owns it.
//!
//! Transitions are computed by [`reduce`], a pure function of the current
//! snapshot and an event. [`StatusMachine`] is the only place a snapshot is
//! written; everyone else reads through [`StatusMachine::subscribe`].

use serde::Serialize;
use tokio::sync::watch;

use crate::errors::{LauncherError, Result};
use crate::models::MeetingDescriptor;
use crate::services::link_resolver::MeetingHandle;
use crate::version::Version;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LauncherState {
    Initializing,
    PendingLogin,
    PendingLink,
    Ready,
    DownloadingFull,
    DownloadingUpdate,
    Failed,
}

impl LauncherState {
    pub fn is_downloading(&self) -> bool {
        matches!(
            self,
            LauncherState::DownloadingFull | LauncherState::DownloadingUpdate
        )
    }

    /// States entered once content is installed and current.
    pub fn is_post_install(&self) -> bool {
        matches!(
            self,
            LauncherState::PendingLogin | LauncherState::PendingLink | LauncherState::Ready
        )
    }
}

/// Where the candidate meeting link stands.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum LinkSlot {
    #[default]
    Empty,
    Pending(MeetingHandle),
    Resolved(MeetingHandle, MeetingDescriptor),
    Invalid(MeetingHandle),
}

impl LinkSlot {
    pub fn handle(&self) -> Option<&MeetingHandle> {
        match self {
            LinkSlot::Empty => None,
            LinkSlot::Pending(handle)
            | LinkSlot::Resolved(handle, _)
            | LinkSlot::Invalid(handle) => Some(handle),
        }
    }

    pub fn resolved(&self) -> Option<(&MeetingHandle, &MeetingDescriptor)> {
        match self {
            LinkSlot::Resolved(handle, descriptor) => Some((handle, descriptor)),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, LinkSlot::Invalid(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub state: LauncherState,
    pub authenticated: bool,
    pub link: LinkSlot,
    pub installed_version: Option<Version>,
    pub last_error: Option<String>,
    pub retryable: bool,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            state: LauncherState::Initializing,
            authenticated: false,
            link: LinkSlot::Empty,
            installed_version: None,
            last_error: None,
            retryable: false,
        }
    }
}

impl StatusSnapshot {
    pub fn ready_to_launch(&self) -> bool {
        self.state == LauncherState::Ready && self.link.resolved().is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LauncherEvent {
    /// No version marker on disk.
    LocalVersionMissing,
    /// Local marker differs from the published version.
    UpdateAvailable { local: Version, remote: Version },
    /// Local marker matches the published version.
    ContentCurrent(Version),
    InstallSucceeded(Version),
    /// Update check, download or install failed. `retryable` is informational;
    /// `Failed` always accepts an explicit retry.
    OperationFailed { reason: String, retryable: bool },
    RetryRequested,
    LoginSucceeded,
    LoggedOut,
    LinkSubmitted(MeetingHandle),
    LinkResolved(MeetingHandle, MeetingDescriptor),
    LinkRejected(MeetingHandle),
    LinkCleared,
}

impl LauncherEvent {
    fn name(&self) -> &'static str {
        match self {
            LauncherEvent::LocalVersionMissing => "local_version_missing",
            LauncherEvent::UpdateAvailable { .. } => "update_available",
            LauncherEvent::ContentCurrent(_) => "content_current",
            LauncherEvent::InstallSucceeded(_) => "install_succeeded",
            LauncherEvent::OperationFailed { .. } => "operation_failed",
            LauncherEvent::RetryRequested => "retry_requested",
            LauncherEvent::LoginSucceeded => "login_succeeded",
            LauncherEvent::LoggedOut => "logged_out",
            LauncherEvent::LinkSubmitted(_) => "link_submitted",
            LauncherEvent::LinkResolved(..) => "link_resolved",
            LauncherEvent::LinkRejected(_) => "link_rejected",
            LauncherEvent::LinkCleared => "link_cleared",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Retry,
    Login,
    Logout,
    EnterLink,
    Launch,
}

/// Post-install state from session and link: no session -> PendingLogin,
/// session without a resolved link -> PendingLink, both -> Ready.
pub fn derive_state(authenticated: bool, link: &LinkSlot) -> LauncherState {
    if !authenticated {
        LauncherState::PendingLogin
    } else if link.resolved().is_some() {
        LauncherState::Ready
    } else {
        LauncherState::PendingLink
    }
}

pub fn allowed_actions(snapshot: &StatusSnapshot) -> Vec<Action> {
    match snapshot.state {
        LauncherState::Initializing
        | LauncherState::DownloadingFull
        | LauncherState::DownloadingUpdate => Vec::new(),
        LauncherState::PendingLogin => vec![Action::Login],
        LauncherState::PendingLink => vec![Action::EnterLink, Action::Logout],
        LauncherState::Ready => vec![Action::Launch, Action::EnterLink, Action::Logout],
        LauncherState::Failed => vec![Action::Retry],
    }
}

fn rejected(snapshot: &StatusSnapshot, event: &LauncherEvent) -> LauncherError {
    LauncherError::Transition(format!(
        "{} not allowed in {:?}",
        event.name(),
        snapshot.state
    ))
}

/// Pure transition function.
pub fn reduce(snapshot: &StatusSnapshot, event: &LauncherEvent) -> Result<StatusSnapshot> {
    use LauncherState as S;

    let mut next = snapshot.clone();
    match event {
        LauncherEvent::LocalVersionMissing => {
            if snapshot.state != S::Initializing {
                return Err(rejected(snapshot, event));
            }
            next.state = S::DownloadingFull;
            next.installed_version = None;
        }
        LauncherEvent::UpdateAvailable { local, .. } => {
            if snapshot.state != S::Initializing {
                return Err(rejected(snapshot, event));
            }
            next.state = S::DownloadingUpdate;
            next.installed_version = Some(*local);
        }
        LauncherEvent::ContentCurrent(version) => {
            if snapshot.state != S::Initializing {
                return Err(rejected(snapshot, event));
            }
            next.installed_version = Some(*version);
            next.state = derive_state(next.authenticated, &next.link);
        }
        LauncherEvent::InstallSucceeded(version) => {
            if !snapshot.state.is_downloading() {
                return Err(rejected(snapshot, event));
            }
            next.installed_version = Some(*version);
            next.state = derive_state(next.authenticated, &next.link);
        }
        LauncherEvent::OperationFailed { reason, retryable } => {
            if !matches!(snapshot.state, S::Initializing)
                && !snapshot.state.is_downloading()
            {
                return Err(rejected(snapshot, event));
            }
            next.state = S::Failed;
            next.last_error = Some(reason.clone());
            next.retryable = *retryable;
        }
        LauncherEvent::RetryRequested => {
            if snapshot.state != S::Failed {
                return Err(rejected(snapshot, event));
            }
            next.state = S::Initializing;
            next.last_error = None;
            next.retryable = false;
        }
        LauncherEvent::LoginSucceeded => {
            next.authenticated = true;
            if snapshot.state.is_post_install() {
                next.state = derive_state(true, &next.link);
            }
        }
        LauncherEvent::LoggedOut => {
            next.authenticated = false;
            next.link = match &snapshot.link {
                LinkSlot::Empty => LinkSlot::Empty,
                LinkSlot::Pending(handle)
                | LinkSlot::Resolved(handle, _)
                | LinkSlot::Invalid(handle) => LinkSlot::Pending(handle.clone()),
            };
            if snapshot.state.is_post_install() {
                next.state = S::PendingLogin;
            }
        }
        LauncherEvent::LinkSubmitted(handle) => {
            next.link = LinkSlot::Pending(handle.clone());
            if snapshot.state.is_post_install() {
                next.state = derive_state(next.authenticated, &next.link);
            }
        }
        LauncherEvent::LinkResolved(handle, descriptor) => {
            // A resolution for a link the user has since replaced is stale.
            if snapshot.link.handle() != Some(handle) || !snapshot.authenticated {
                return Err(rejected(snapshot, event));
            }
            next.link = LinkSlot::Resolved(handle.clone(), descriptor.clone());
            if snapshot.state.is_post_install() {
                next.state = derive_state(true, &next.link);
            }
        }
        LauncherEvent::LinkRejected(handle) => {
            if snapshot.link.handle() != Some(handle) {
                return Err(rejected(snapshot, event));
            }
            next.link = LinkSlot::Invalid(handle.clone());
            if snapshot.state.is_post_install() {
                next.state = derive_state(next.authenticated, &next.link);
            }
        }
        LauncherEvent::LinkCleared => {
            next.link = LinkSlot::Empty;
            if snapshot.state.is_post_install() {
                next.state = derive_state(next.authenticated, &next.link);
            }
        }
    }
    Ok(next)
}

/// Single writer of the launcher status; readers subscribe to snapshots.
pub struct StatusMachine {
    tx: watch::Sender<StatusSnapshot>,
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusMachine {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> LauncherState {
        self.tx.borrow().state
    }

    pub fn allowed_actions(&self) -> Vec<Action> {
        allowed_actions(&self.tx.borrow())
    }

    pub fn apply(&self, event: LauncherEvent) -> Result<LauncherState> {
        let mut outcome: Result<LauncherState> = Err(LauncherError::Transition(String::new()));
        self.tx.send_if_modified(|current| match reduce(current, &event) {
            Ok(next) => {
                if next.state != current.state {
                    tracing::info!(
                        "status {:?} -> {:?} on {}",
                        current.state,
                        next.state,
                        event.name()
                    );
                } else {
                    tracing::debug!("status stays {:?} on {}", current.state, event.name());
                }
                let changed = next != *current;
                outcome = Ok(next.state);
                *current = next;
                changed
            }
            Err(err) => {
                tracing::warn!("{}", err);
                outcome = Err(err);
                false
            }
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: char) -> MeetingHandle {
        let id: String = std::iter::repeat(id).take(36).collect();
        MeetingHandle {
            link: format!("ceremeet://ceremeet.io/{id}?pwd=secret"),
            id,
            password: Some("secret".to_string()),
        }
    }

    fn descriptor(handle: &MeetingHandle) -> MeetingDescriptor {
        MeetingDescriptor {
            id: handle.id.clone(),
            title: "Weekly sync".to_string(),
            password: handle.password.clone(),
            owner: Some("Ada".to_string()),
        }
    }

    #[test]
    fn full_install_path() {
        let machine = StatusMachine::new();
        assert_eq!(machine.state(), LauncherState::Initializing);
        assert_eq!(
            machine.apply(LauncherEvent::LocalVersionMissing).expect("missing"),
            LauncherState::DownloadingFull
        );
        assert_eq!(
            machine
                .apply(LauncherEvent::InstallSucceeded(Version::new(1, 2, 3)))
                .expect("installed"),
            LauncherState::PendingLogin
        );
        assert_eq!(
            machine.snapshot().installed_version,
            Some(Version::new(1, 2, 3))
        );
    }

    #[test]
    fn update_path_and_current_path() {
        let machine = StatusMachine::new();
        machine
            .apply(LauncherEvent::UpdateAvailable {
                local: Version::new(1, 0, 0),
                remote: Version::new(1, 0, 1),
            })
            .expect("update");
        assert_eq!(machine.state(), LauncherState::DownloadingUpdate);

        let current = StatusMachine::new();
        current
            .apply(LauncherEvent::ContentCurrent(Version::new(1, 0, 0)))
            .expect("current");
        assert_eq!(current.state(), LauncherState::PendingLogin);
    }

    #[test]
    fn downloads_cannot_be_reentered() {
        let machine = StatusMachine::new();
        machine.apply(LauncherEvent::LocalVersionMissing).expect("first");
        assert!(machine.apply(LauncherEvent::LocalVersionMissing).is_err());
        assert!(machine
            .apply(LauncherEvent::UpdateAvailable {
                local: Version::new(1, 0, 0),
                remote: Version::new(2, 0, 0)
            })
            .is_err());
        assert_eq!(machine.state(), LauncherState::DownloadingFull);
    }

    #[test]
    fn failure_then_retry_returns_to_initializing() {
        let machine = StatusMachine::new();
        machine.apply(LauncherEvent::LocalVersionMissing).expect("download");
        machine
            .apply(LauncherEvent::OperationFailed {
                reason: "disk full".to_string(),
                retryable: true,
            })
            .expect("fail");
        assert_eq!(machine.state(), LauncherState::Failed);
        assert_eq!(machine.allowed_actions(), vec![Action::Retry]);
        machine.apply(LauncherEvent::RetryRequested).expect("retry");
        assert_eq!(machine.state(), LauncherState::Initializing);
        assert!(machine.snapshot().last_error.is_none());
    }

    #[test]
    fn login_and_link_lead_to_ready() {
        let machine = StatusMachine::new();
        machine
            .apply(LauncherEvent::ContentCurrent(Version::new(1, 0, 0)))
            .expect("current");
        machine.apply(LauncherEvent::LoginSucceeded).expect("login");
        assert_eq!(machine.state(), LauncherState::PendingLink);

        let link = handle('a');
        machine
            .apply(LauncherEvent::LinkSubmitted(link.clone()))
            .expect("submit");
        assert_eq!(machine.state(), LauncherState::PendingLink);
        machine
            .apply(LauncherEvent::LinkResolved(link.clone(), descriptor(&link)))
            .expect("resolve");
        assert_eq!(machine.state(), LauncherState::Ready);
        assert!(machine.snapshot().ready_to_launch());
        assert_eq!(
            machine.allowed_actions(),
            vec![Action::Launch, Action::EnterLink, Action::Logout]
        );
    }

    #[test]
    fn changing_or_invalidating_link_leaves_ready() {
        let machine = StatusMachine::new();
        machine
            .apply(LauncherEvent::ContentCurrent(Version::new(1, 0, 0)))
            .expect("current");
        machine.apply(LauncherEvent::LoginSucceeded).expect("login");
        let first = handle('a');
        machine
            .apply(LauncherEvent::LinkSubmitted(first.clone()))
            .expect("submit");
        machine
            .apply(LauncherEvent::LinkResolved(first.clone(), descriptor(&first)))
            .expect("resolve");

        let second = handle('b');
        machine
            .apply(LauncherEvent::LinkSubmitted(second.clone()))
            .expect("submit second");
        assert_eq!(machine.state(), LauncherState::PendingLink);

        // A late answer for the replaced link must not make the launcher ready.
        assert!(machine
            .apply(LauncherEvent::LinkResolved(first.clone(), descriptor(&first)))
            .is_err());
        machine
            .apply(LauncherEvent::LinkRejected(second.clone()))
            .expect("reject");
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.state, LauncherState::PendingLink);
        assert!(snapshot.link.is_invalid());
        assert!(!snapshot.ready_to_launch());
    }

    #[test]
    fn logout_forces_pending_login() {
        let machine = StatusMachine::new();
        machine
            .apply(LauncherEvent::ContentCurrent(Version::new(1, 0, 0)))
            .expect("current");
        machine.apply(LauncherEvent::LoginSucceeded).expect("login");
        let link = handle('c');
        machine
            .apply(LauncherEvent::LinkSubmitted(link.clone()))
            .expect("submit");
        machine
            .apply(LauncherEvent::LinkResolved(link.clone(), descriptor(&link)))
            .expect("resolve");
        machine.apply(LauncherEvent::LoggedOut).expect("logout");

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.state, LauncherState::PendingLogin);
        assert_eq!(snapshot.link, LinkSlot::Pending(link));
        assert_eq!(machine.allowed_actions(), vec![Action::Login]);
    }

    #[test]
    fn link_submitted_during_download_is_kept_for_later() {
        let machine = StatusMachine::new();
        let link = handle('d');
        machine.apply(LauncherEvent::LocalVersionMissing).expect("download");
        machine
            .apply(LauncherEvent::LinkSubmitted(link.clone()))
            .expect("submit");
        assert_eq!(machine.state(), LauncherState::DownloadingFull);
        assert_eq!(machine.snapshot().link, LinkSlot::Pending(link));
    }

    #[test]
    fn subscribers_observe_transitions() {
        let machine = StatusMachine::new();
        let mut rx = machine.subscribe();
        machine.apply(LauncherEvent::LocalVersionMissing).expect("download");
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(rx.borrow_and_update().state, LauncherState::DownloadingFull);
    }

    #[test]
    fn reduce_is_pure() {
        let snapshot = StatusSnapshot::default();
        let next = reduce(&snapshot, &LauncherEvent::LocalVersionMissing).expect("ok");
        assert_eq!(snapshot.state, LauncherState::Initializing);
        assert_eq!(next.state, LauncherState::DownloadingFull);
    }
}
