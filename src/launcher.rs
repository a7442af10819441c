//! Ties the services to the status machine. Every async outcome becomes a
//! [`LauncherEvent`]; nothing here writes status any other way.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};

use crate::config::LauncherConfig;
use crate::errors::{LauncherError, Result};
use crate::locale::Locale;
use crate::services::credential_handoff::{CredentialHandoff, HandoffOutcome, HandoffTicket};
use crate::services::downloader::{DownloadControl, DownloadEvent};
use crate::services::installer::Installer;
use crate::services::latency_monitor::LatencyMonitor;
use crate::services::link_resolver::LinkResolver;
use crate::services::meeting_service::{CreatedMeeting, MeetingService};
use crate::services::process_launcher::{LaunchContext, LaunchOutcome, ProcessLauncher};
use crate::services::remote_api::RemoteApi;
use crate::services::session_manager::{Session, SessionManager};
use crate::services::update_checker::{ContentSource, UpdateChecker, UpdateDecision};
use crate::services::version_store::VersionStore;
use crate::status::{
    Action, LauncherEvent, LauncherState, LinkSlot, StatusMachine, StatusSnapshot,
};
use crate::version::Version;

pub struct Launcher {
    install_root: PathBuf,
    status: StatusMachine,
    versions: VersionStore,
    checker: UpdateChecker,
    content: Arc<dyn ContentSource>,
    installer: Installer,
    sessions: SessionManager,
    links: LinkResolver,
    meetings: MeetingService,
    latency: LatencyMonitor,
    process: ProcessLauncher,
    handoff: CredentialHandoff,
    download_control: watch::Sender<DownloadControl>,
    progress: Arc<watch::Sender<Option<u8>>>,
    pending_handoff: Mutex<Option<HandoffTicket>>,
    launch_gate: Mutex<()>,
}

impl Launcher {
    pub fn new(
        config: &LauncherConfig,
        install_root: PathBuf,
        api: Arc<dyn RemoteApi>,
        content: Arc<dyn ContentSource>,
    ) -> Self {
        let versions = VersionStore::new(config.version_file(&install_root));
        let installer = Installer::new(
            install_root.clone(),
            config.archive_path(&install_root),
            Path::new(&config.content_dir_name).join(&config.executable_name),
            versions.clone(),
        );
        let links = LinkResolver::new(config, api.clone());
        let (download_control, _) = watch::channel(DownloadControl::Running);
        let (progress, _) = watch::channel(None);

        Self {
            status: StatusMachine::new(),
            checker: UpdateChecker::new(content.clone()),
            content,
            installer,
            versions,
            sessions: SessionManager::new(api.clone()),
            meetings: MeetingService::new(api.clone(), links.clone()),
            links,
            latency: LatencyMonitor::new(api, config.ping_interval()),
            process: ProcessLauncher::new(
                config.executable_path(&install_root),
                config.content_dir(&install_root),
                config.launch_cooldown(),
            ),
            handoff: CredentialHandoff::new(config.handoff_ttl()),
            download_control,
            progress: Arc::new(progress),
            pending_handoff: Mutex::new(None),
            launch_gate: Mutex::new(()),
            install_root,
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    /// Download percent while a transfer with a known length is running.
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<u8>> {
        self.progress.subscribe()
    }

    pub fn subscribe_latency(&self) -> watch::Receiver<Option<u64>> {
        self.latency.subscribe()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn allowed_actions(&self) -> Vec<Action> {
        self.status.allowed_actions()
    }

    pub fn installed_version(&self) -> Option<Version> {
        self.status.snapshot().installed_version
    }

    pub fn session(&self) -> Option<Session> {
        self.sessions.current()
    }

    /// Takes the startup link, if any, then runs the update pipeline.
    pub async fn start_up(&self, startup_link: Option<&str>) -> Result<LauncherState> {
        if let Some(link) = startup_link.filter(|link| !link.trim().is_empty()) {
            if let Err(err) = self.submit_link(link).await {
                tracing::warn!("startup link ignored: {}", err);
            }
        }
        self.run_update_pipeline().await
    }

    pub async fn retry(&self) -> Result<LauncherState> {
        self.require(Action::Retry)?;
        self.status.apply(LauncherEvent::RetryRequested)?;
        self.run_update_pipeline().await
    }

    /// Update check without touching status; used by the `check` command.
    pub async fn check_for_updates(&self) -> Result<UpdateDecision> {
        let local = self.load_local_version()?;
        self.checker.check(local).await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<String> {
        self.sessions.register(name, email, password).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        self.require(Action::Login)?;
        let session = self.sessions.login(email, password).await?;
        self.status.apply(LauncherEvent::LoginSucceeded)?;
        self.latency.start();
        if let Err(err) = self.resolve_current_link().await {
            tracing::warn!("pending link did not resolve after login: {}", err);
        }
        Ok(session)
    }

    pub async fn logout(&self) -> Result<LauncherState> {
        self.require(Action::Logout)?;
        self.sessions.logout();
        self.latency.stop();
        self.status.apply(LauncherEvent::LoggedOut)
    }

    /// Stores the candidate link and resolves it when content is ready and a
    /// session exists. Text that is not a link clears the current one.
    pub async fn submit_link(&self, text: &str) -> Result<LauncherState> {
        let handle = match self.links.try_parse(text) {
            Ok(handle) => handle,
            Err(err) => {
                if self.status.snapshot().link != LinkSlot::Empty {
                    self.status.apply(LauncherEvent::LinkCleared)?;
                }
                return Err(err);
            }
        };

        let snapshot = self.status.snapshot();
        if let Some((current, _)) = snapshot.link.resolved() {
            if *current == handle {
                return Ok(snapshot.state);
            }
        }
        self.status.apply(LauncherEvent::LinkSubmitted(handle))?;
        self.resolve_current_link().await?;
        Ok(self.status.state())
    }

    pub async fn create_meeting(
        &self,
        title: &str,
        password: &str,
        presentation: &str,
    ) -> Result<CreatedMeeting> {
        let session = self
            .sessions
            .current()
            .ok_or_else(|| LauncherError::Auth("sign in to create meetings".to_string()))?;
        self.meetings
            .create(title, password, presentation, &session)
            .await
    }

    /// Starts the companion when status is `Ready`. The session token is offered
    /// over a one-shot loopback handoff instead of the command line.
    pub async fn launch(&self, locale: Locale) -> Result<LaunchOutcome> {
        let _gate = self.launch_gate.lock().await;
        let snapshot = self.status.snapshot();
        if let Some(refusal) = self.process.preflight(&snapshot) {
            tracing::warn!("launch refused in {:?}: {:?}", snapshot.state, refusal);
            return Ok(refusal);
        }
        let Some(session) = self.sessions.current() else {
            return Ok(LaunchOutcome::NotReady);
        };

        let ticket = self.handoff.offer(session.token().to_string()).await?;
        let context = LaunchContext {
            locale,
            email: session.email.clone(),
            handoff: Some((ticket.uri().to_string(), ticket.key().to_string())),
        };
        let outcome = self.process.launch(&snapshot, &context)?;
        if matches!(outcome, LaunchOutcome::Started { .. }) {
            *self.pending_handoff.lock().await = Some(ticket);
        }
        Ok(outcome)
    }

    /// Waits for the companion to claim the credential or for the offer to expire.
    pub async fn await_handoff(&self) -> Option<HandoffOutcome> {
        let ticket = self.pending_handoff.lock().await.take()?;
        Some(ticket.outcome().await)
    }

    /// Cancels the current or next download, stops the latency probe and
    /// withdraws any unclaimed handoff.
    pub async fn shutdown(&self) {
        self.download_control.send_replace(DownloadControl::Cancelled);
        self.latency.stop();
        self.pending_handoff.lock().await.take();
        tracing::info!("launcher shut down in {:?}", self.status.state());
    }

    fn require(&self, action: Action) -> Result<()> {
        if self.status.allowed_actions().contains(&action) {
            return Ok(());
        }
        Err(LauncherError::Transition(format!(
            "{:?} not available in {:?}",
            action,
            self.status.state()
        )))
    }

    /// A marker that does not parse counts as nothing installed, here only.
    fn load_local_version(&self) -> Result<Option<Version>> {
        match self.versions.load() {
            Ok(version) => Ok(version),
            Err(LauncherError::Parse(reason)) => {
                tracing::warn!(
                    "ignoring unreadable version marker {}: {}",
                    self.versions.path().display(),
                    reason
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn run_update_pipeline(&self) -> Result<LauncherState> {
        if self.status.state() != LauncherState::Initializing {
            return Err(LauncherError::Transition(format!(
                "update check needs Initializing, status is {:?}",
                self.status.state()
            )));
        }

        let local = match self.load_local_version() {
            Ok(local) => local,
            Err(err) => return self.fail(err),
        };
        let decision = match self.checker.check(local).await {
            Ok(decision) => decision,
            Err(err) => return self.fail(err),
        };

        let target = match decision {
            UpdateDecision::NoUpdate => {
                self.status
                    .apply(LauncherEvent::ContentCurrent(local.unwrap_or_default()))?;
                return self.after_content_ready().await;
            }
            UpdateDecision::FullInstall(remote) => {
                self.status.apply(LauncherEvent::LocalVersionMissing)?;
                remote
            }
            UpdateDecision::IncrementalUpdate(remote) => {
                self.status.apply(LauncherEvent::UpdateAvailable {
                    local: local.unwrap_or_default(),
                    remote,
                })?;
                remote
            }
        };

        match self.download_and_install(target).await {
            Ok(()) => {
                self.status.apply(LauncherEvent::InstallSucceeded(target))?;
                self.after_content_ready().await
            }
            Err(err) => self.fail(err),
        }
    }

    async fn download_and_install(&self, target: Version) -> Result<()> {
        let (events, mut rx) = mpsc::unbounded_channel();
        let progress = self.progress.clone();
        let forward = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    DownloadEvent::Progress { percent, .. } => {
                        progress.send_replace(Some(percent));
                    }
                    DownloadEvent::Completed {
                        downloaded_bytes, ..
                    } => tracing::debug!("archive complete, {} bytes", downloaded_bytes),
                    DownloadEvent::Failed { reason } => {
                        tracing::debug!("archive download failed: {}", reason)
                    }
                }
            }
        });

        let control = self.download_control.subscribe();
        let fetched = if *control.borrow() == DownloadControl::Cancelled {
            Err(LauncherError::Cancelled)
        } else {
            self.content
                .fetch_archive(self.installer.archive_path(), &events, control)
                .await
        };
        drop(events);
        if let Err(err) = forward.await {
            tracing::warn!("download progress forwarder stopped abnormally: {}", err);
        }
        self.progress.send_replace(None);

        self.installer.apply(&fetched?, target).await
    }

    fn fail(&self, err: LauncherError) -> Result<LauncherState> {
        tracing::error!("update pipeline failed: {}", err);
        self.status.apply(LauncherEvent::OperationFailed {
            reason: err.to_string(),
            retryable: err.is_retryable(),
        })
    }

    async fn after_content_ready(&self) -> Result<LauncherState> {
        if let Err(err) = self.resolve_current_link().await {
            tracing::warn!("pending link did not resolve: {}", err);
        }
        Ok(self.status.state())
    }

    /// Resolves a pending link once content is ready and a session exists.
    /// An unresolvable link is marked invalid and the error returned.
    async fn resolve_current_link(&self) -> Result<()> {
        let snapshot = self.status.snapshot();
        let LinkSlot::Pending(handle) = snapshot.link else {
            return Ok(());
        };
        if !snapshot.authenticated || !snapshot.state.is_post_install() {
            return Ok(());
        }
        let Some(session) = self.sessions.current() else {
            return Ok(());
        };

        match self.links.resolve(&handle, &session).await {
            Ok(descriptor) => {
                if let Err(err) = self
                    .status
                    .apply(LauncherEvent::LinkResolved(handle, descriptor))
                {
                    tracing::debug!("dropping stale resolution: {}", err);
                }
                Ok(())
            }
            Err(err) => {
                if let Err(stale) = self.status.apply(LauncherEvent::LinkRejected(handle)) {
                    tracing::debug!("dropping stale rejection: {}", stale);
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::services::remote_api::tests::FakeApi;
    use crate::services::update_checker::tests::FakeSource;
    use tempfile::{tempdir, TempDir};

    const ID: &str = "9a1d6c3e-58b2-4f0a-a7c4-2e6b8d0f1a3c";

    struct Harness {
        _dir: TempDir,
        root: PathBuf,
        api: Arc<FakeApi>,
        source: Arc<FakeSource>,
        launcher: Launcher,
    }

    fn harness(remote: Version) -> Harness {
        let dir = tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();
        let api = Arc::new(
            FakeApi::default()
                .with_user("ada@corp.io", "pw", "Ada", "corp.io")
                .with_meeting(ID, "Quarterly review"),
        );
        let source = Arc::new(FakeSource::serving(remote));
        let config = LauncherConfig {
            ping_interval_secs: 1,
            handoff_ttl_secs: 1,
            ..LauncherConfig::default()
        };
        let launcher = Launcher::new(&config, root.clone(), api.clone(), source.clone());
        *source.observer.lock().expect("observer") = Some(launcher.subscribe());
        Harness {
            _dir: dir,
            root,
            api,
            source,
            launcher,
        }
    }

    fn link() -> String {
        format!("ceremeet://ceremeet.io/{ID}?pwd=s3cret")
    }

    fn seen(source: &FakeSource) -> Vec<LauncherState> {
        source.seen_during_fetch.lock().expect("seen").clone()
    }

    #[tokio::test]
    async fn first_run_installs_then_waits_for_login() {
        let h = harness(Version::new(1, 2, 3));
        let state = h.launcher.start_up(None).await.expect("start up");

        assert_eq!(seen(&h.source), vec![LauncherState::DownloadingFull]);
        assert_eq!(state, LauncherState::PendingLogin);
        assert_eq!(
            std::fs::read_to_string(h.root.join("Version.txt")).expect("marker"),
            "1.2.3"
        );
        assert_eq!(h.launcher.installed_version(), Some(Version::new(1, 2, 3)));
        assert!(h.root.join("Ceremeet/readme.txt").exists());
        assert!(!h.root.join("Ceremeet.zip").exists());
        assert_eq!(h.launcher.allowed_actions(), vec![Action::Login]);
    }

    #[tokio::test]
    async fn differing_local_version_downloads_update() {
        let h = harness(Version::new(1, 0, 1));
        std::fs::write(h.root.join("Version.txt"), "1.0.0").expect("marker");

        let state = h.launcher.start_up(None).await.expect("start up");
        assert_eq!(seen(&h.source), vec![LauncherState::DownloadingUpdate]);
        assert_eq!(state, LauncherState::PendingLogin);
        assert_eq!(
            std::fs::read_to_string(h.root.join("Version.txt")).expect("marker"),
            "1.0.1"
        );
    }

    #[tokio::test]
    async fn current_content_skips_download() {
        let h = harness(Version::new(2, 0, 0));
        std::fs::write(h.root.join("Version.txt"), "2.0.0\n").expect("marker");

        assert_eq!(
            h.launcher.start_up(None).await.expect("start up"),
            LauncherState::PendingLogin
        );
        assert_eq!(h.source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn corrupt_marker_is_treated_as_not_installed() {
        let h = harness(Version::new(1, 0, 0));
        std::fs::write(h.root.join("Version.txt"), "garbage").expect("marker");

        h.launcher.start_up(None).await.expect("start up");
        assert_eq!(seen(&h.source), vec![LauncherState::DownloadingFull]);
    }

    #[tokio::test]
    async fn network_failure_fails_then_retry_recovers() {
        let h = harness(Version::new(1, 0, 0));
        h.source.set_version(Err(LauncherError::Http {
            status: 503,
            body: "down".to_string(),
        }));

        let state = h.launcher.start_up(None).await.expect("start up");
        assert_eq!(state, LauncherState::Failed);
        let snapshot = h.launcher.snapshot();
        assert!(snapshot.retryable);
        assert!(snapshot.last_error.is_some());
        assert!(!h.root.join("Version.txt").exists());
        assert_eq!(h.launcher.allowed_actions(), vec![Action::Retry]);
        assert!(h.launcher.login("ada@corp.io", "pw").await.is_err());

        h.source.set_version(Ok(Version::new(1, 0, 0)));
        assert_eq!(
            h.launcher.retry().await.expect("retry"),
            LauncherState::PendingLogin
        );
    }

    #[tokio::test]
    async fn failed_download_keeps_previous_marker() {
        let h = harness(Version::new(1, 1, 0));
        std::fs::write(h.root.join("Version.txt"), "1.0.0").expect("marker");
        h.source.fail_download.store(true, Ordering::SeqCst);

        assert_eq!(
            h.launcher.start_up(None).await.expect("start up"),
            LauncherState::Failed
        );
        assert_eq!(
            std::fs::read_to_string(h.root.join("Version.txt")).expect("marker"),
            "1.0.0"
        );
        assert!(!h.root.join("Ceremeet.zip.part").exists());
    }

    #[tokio::test]
    async fn startup_link_resolves_after_login() {
        let h = harness(Version::new(1, 0, 0));
        h.launcher.start_up(Some(&link())).await.expect("start up");
        assert_eq!(h.launcher.snapshot().state, LauncherState::PendingLogin);
        assert!(matches!(h.launcher.snapshot().link, LinkSlot::Pending(_)));

        h.launcher.login("ada@corp.io", "pw").await.expect("login");
        let snapshot = h.launcher.snapshot();
        assert_eq!(snapshot.state, LauncherState::Ready);
        assert!(snapshot.ready_to_launch());
        assert_eq!(
            snapshot.link.resolved().map(|(_, d)| d.title.as_str()),
            Some("Quarterly review")
        );
        h.launcher.shutdown().await;
    }

    #[tokio::test]
    async fn unresolvable_link_stays_pending() {
        let h = harness(Version::new(1, 0, 0));
        h.launcher.start_up(None).await.expect("start up");
        h.launcher.login("ada@corp.io", "pw").await.expect("login");

        let unknown = "ceremeet://ceremeet.io/00000000-0000-0000-0000-000000000000?pwd=x";
        let err = h.launcher.submit_link(unknown).await.expect_err("404");
        assert!(matches!(err, LauncherError::InvalidLink(_)));
        let snapshot = h.launcher.snapshot();
        assert_eq!(snapshot.state, LauncherState::PendingLink);
        assert!(snapshot.link.is_invalid());
        assert!(!snapshot.ready_to_launch());
        h.launcher.shutdown().await;
    }

    #[tokio::test]
    async fn bad_credentials_stay_pending_login() {
        let h = harness(Version::new(1, 0, 0));
        h.launcher.start_up(None).await.expect("start up");
        let err = h.launcher.login("ada@corp.io", "wrong").await.expect_err("rejected");
        assert!(matches!(err, LauncherError::Auth(_)));
        assert_eq!(h.launcher.snapshot().state, LauncherState::PendingLogin);
    }

    #[tokio::test]
    async fn replacing_link_with_text_leaves_ready() {
        let h = harness(Version::new(1, 0, 0));
        h.launcher.start_up(None).await.expect("start up");
        h.launcher.login("ada@corp.io", "pw").await.expect("login");
        assert_eq!(
            h.launcher.submit_link(&link()).await.expect("submit"),
            LauncherState::Ready
        );

        assert!(h.launcher.submit_link("not a link").await.is_err());
        let snapshot = h.launcher.snapshot();
        assert_eq!(snapshot.state, LauncherState::PendingLink);
        assert_eq!(snapshot.link, LinkSlot::Empty);
        h.launcher.shutdown().await;
    }

    #[tokio::test]
    async fn logout_returns_to_pending_login_and_stops_latency_monitor() {
        let h = harness(Version::new(1, 0, 0));
        h.launcher.start_up(Some(&link())).await.expect("start up");
        h.launcher.login("ada@corp.io", "pw").await.expect("login");
        assert!(h.launcher.latency.is_running());

        assert_eq!(
            h.launcher.logout().await.expect("logout"),
            LauncherState::PendingLogin
        );
        assert!(!h.launcher.latency.is_running());
        assert!(h.launcher.session().is_none());
        assert_eq!(h.api.meeting_lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn launch_is_refused_until_ready() {
        let h = harness(Version::new(1, 0, 0));
        h.launcher.start_up(None).await.expect("start up");
        assert!(h.root.join("Ceremeet").exists());
        assert_eq!(
            h.launcher.launch(Locale::EnUs).await.expect("launch"),
            LaunchOutcome::NotReady
        );

        h.launcher.login("ada@corp.io", "pw").await.expect("login");
        assert_eq!(
            h.launcher.launch(Locale::EnUs).await.expect("launch"),
            LaunchOutcome::NotReady
        );
        h.launcher.shutdown().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launch_from_ready_starts_companion_and_offers_handoff() {
        use std::os::unix::fs::PermissionsExt;

        let h = harness(Version::new(1, 0, 0));
        h.launcher.start_up(Some(&link())).await.expect("start up");
        h.launcher.login("ada@corp.io", "pw").await.expect("login");
        let exe = h.root.join("Ceremeet/ceremeet");
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let outcome = h.launcher.launch(Locale::TrTr).await.expect("launch");
        assert!(matches!(outcome, LaunchOutcome::Started { .. }));
        assert_eq!(
            h.launcher.launch(Locale::TrTr).await.expect("again"),
            LaunchOutcome::AlreadyRunning
        );
        assert_eq!(h.launcher.await_handoff().await, Some(HandoffOutcome::Expired));
        h.launcher.shutdown().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn concurrent_launches_start_one_companion() {
        use std::os::unix::fs::PermissionsExt;

        let h = harness(Version::new(1, 0, 0));
        h.launcher.start_up(Some(&link())).await.expect("start up");
        h.launcher.login("ada@corp.io", "pw").await.expect("login");
        let exe = h.root.join("Ceremeet/ceremeet");
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let (first, second) = tokio::join!(
            h.launcher.launch(Locale::EnUs),
            h.launcher.launch(Locale::EnUs)
        );
        let outcomes = [first.expect("first"), second.expect("second")];
        let started = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, LaunchOutcome::Started { .. }))
            .count();
        assert_eq!(started, 1, "outcomes: {outcomes:?}");
        assert!(outcomes.contains(&LaunchOutcome::AlreadyRunning));
        h.launcher.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_before_download_skips_the_fetch() {
        let h = harness(Version::new(1, 0, 0));
        h.launcher.shutdown().await;

        assert_eq!(
            h.launcher.start_up(None).await.expect("start up"),
            LauncherState::Failed
        );
        assert_eq!(h.source.fetches.load(Ordering::SeqCst), 0);
        assert!(!h.root.join("Version.txt").exists());
    }

    #[tokio::test]
    async fn unavailable_update_host_fails_the_pipeline() {
        use crate::services::api_client::tests::{serve, StubReply};
        use crate::services::update_checker::HttpContentSource;
        use crate::services::Downloader;

        let base = serve(vec![("GET /Version.txt", StubReply::json(503, "maintenance"))]).await;
        let dir = tempdir().expect("tempdir");
        let config = LauncherConfig {
            update_host: base,
            ..LauncherConfig::default()
        };
        let content = Arc::new(HttpContentSource::new(&config, Downloader::new(&config)));
        let launcher = Launcher::new(
            &config,
            dir.path().to_path_buf(),
            Arc::new(FakeApi::default()),
            content,
        );

        assert_eq!(
            launcher.start_up(None).await.expect("start up"),
            LauncherState::Failed
        );
        let snapshot = launcher.snapshot();
        assert!(snapshot.retryable);
        assert!(snapshot.last_error.unwrap_or_default().contains("503"));
        assert_eq!(launcher.allowed_actions(), vec![Action::Retry]);
    }

    #[tokio::test]
    async fn registered_account_can_sign_in() {
        let h = harness(Version::new(1, 0, 0));
        let message = h
            .launcher
            .register("Grace", "grace@corp.io", "hopper")
            .await
            .expect("register");
        assert_eq!(message, "User registered");

        h.launcher.start_up(None).await.expect("start up");
        let session = h.launcher.login("grace@corp.io", "hopper").await.expect("login");
        assert_eq!(session.name, "Grace");
        assert_eq!(h.launcher.snapshot().state, LauncherState::PendingLink);
        h.launcher.shutdown().await;
    }

    #[tokio::test]
    async fn hosted_meeting_link_makes_launcher_ready() {
        let h = harness(Version::new(1, 0, 0));
        h.launcher.start_up(None).await.expect("start up");
        let err = h
            .launcher
            .create_meeting("Design sync", "s3", "")
            .await
            .expect_err("needs a session");
        assert!(matches!(err, LauncherError::Auth(_)));

        h.launcher.login("ada@corp.io", "pw").await.expect("login");
        let created = h
            .launcher
            .create_meeting("Design sync", "s3", "")
            .await
            .expect("create");
        assert!(created.link.ends_with("?pwd=s3"));

        assert_eq!(
            h.launcher.submit_link(&created.link).await.expect("submit"),
            LauncherState::Ready
        );
        assert_eq!(
            h.launcher
                .snapshot()
                .link
                .resolved()
                .map(|(_, meeting)| meeting.title.clone()),
            Some("Design sync".to_string())
        );
        h.launcher.shutdown().await;
    }
}

