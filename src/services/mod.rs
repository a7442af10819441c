pub mod api_client;
pub mod credential_handoff;
pub mod downloader;
pub mod installer;
pub mod latency_monitor;
pub mod link_resolver;
pub mod meeting_service;
pub mod process_launcher;
pub mod remote_api;
pub mod session_manager;
pub mod update_checker;
pub mod version_store;

pub use api_client::ApiClient;
pub use downloader::Downloader;
pub use link_resolver::LinkResolver;
pub use meeting_service::MeetingService;
pub use process_launcher::LaunchOutcome;
pub use remote_api::RemoteApi;
pub use session_manager::SessionManager;
pub use update_checker::{ContentSource, HttpContentSource, UpdateDecision};
pub use version_store::VersionStore;
