//! Keeps the Ceremeet companion installed and current, signs the user in,
//! resolves meeting links and starts the companion on them.
//!
//! [`launcher::Launcher`] is the entry point; the `ceremeet-launcher` binary is
//! a thin CLI over it.

pub mod config;
pub mod errors;
pub mod launcher;
pub mod locale;
pub mod logging;
pub mod models;
pub mod services;
pub mod status;
pub mod utils;
pub mod version;
