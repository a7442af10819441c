use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::errors::LauncherError;
use crate::status::LauncherState;

/// Companion and status-text language.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Locale {
    #[default]
    EnUs,
    TrTr,
}

impl Locale {
    /// Turkish system locales (`tr-TR`, `tr_TR.UTF-8`, ...) pick Turkish; everything else English.
    pub fn from_system(raw: &str) -> Self {
        let lang = raw
            .split(['-', '_', '.'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if lang == "tr" {
            Locale::TrTr
        } else {
            Locale::EnUs
        }
    }

    /// Reads `LC_ALL`, then `LANG`.
    pub fn detect() -> Self {
        ["LC_ALL", "LANG"]
            .iter()
            .find_map(|key| crate::config::env_non_empty(key))
            .map(|raw| Self::from_system(&raw))
            .unwrap_or_default()
    }

    /// Token the companion expects as its locale argument.
    pub fn as_arg(&self) -> &'static str {
        match self {
            Locale::EnUs => "eng-US",
            Locale::TrTr => "tr-TR",
        }
    }

    pub fn label(&self, state: LauncherState) -> &'static str {
        use LauncherState as S;
        match (self, state) {
            (Locale::EnUs, S::Initializing) => "Checking for updates",
            (Locale::EnUs, S::PendingLogin) => "Sign in",
            (Locale::EnUs, S::PendingLink) => "Enter meeting link",
            (Locale::EnUs, S::Ready) => "Start",
            (Locale::EnUs, S::DownloadingFull) => "Downloading Ceremeet",
            (Locale::EnUs, S::DownloadingUpdate) => "Downloading update",
            (Locale::EnUs, S::Failed) => "Update failed - retry",
            (Locale::TrTr, S::Initializing) => "Güncellemeler kontrol ediliyor",
            (Locale::TrTr, S::PendingLogin) => "Giriş yapın",
            (Locale::TrTr, S::PendingLink) => "Toplantı bağlantısını girin",
            (Locale::TrTr, S::Ready) => "Başlat",
            (Locale::TrTr, S::DownloadingFull) => "Ceremeet indiriliyor",
            (Locale::TrTr, S::DownloadingUpdate) => "Güncelleme indiriliyor",
            (Locale::TrTr, S::Failed) => "Güncelleme başarısız - tekrar deneyin",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl FromStr for Locale {
    type Err = LauncherError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "eng-us" | "en_us" => Ok(Locale::EnUs),
            "tr" | "tr-tr" | "tr_tr" => Ok(Locale::TrTr),
            other => Err(LauncherError::Parse(format!("unsupported locale '{other}'"))),
        }
    }
}
