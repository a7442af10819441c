use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::errors::{LauncherError, Result};
use crate::models::UserProfile;
use crate::services::remote_api::RemoteApi;

/// Authenticated user for the lifetime of the process. Never written to disk.
#[derive(Clone, Serialize)]
pub struct Session {
    #[serde(skip)]
    token: String,
    pub name: String,
    pub email: String,
    pub domain: Option<String>,
    pub personal_membership: Option<String>,
    pub organization_membership: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("domain", &self.domain)
            .field("personal_membership", &self.personal_membership)
            .field("organization_membership", &self.organization_membership)
            .finish()
    }
}

impl Session {
    pub fn new(token: String) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(LauncherError::Auth("empty access token".to_string()));
        }
        Ok(Self {
            token,
            name: String::new(),
            email: String::new(),
            domain: None,
            personal_membership: None,
            organization_membership: None,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Organization tier wins when present; otherwise the personal tier.
    pub fn effective_tier(&self) -> Option<&str> {
        self.organization_membership
            .as_deref()
            .or(self.personal_membership.as_deref())
    }

    fn apply_profile(&mut self, profile: UserProfile) {
        self.name = profile.name;
        self.email = profile.email;
        self.domain = profile.domain.filter(|domain| !domain.trim().is_empty());
        self.personal_membership = profile.membership;
    }
}

#[derive(Clone)]
pub struct SessionManager {
    api: Arc<dyn RemoteApi>,
    current: Arc<Mutex<Option<Session>>>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        Self {
            api,
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(LauncherError::Auth(
                "email and password are required".to_string(),
            ));
        }

        let token = self.api.login(email, password).await?;
        let mut session = Session::new(token)?;
        let profile = self.fetch_profile(&session).await?;
        session.apply_profile(profile);
        if let Some(domain) = session.domain.clone() {
            session.organization_membership =
                self.fetch_organization_membership(&domain, &session).await;
        }

        tracing::info!(
            "signed in as {} (tier {})",
            session.email,
            session.effective_tier().unwrap_or("none")
        );
        *self.lock() = Some(session.clone());
        Ok(session)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<String> {
        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(LauncherError::Auth(
                "name, email and password are required".to_string(),
            ));
        }
        let message = self.api.register(name.trim(), email.trim(), password).await?;
        tracing::info!("registered account {}", email.trim());
        Ok(message)
    }

    pub async fn fetch_profile(&self, session: &Session) -> Result<UserProfile> {
        self.api.current_user(session.token()).await
    }

    /// Absence and lookup failures both yield `None`; the personal tier applies then.
    pub async fn fetch_organization_membership(
        &self,
        domain: &str,
        session: &Session,
    ) -> Option<String> {
        match self.api.company_membership(domain, session.token()).await {
            Ok(membership) => membership,
            Err(err) => {
                tracing::warn!("organization membership for {} unavailable: {}", domain, err);
                None
            }
        }
    }

    pub fn logout(&self) {
        if let Some(session) = self.lock().take() {
            tracing::info!("signed out {}", session.email);
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.lock().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
