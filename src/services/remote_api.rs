use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{LauncherError, Result};
use crate::models::{
    ApiEnvelope, CreateMeetingRequest, LoginRequest, LoginResponse, MeetingData, MeetingRecord,
    MembershipData, RegisterRequest, StatusMessage, UserData, UserProfile, STATUS_SUCCESS,
};
use crate::services::ApiClient;

/// Remote calls the launcher depends on. `ApiClient` is the HTTP implementation;
/// tests substitute in-memory fakes.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Returns the bearer token.
    async fn login(&self, email: &str, password: &str) -> Result<String>;
    /// Returns the server's confirmation message.
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<String>;
    async fn current_user(&self, token: &str) -> Result<UserProfile>;
    /// `Ok(None)` when the domain has no organization membership.
    async fn company_membership(&self, domain: &str, token: &str) -> Result<Option<String>>;
    async fn fetch_meeting(&self, meeting_id: &str, token: &str) -> Result<MeetingRecord>;
    async fn create_meeting(
        &self,
        request: &CreateMeetingRequest<'_>,
        token: &str,
    ) -> Result<MeetingRecord>;
    async fn ping(&self) -> Result<Duration>;
}

fn open_envelope<T>(
    envelope: ApiEnvelope<T>,
    on_failure: impl FnOnce(String) -> LauncherError,
) -> Result<T> {
    if !envelope.is_success() {
        let reason = envelope
            .message
            .unwrap_or_else(|| format!("status '{}'", envelope.status));
        return Err(on_failure(reason));
    }
    envelope
        .data
        .ok_or_else(|| LauncherError::Parse("response is missing 'data'".to_string()))
}

#[async_trait]
impl RemoteApi for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<String> {
        let response: LoginResponse = match self
            .post("api/auth/login", LoginRequest { email, password }, None)
            .await
        {
            Ok(response) => response,
            Err(LauncherError::Http { status, body }) if status == 400 || status == 404 => {
                return Err(LauncherError::Auth(format!("login rejected ({status}): {body}")))
            }
            Err(err) => return Err(err),
        };

        if !response.status.eq_ignore_ascii_case(STATUS_SUCCESS) {
            return Err(LauncherError::Auth(
                response
                    .message
                    .unwrap_or_else(|| "invalid email or password".to_string()),
            ));
        }
        response
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| LauncherError::Auth("login returned no access token".to_string()))
    }

    async fn register(&self, name: &str, email: &str, password: &str) -> Result<String> {
        let response: StatusMessage = self
            .post(
                "api/auth/register",
                RegisterRequest {
                    name,
                    email,
                    password,
                    password_confirm: password,
                },
                None,
            )
            .await?;
        let message = response.message.unwrap_or_default();
        if !response.status.eq_ignore_ascii_case(STATUS_SUCCESS) {
            return Err(LauncherError::Auth(format!("registration failed: {message}")));
        }
        Ok(message)
    }

    async fn current_user(&self, token: &str) -> Result<UserProfile> {
        let envelope: ApiEnvelope<UserData> = self.get("api/users/me", Some(token)).await?;
        open_envelope(envelope, LauncherError::Auth).map(|data| data.user)
    }

    async fn company_membership(&self, domain: &str, token: &str) -> Result<Option<String>> {
        let path = format!(
            "api/companies/membership/{}",
            urlencoding::encode(domain)
        );
        match self.get::<ApiEnvelope<MembershipData>>(&path, Some(token)).await {
            Ok(envelope) if envelope.is_success() => {
                Ok(envelope.data.and_then(|data| data.membership))
            }
            Ok(_) => Ok(None),
            Err(LauncherError::Http { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn fetch_meeting(&self, meeting_id: &str, token: &str) -> Result<MeetingRecord> {
        let path = format!("api/meetings/{}", urlencoding::encode(meeting_id));
        let envelope: ApiEnvelope<MeetingData> = self.get(&path, Some(token)).await?;
        open_envelope(envelope, |reason| {
            LauncherError::NotFound(format!("meeting {meeting_id}: {reason}"))
        })
        .map(|data| data.meeting)
    }

    async fn create_meeting(
        &self,
        request: &CreateMeetingRequest<'_>,
        token: &str,
    ) -> Result<MeetingRecord> {
        let envelope: ApiEnvelope<MeetingData> =
            self.post("api/meetings", request, Some(token)).await?;
        open_envelope(envelope, |reason| {
            LauncherError::Auth(format!("meeting creation refused: {reason}"))
        })
        .map(|data| data.meeting)
    }

    async fn ping(&self) -> Result<Duration> {
        ApiClient::ping(self).await
    }
}
