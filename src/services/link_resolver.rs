use std::sync::Arc;

use serde::Serialize;

use crate::config::LauncherConfig;
use crate::errors::{LauncherError, Result};
use crate::models::MeetingDescriptor;
use crate::services::remote_api::RemoteApi;
use crate::services::session_manager::Session;

/// A meeting id lifted out of a well-formed deep link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MeetingHandle {
    pub id: String,
    /// Canonical scheme form of the link, passed on to the companion.
    pub link: String,
    /// `pwd` query value, if the link carried one.
    pub password: Option<String>,
}

#[derive(Clone)]
pub struct LinkResolver {
    scheme_prefix: String,
    web_link_prefix: String,
    min_link_len: usize,
    meeting_id_len: usize,
    api: Arc<dyn RemoteApi>,
}

impl LinkResolver {
    pub fn new(config: &LauncherConfig, api: Arc<dyn RemoteApi>) -> Self {
        Self {
            scheme_prefix: config.scheme_prefix.clone(),
            web_link_prefix: config.web_link_prefix.clone(),
            min_link_len: config.min_link_len,
            meeting_id_len: config.meeting_id_len,
            api,
        }
    }

    /// Web-hosted links are rewritten to the scheme form before any checks run.
    pub fn canonicalize(&self, candidate: &str) -> String {
        let trimmed = candidate.trim();
        match trimmed.strip_prefix(self.web_link_prefix.as_str()) {
            Some(rest) if !self.web_link_prefix.is_empty() => {
                format!("{}{}", self.scheme_prefix, rest)
            }
            _ => trimmed.to_string(),
        }
    }

    pub fn try_parse(&self, candidate: &str) -> Result<MeetingHandle> {
        let link = self.canonicalize(candidate);
        if link.len() < self.min_link_len {
            return Err(not_a_link(&link, "too short"));
        }
        if link.get(..self.scheme_prefix.len()) != Some(self.scheme_prefix.as_str()) {
            return Err(not_a_link(&link, "unknown prefix"));
        }

        let start = self.scheme_prefix.len();
        let id = link
            .get(start..start + self.meeting_id_len)
            .ok_or_else(|| not_a_link(&link, "meeting id cut short"))?;
        if !id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        {
            return Err(not_a_link(&link, "meeting id has invalid characters"));
        }

        let rest = &link[start + self.meeting_id_len..];
        let password = query_value(rest, "pwd");

        Ok(MeetingHandle {
            id: id.to_string(),
            password,
            link,
        })
    }

    /// Looks the meeting up with the session's token. Every failure comes back as
    /// `InvalidLink` so the caller can mark the link unusable.
    pub async fn resolve(
        &self,
        handle: &MeetingHandle,
        session: &Session,
    ) -> Result<MeetingDescriptor> {
        let record = self
            .api
            .fetch_meeting(&handle.id, session.token())
            .await
            .map_err(|err| {
                tracing::warn!("meeting {} did not resolve: {}", handle.id, err);
                LauncherError::InvalidLink(format!("meeting {} unavailable: {err}", handle.id))
            })?;

        let mut descriptor = MeetingDescriptor::from_record(&handle.id, record);
        if descriptor.password.is_none() {
            descriptor.password = handle.password.clone();
        }
        tracing::info!("meeting {} resolved to '{}'", handle.id, descriptor.title);
        Ok(descriptor)
    }

    /// Scheme link for a meeting created from this launcher.
    pub fn link_for(&self, meeting_id: &str, password: &str) -> String {
        format!(
            "{}{}?pwd={}",
            self.scheme_prefix,
            meeting_id,
            urlencoding::encode(password)
        )
    }
}

fn not_a_link(link: &str, reason: &str) -> LauncherError {
    LauncherError::Parse(format!("not a meeting link ({reason}): '{link}'"))
}

fn query_value(rest: &str, key: &str) -> Option<String> {
    let query = rest.split_once('?').map(|(_, query)| query)?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == key)
        .map(|(_, value)| {
            urlencoding::decode(value.trim_end_matches('/'))
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::remote_api::tests::FakeApi;

    const ID: &str = "3f2b8c1e-9d4a-4b7e-8f61-0c5d2a7e9b13";

    fn resolver(api: Arc<FakeApi>) -> LinkResolver {
        LinkResolver::new(&LauncherConfig::default(), api)
    }

    fn session() -> Session {
        Session::new("token-1".to_string()).expect("token")
    }

    #[test]
    fn parses_scheme_link() {
        let resolver = resolver(Arc::new(FakeApi::default()));
        let link = format!("ceremeet://ceremeet.io/{ID}?pwd=s3cret");
        assert!(link.len() >= 60);
        let handle = resolver.try_parse(&link).expect("valid link");
        assert_eq!(handle.id, ID);
        assert_eq!(handle.password.as_deref(), Some("s3cret"));
        assert_eq!(handle.link, link);
    }

    #[test]
    fn rewrites_web_link_before_validation() {
        let resolver = resolver(Arc::new(FakeApi::default()));
        let handle = resolver
            .try_parse(&format!("  https://ceremeet.io/join/{ID}?pwd=a%20b "))
            .expect("web link");
        assert_eq!(handle.id, ID);
        assert_eq!(handle.link, format!("ceremeet://ceremeet.io/{ID}?pwd=a%20b"));
        assert_eq!(handle.password.as_deref(), Some("a b"));
    }

    #[test]
    fn rejects_short_links() {
        let resolver = resolver(Arc::new(FakeApi::default()));
        let short = format!("ceremeet://ceremeet.io/{ID}");
        assert!(short.len() < 60);
        assert!(matches!(resolver.try_parse(&short), Err(LauncherError::Parse(_))));
        assert!(resolver.try_parse("").is_err());
    }

    #[test]
    fn rejects_wrong_prefix() {
        let resolver = resolver(Arc::new(FakeApi::default()));
        let link = format!("zoommeet://ceremeet.io/{ID}?pwd=s3cret");
        assert!(link.len() >= 60);
        assert!(matches!(resolver.try_parse(&link), Err(LauncherError::Parse(_))));
    }

    #[test]
    fn rejects_non_ascii_without_panicking() {
        let resolver = resolver(Arc::new(FakeApi::default()));
        let link = "ceremeet://ceremeet.io/ğğğğğğğğğğğğğğğğğğğğğğğğğğğğğğğğğğğğ?pwd=x".to_string();
        assert!(resolver.try_parse(&link).is_err());
    }

    #[tokio::test]
    async fn resolves_known_meeting() {
        let api = Arc::new(FakeApi::default().with_meeting(ID, "Design review"));
        let resolver = resolver(api);
        let handle = resolver
            .try_parse(&format!("ceremeet://ceremeet.io/{ID}?pwd=s3cret"))
            .expect("parse");
        let descriptor = resolver.resolve(&handle, &session()).await.expect("resolve");
        assert_eq!(descriptor.title, "Design review");
        assert_eq!(descriptor.password.as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn unknown_meeting_is_invalid() {
        let resolver = resolver(Arc::new(FakeApi::default()));
        let handle = resolver
            .try_parse(&format!("ceremeet://ceremeet.io/{ID}?pwd=s3cret"))
            .expect("parse");
        assert!(matches!(
            resolver.resolve(&handle, &session()).await,
            Err(LauncherError::InvalidLink(_))
        ));
    }

    #[test]
    fn builds_links_that_parse_back() {
        let resolver = resolver(Arc::new(FakeApi::default()));
        let link = resolver.link_for(ID, "pa ss");
        let handle = resolver.try_parse(&link).expect("parse");
        assert_eq!(handle.password.as_deref(), Some("pa ss"));
    }

    #[tokio::test]
    async fn failed_lookup_over_http_is_invalid_link() {
        use crate::services::api_client::tests::{client_for, serve, StubReply};

        let route = format!("GET /api/meetings/{ID}");
        let base = serve(vec![(
            route.as_str(),
            StubReply::json(200, r#"{"status":"fail","message":"No meeting found with that ID"}"#),
        )])
        .await;
        let resolver = LinkResolver::new(&LauncherConfig::default(), Arc::new(client_for(&base)));
        let handle = resolver
            .try_parse(&format!("ceremeet://ceremeet.io/{ID}?pwd=x"))
            .expect("valid link");

        let err = resolver.resolve(&handle, &session()).await.expect_err("unknown");
        assert!(matches!(err, LauncherError::InvalidLink(_)));
    }
}

