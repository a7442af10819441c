use std::sync::Arc;

use serde::Serialize;

use crate::errors::{LauncherError, Result};
use crate::models::{CreateMeetingRequest, MeetingDescriptor};
use crate::services::link_resolver::LinkResolver;
use crate::services::remote_api::RemoteApi;
use crate::services::session_manager::Session;

#[derive(Clone, Debug, Serialize)]
pub struct CreatedMeeting {
    pub descriptor: MeetingDescriptor,
    /// Scheme link others can open to join.
    pub link: String,
}

#[derive(Clone)]
pub struct MeetingService {
    api: Arc<dyn RemoteApi>,
    links: LinkResolver,
}

impl MeetingService {
    pub fn new(api: Arc<dyn RemoteApi>, links: LinkResolver) -> Self {
        Self { api, links }
    }

    pub async fn create(
        &self,
        title: &str,
        password: &str,
        presentation: &str,
        session: &Session,
    ) -> Result<CreatedMeeting> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LauncherError::Parse("meeting title is required".to_string()));
        }

        let request = CreateMeetingRequest {
            title,
            password,
            presentation,
        };
        let record = self.api.create_meeting(&request, session.token()).await?;
        let id = record.id.clone().ok_or_else(|| {
            LauncherError::Parse("created meeting came back without an id".to_string())
        })?;

        let mut descriptor = MeetingDescriptor::from_record(&id, record);
        if descriptor.password.is_none() && !password.is_empty() {
            descriptor.password = Some(password.to_string());
        }
        let link = self
            .links
            .link_for(&descriptor.id, descriptor.password.as_deref().unwrap_or_default());
        tracing::info!("created meeting {} '{}'", descriptor.id, descriptor.title);
        Ok(CreatedMeeting { descriptor, link })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LauncherConfig;
    use crate::services::remote_api::tests::FakeApi;

    fn service(api: Arc<FakeApi>) -> MeetingService {
        let links = LinkResolver::new(&LauncherConfig::default(), api.clone());
        MeetingService::new(api, links)
    }

    #[tokio::test]
    async fn created_meeting_link_resolves_back() {
        let api = Arc::new(FakeApi::default());
        let meetings = service(api.clone());
        let session = Session::new("token-ada@corp.io".to_string()).expect("token");

        let created = meetings
            .create("Planning", "hunter2", "deck.pdf", &session)
            .await
            .expect("create");
        assert_eq!(created.descriptor.title, "Planning");
        assert!(created.link.starts_with("ceremeet://ceremeet.io/"));

        let links = LinkResolver::new(&LauncherConfig::default(), api);
        let handle = links.try_parse(&created.link).expect("parse");
        assert_eq!(handle.id, created.descriptor.id);
        let resolved = links.resolve(&handle, &session).await.expect("resolve");
        assert_eq!(resolved.title, "Planning");
        assert_eq!(resolved.password.as_deref(), Some("hunter2"));
    }

    #[tokio::test]
    async fn empty_title_is_rejected_before_calling_out() {
        let meetings = service(Arc::new(FakeApi::default()));
        let session = Session::new("token-ada@corp.io".to_string()).expect("token");
        assert!(matches!(
            meetings.create("  ", "pw", "", &session).await,
            Err(LauncherError::Parse(_))
        ));
    }
}
