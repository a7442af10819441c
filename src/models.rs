use serde::{Deserialize, Serialize};

pub const STATUS_SUCCESS: &str = "success";

/// `{status, data}` wrapper used by every authenticated endpoint.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiEnvelope<T> {
    pub status: String,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_SUCCESS)
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LoginResponse {
    pub status: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub password_confirm: &'a str,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StatusMessage {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub membership: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserData {
    pub user: UserProfile,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MembershipData {
    #[serde(default)]
    pub membership: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
pub struct CreateMeetingRequest<'a> {
    pub title: &'a str,
    pub password: &'a str,
    pub presentation: &'a str,
}

/// Owner as returned by the meetings API: either an id or an embedded profile.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum MeetingOwner {
    Id(String),
    Profile {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        email: Option<String>,
    },
}

impl MeetingOwner {
    pub fn display(&self) -> Option<&str> {
        match self {
            MeetingOwner::Id(id) => Some(id.as_str()),
            MeetingOwner::Profile { name, email } => name.as_deref().or(email.as_deref()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MeetingRecord {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub user: Option<MeetingOwner>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MeetingData {
    pub meeting: MeetingRecord,
}

/// Human-readable result of resolving a meeting handle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MeetingDescriptor {
    pub id: String,
    pub title: String,
    pub password: Option<String>,
    pub owner: Option<String>,
}

impl MeetingDescriptor {
    pub fn from_record(fallback_id: &str, record: MeetingRecord) -> Self {
        Self {
            id: record.id.unwrap_or_else(|| fallback_id.to_string()),
            title: record.title,
            password: record.password,
            owner: record
                .user
                .as_ref()
                .and_then(MeetingOwner::display)
                .map(str::to_string),
        }
    }
}
