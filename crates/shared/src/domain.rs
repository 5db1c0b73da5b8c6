use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(SessionId);
id_newtype!(ParticipantId);
id_newtype!(VoteId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Live,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Live => "live",
            SessionStatus::Ended => "ended",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(SessionStatus::Pending),
            "live" => Some(SessionStatus::Live),
            "ended" => Some(SessionStatus::Ended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Active,
    Pending,
    Kicked,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Active => "active",
            ParticipantStatus::Pending => "pending",
            ParticipantStatus::Kicked => "kicked",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(ParticipantStatus::Active),
            "pending" => Some(ParticipantStatus::Pending),
            "kicked" => Some(ParticipantStatus::Kicked),
            _ => None,
        }
    }
}

/// One resolved step outcome. Immutable once appended to a session's history;
/// replaying the sequence over default params reconstructs the final build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step_id: String,
    pub title: String,
    pub option_key: String,
    pub label: String,
    pub votes: i64,
}

/// Denormalized participant snapshot stored on each vote so overlays can
/// render voter names without a join.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub viewer_key: String,
    pub status: SessionStatus,
    pub current_step_id: Option<String>,
    pub step_index: i64,
    pub step_history: Vec<HistoryEntry>,
    pub params: serde_json::Value,
    pub allow_repeat_ips: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub id: ParticipantId,
    pub session_id: SessionId,
    pub viewer_session: String,
    pub display_name: String,
    pub status: ParticipantStatus,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub id: VoteId,
    pub session_id: SessionId,
    pub step_id: String,
    pub option_key: String,
    pub option_meta: VoteMeta,
    pub voted_by: ParticipantId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
