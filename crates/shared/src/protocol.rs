use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    HistoryEntry, ParticipantId, ParticipantStatus, SessionId, SessionStatus, VoteId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub viewer_key: String,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<String>,
    pub step_index: i64,
    pub step_history: Vec<HistoryEntry>,
    pub params: serde_json::Value,
    pub allow_repeat_ips: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub participant_id: ParticipantId,
    pub session_id: SessionId,
    pub display_name: String,
    pub status: ParticipantStatus,
    pub checked_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteSummary {
    pub vote_id: VoteId,
    pub session_id: SessionId,
    pub step_id: String,
    pub option_key: String,
    pub voted_by: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_name: Option<String>,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOptionView {
    pub key: String,
    pub label: String,
}

/// The current decision point, as shown to viewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepPrompt {
    pub step_id: String,
    pub title: String,
    pub description: String,
    pub options: Vec<StepOptionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyEntry {
    pub option_key: String,
    pub votes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    pub closed: HistoryEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_id: Option<String>,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    SessionActivated {
        session_id: SessionId,
    },
    ParticipantJoined {
        session_id: SessionId,
        participant: ParticipantSummary,
    },
    VoteRecorded {
        session_id: SessionId,
        step_id: String,
        option_key: String,
    },
    StepAdvanced {
        session_id: SessionId,
        outcome: AdvanceOutcome,
    },
    SessionEnded {
        session_id: SessionId,
    },
}
