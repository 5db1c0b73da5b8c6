use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Admission errors: user-correctable, surfaced verbatim.
    SessionNotLive,
    SignupsClosed,
    AlreadyCheckedIn,
    DisplayNameRequired,
    // Voting errors.
    StepMoved,
    ParticipantMismatch,
    Kicked,
    NotAllowedToVote,
    DuplicateVote,
    // Lifecycle errors: caller raced the session pointer; re-read and retry.
    InvalidTransition,
    StaleStep,
    NoVotes,
    // Step engine.
    UnknownOption,
    // Infrastructure.
    NotFound,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn session_not_live() -> Self {
        Self::new(ErrorCode::SessionNotLive, "Voting is not open for this session.")
    }

    pub fn signups_closed() -> Self {
        Self::new(ErrorCode::SignupsClosed, "Sign ups are disabled right now.")
    }

    pub fn already_checked_in() -> Self {
        Self::new(ErrorCode::AlreadyCheckedIn, "This viewer is already checked in.")
    }

    pub fn display_name_required() -> Self {
        Self::new(ErrorCode::DisplayNameRequired, "Display name is required.")
    }

    pub fn step_moved() -> Self {
        Self::new(ErrorCode::StepMoved, "Voting has moved to a different step.")
    }

    pub fn participant_mismatch() -> Self {
        Self::new(
            ErrorCode::ParticipantMismatch,
            "Participant does not belong to this session.",
        )
    }

    pub fn kicked() -> Self {
        Self::new(ErrorCode::Kicked, "You have been removed from this stream.")
    }

    pub fn not_allowed_to_vote() -> Self {
        Self::new(ErrorCode::NotAllowedToVote, "You are not allowed to vote right now.")
    }

    pub fn duplicate_vote() -> Self {
        Self::new(ErrorCode::DuplicateVote, "You already voted in this round.")
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidTransition, message)
    }

    pub fn stale_step() -> Self {
        Self::new(
            ErrorCode::StaleStep,
            "Another update already advanced this step.",
        )
    }

    pub fn no_votes() -> Self {
        Self::new(ErrorCode::NoVotes, "No votes have been cast for this step.")
    }

    pub fn unknown_option() -> Self {
        Self::new(
            ErrorCode::UnknownOption,
            "That option is not available for this step.",
        )
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{what} not found"))
    }
}
