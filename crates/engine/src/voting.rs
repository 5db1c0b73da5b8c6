use tracing::info;

use shared::{
    domain::{ParticipantId, ParticipantStatus, SessionId, SessionStatus, VoteMeta, VoteRecord},
    error::ApiError,
    protocol::{TallyEntry, VoteSummary},
};
use steps::{catalogue, step_by_id};

use crate::{internal, parse_params, ApiContext};

fn vote_summary(record: VoteRecord) -> VoteSummary {
    VoteSummary {
        vote_id: record.id,
        session_id: record.session_id,
        step_id: record.step_id,
        option_key: record.option_key,
        voted_by: record.voted_by,
        participant_name: record.option_meta.participant_name,
        cast_at: record.created_at,
    }
}

/// Records one participant's vote on the current step. Checks run in a fixed
/// order so a kicked viewer is told so, not just refused; the insert is one
/// guarded statement, so racing closes and duplicate casts resolve to typed
/// errors.
pub async fn cast_vote(
    ctx: &ApiContext,
    session_id: SessionId,
    step_id: &str,
    participant_id: ParticipantId,
    option_key: &str,
) -> Result<VoteSummary, ApiError> {
    let session = ctx
        .storage
        .get_session(session_id)
        .await
        .map_err(internal)?;
    let Some(session) = session else {
        return Err(ApiError::session_not_live());
    };
    if session.status != SessionStatus::Live {
        return Err(ApiError::session_not_live());
    }

    match session.current_step_id.as_deref() {
        Some(current) if current == step_id => {}
        _ => return Err(ApiError::step_moved()),
    }

    let participant = ctx
        .storage
        .get_participant(participant_id)
        .await
        .map_err(internal)?;
    let Some(participant) = participant else {
        return Err(ApiError::participant_mismatch());
    };
    if participant.session_id != session_id {
        return Err(ApiError::participant_mismatch());
    }
    match participant.status {
        ParticipantStatus::Active => {}
        ParticipantStatus::Kicked => return Err(ApiError::kicked()),
        ParticipantStatus::Pending => return Err(ApiError::not_allowed_to_vote()),
    }

    // The option must still be derivable from the session's current params.
    let params = parse_params(&session)?;
    let steps = catalogue(&params);
    let step = step_by_id(&steps, step_id).ok_or_else(ApiError::step_moved)?;
    if !step.options(&params).iter().any(|o| o.key == option_key) {
        return Err(ApiError::unknown_option());
    }

    let meta = VoteMeta {
        participant_id: Some(participant.id),
        participant_name: Some(participant.display_name.clone()),
    };
    let outcome = ctx
        .storage
        .insert_vote(session_id, step_id, option_key, &meta, participant_id)
        .await
        .map_err(internal)?;
    let record = match outcome {
        storage::VoteInsert::Inserted(record) => record,
        storage::VoteInsert::SessionNotLive => return Err(ApiError::session_not_live()),
        storage::VoteInsert::StepMoved => return Err(ApiError::step_moved()),
        storage::VoteInsert::DuplicateVote => return Err(ApiError::duplicate_vote()),
    };

    info!(
        session_id = session_id.0,
        step = step_id,
        participant_id = participant_id.0,
        option = option_key,
        "vote recorded"
    );
    Ok(vote_summary(record))
}

/// Vote counts for a step, leaders first. Defaults to the current step when
/// no step is named.
pub async fn tally(
    ctx: &ApiContext,
    session_id: SessionId,
    step_id: Option<&str>,
) -> Result<Vec<TallyEntry>, ApiError> {
    let session = ctx
        .storage
        .get_session(session_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("session"))?;
    let step_id = match step_id {
        Some(step_id) => step_id.to_string(),
        None => session
            .current_step_id
            .ok_or_else(|| ApiError::not_found("current step"))?,
    };

    let rows = ctx
        .storage
        .tally(session_id, &step_id)
        .await
        .map_err(internal)?;
    Ok(rows
        .into_iter()
        .map(|row| TallyEntry {
            option_key: row.option_key,
            votes: row.votes,
        })
        .collect())
}

pub async fn list_votes(
    ctx: &ApiContext,
    session_id: SessionId,
    step_id: &str,
) -> Result<Vec<VoteSummary>, ApiError> {
    let records = ctx
        .storage
        .list_votes(session_id, step_id)
        .await
        .map_err(internal)?;
    Ok(records.into_iter().map(vote_summary).collect())
}

#[cfg(test)]
#[path = "tests/voting_tests.rs"]
mod tests;
