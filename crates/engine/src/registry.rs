use tracing::info;

use shared::{
    domain::{ParticipantId, ParticipantRecord, ParticipantStatus, SessionId, SessionStatus},
    error::ApiError,
    protocol::ParticipantSummary,
};

use crate::{derive_fingerprint, internal, parse_params, ApiContext};

const DISPLAY_NAME_MAX: usize = 40;

pub(crate) fn participant_summary(record: ParticipantRecord) -> ParticipantSummary {
    ParticipantSummary {
        participant_id: record.id,
        session_id: record.session_id,
        display_name: record.display_name,
        status: record.status,
        checked_in_at: record.created_at,
    }
}

fn sanitize_display_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(DISPLAY_NAME_MAX).collect())
}

/// Admits a viewer into a live session. Checks run in a fixed order so the
/// viewer always sees the most actionable refusal; the insert itself is one
/// guarded statement, so a racing close or duplicate still maps to a typed
/// error rather than a partial write.
pub async fn check_in(
    ctx: &ApiContext,
    session_id: SessionId,
    viewer_session: &str,
    display_name: &str,
    fingerprint: Option<&str>,
) -> Result<ParticipantSummary, ApiError> {
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

    let params = parse_params(&session)?;
    if !params.signups_open {
        return Err(ApiError::signups_closed());
    }

    let viewer_session = viewer_session.trim();
    if ctx
        .storage
        .find_participant(session_id, viewer_session)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(ApiError::already_checked_in());
    }

    let display_name =
        sanitize_display_name(display_name).ok_or_else(ApiError::display_name_required)?;
    let fingerprint = derive_fingerprint(viewer_session, fingerprint);

    let outcome = ctx
        .storage
        .insert_participant(session_id, viewer_session, &display_name, &fingerprint)
        .await
        .map_err(internal)?;
    let record = match outcome {
        storage::ParticipantInsert::Inserted(record) => record,
        storage::ParticipantInsert::SessionNotLive => return Err(ApiError::session_not_live()),
        storage::ParticipantInsert::AlreadyCheckedIn => return Err(ApiError::already_checked_in()),
    };

    info!(
        session_id = session_id.0,
        participant_id = record.id.0,
        display_name = %record.display_name,
        "viewer checked in"
    );
    Ok(participant_summary(record))
}

/// Updates a participant's mutable fields. The session binding and viewer
/// session are never caller-writable; a bad display name falls back to the
/// stored one (then "Viewer"), a bad status to the stored status.
pub async fn update_participant(
    ctx: &ApiContext,
    participant_id: ParticipantId,
    display_name: Option<&str>,
    status: Option<&str>,
) -> Result<ParticipantSummary, ApiError> {
    let existing = ctx
        .storage
        .get_participant(participant_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("participant"))?;

    let next_name = match display_name {
        Some(raw) => sanitize_display_name(raw)
            .or_else(|| sanitize_display_name(&existing.display_name))
            .unwrap_or_else(|| "Viewer".to_string()),
        None => existing.display_name.clone(),
    };
    let next_status = status
        .and_then(ParticipantStatus::parse)
        .unwrap_or(existing.status);

    let record = ctx
        .storage
        .update_participant(participant_id, Some(&next_name), Some(next_status))
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("participant"))?;

    if record.status != existing.status {
        info!(
            participant_id = record.id.0,
            status = record.status.as_str(),
            "participant status changed"
        );
    }
    Ok(participant_summary(record))
}

pub async fn list_participants(
    ctx: &ApiContext,
    session_id: SessionId,
) -> Result<Vec<ParticipantSummary>, ApiError> {
    ctx.storage
        .get_session(session_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("session"))?;
    let records = ctx
        .storage
        .list_participants(session_id)
        .await
        .map_err(internal)?;
    Ok(records.into_iter().map(participant_summary).collect())
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
