use tracing::info;
use uuid::Uuid;

use shared::{
    domain::{HistoryEntry, SessionId, SessionStatus},
    error::ApiError,
    protocol::{AdvanceOutcome, SessionSummary, StepOptionView, StepPrompt},
};
use steps::{catalogue, next_unlocked, step_by_id, BuildParams, StepError};

use crate::{internal, parse_params, session_summary, ApiContext};

pub async fn create_session(
    ctx: &ApiContext,
    viewer_key: &str,
    allow_repeat_ips: bool,
    initial_params: Option<BuildParams>,
) -> Result<SessionSummary, ApiError> {
    let trimmed = viewer_key.trim();
    let viewer_key = if trimmed.is_empty() {
        Uuid::new_v4().simple().to_string()
    } else {
        trimmed.to_string()
    };

    let mut params = initial_params.unwrap_or_default();
    params.sync_derived_state();
    let steps = catalogue(&params);
    let first_step_id = steps.first().map(|step| step.id.as_str());

    let params_value = serde_json::to_value(&params)
        .map_err(|err| internal(anyhow::anyhow!("serialize params: {err}")))?;
    let record = ctx
        .storage
        .create_session(&viewer_key, allow_repeat_ips, &params_value, first_step_id)
        .await
        .map_err(internal)?;

    info!(session_id = record.id.0, viewer_key = %record.viewer_key, "session created");
    Ok(session_summary(record))
}

pub async fn get_session(
    ctx: &ApiContext,
    session_id: SessionId,
) -> Result<SessionSummary, ApiError> {
    let record = ctx
        .storage
        .get_session(session_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("session"))?;
    Ok(session_summary(record))
}

pub async fn activate(ctx: &ApiContext, session_id: SessionId) -> Result<SessionSummary, ApiError> {
    let record = ctx
        .storage
        .get_session(session_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("session"))?;

    let first_step_id = match record.current_step_id.as_deref() {
        Some(step_id) => step_id.to_string(),
        None => {
            let params = parse_params(&record)?;
            catalogue(&params)
                .first()
                .map(|step| step.id.clone())
                .ok_or_else(|| internal(anyhow::anyhow!("empty step catalogue")))?
        }
    };

    let activated = ctx
        .storage
        .activate_session(session_id, &first_step_id)
        .await
        .map_err(internal)?;
    if !activated {
        return Err(ApiError::invalid_transition(
            "Only a pending session can go live.",
        ));
    }

    info!(session_id = session_id.0, first_step = %first_step_id, "session live");
    get_session(ctx, session_id).await
}

/// Ends the session regardless of progress. Idempotent: closing an already
/// ended session just returns its summary.
pub async fn close(ctx: &ApiContext, session_id: SessionId) -> Result<SessionSummary, ApiError> {
    let record = ctx
        .storage
        .get_session(session_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("session"))?;

    let closed = ctx
        .storage
        .close_session(record.id)
        .await
        .map_err(internal)?;
    if closed {
        info!(session_id = session_id.0, "session ended");
    }
    get_session(ctx, session_id).await
}

/// The current decision point with its computed options, as shown to viewers.
pub async fn current_step(
    ctx: &ApiContext,
    session_id: SessionId,
) -> Result<StepPrompt, ApiError> {
    let record = ctx
        .storage
        .get_session(session_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("session"))?;
    let step_id = record
        .current_step_id
        .clone()
        .ok_or_else(|| ApiError::not_found("current step"))?;

    let params = parse_params(&record)?;
    let steps = catalogue(&params);
    let step = step_by_id(&steps, &step_id)
        .ok_or_else(|| internal(anyhow::anyhow!("session points at unknown step '{step_id}'")))?;

    Ok(StepPrompt {
        step_id: step.id.clone(),
        title: step.title.clone(),
        description: step.description.clone(),
        options: step
            .options(&params)
            .into_iter()
            .map(|option| StepOptionView {
                key: option.key,
                label: option.label,
            })
            .collect(),
    })
}

pub async fn get_history(
    ctx: &ApiContext,
    session_id: SessionId,
) -> Result<Vec<HistoryEntry>, ApiError> {
    let record = ctx
        .storage
        .get_session(session_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("session"))?;
    Ok(record.step_history)
}

/// Locks the current step and moves the session on. One read-validate-write
/// cycle: the winner is applied to the params, the outcome appended to the
/// history, and the pointer update is conditioned on the step the caller saw.
/// With `force_default` a voteless step locks its first option instead of
/// failing `NoVotes`.
pub async fn advance_step(
    ctx: &ApiContext,
    session_id: SessionId,
    force_default: bool,
) -> Result<AdvanceOutcome, ApiError> {
    let record = ctx
        .storage
        .get_session(session_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("session"))?;
    if record.status != SessionStatus::Live {
        return Err(ApiError::invalid_transition(
            "Only a live session can advance.",
        ));
    }
    let step_id = record
        .current_step_id
        .clone()
        .ok_or_else(|| ApiError::invalid_transition("Session has no step to lock."))?;

    let mut params = parse_params(&record)?;
    let steps = catalogue(&params);
    let step = step_by_id(&steps, &step_id)
        .ok_or_else(|| internal(anyhow::anyhow!("session points at unknown step '{step_id}'")))?
        .clone();

    let (winning_key, winning_votes) =
        match ctx.storage.winner(session_id, &step_id).await.map_err(internal)? {
            Some(row) => (row.option_key, row.votes),
            None if force_default => {
                let first = step
                    .options(&params)
                    .into_iter()
                    .next()
                    .ok_or_else(|| internal(anyhow::anyhow!("step '{step_id}' has no options")))?;
                (first.key, 0)
            }
            None => return Err(ApiError::no_votes()),
        };

    let applied = step
        .apply(&winning_key, &mut params)
        .map_err(|err| match err {
            StepError::UnknownOption { .. } => ApiError::unknown_option(),
            StepError::UnknownStep(_) => internal(anyhow::anyhow!("{err}")),
        })?;

    let mut history = record.step_history.clone();
    history.push(HistoryEntry {
        step_id: step.id.clone(),
        title: step.title.clone(),
        option_key: applied.key.clone(),
        label: applied.label.clone(),
        votes: winning_votes,
    });

    // Sign-ups stay open only until the first step locks.
    params.signups_open = false;

    let rebuilt = catalogue(&params);
    let locked_ids: Vec<String> = history.iter().map(|entry| entry.step_id.clone()).collect();
    let next = next_unlocked(&rebuilt, &locked_ids).map(|step| step.id.clone());
    let done = next.is_none();
    params.votes_open = !done;

    let params_value = serde_json::to_value(&params)
        .map_err(|err| internal(anyhow::anyhow!("serialize params: {err}")))?;
    let moved = ctx
        .storage
        .advance_session(
            session_id,
            &step_id,
            next.as_deref(),
            record.step_index + 1,
            &history,
            &params_value,
            done,
        )
        .await
        .map_err(internal)?;
    if !moved {
        return Err(ApiError::stale_step());
    }

    info!(
        session_id = session_id.0,
        step = %step.id,
        winner = %applied.key,
        votes = winning_votes,
        done,
        "step locked"
    );

    let closed = history
        .last()
        .cloned()
        .ok_or_else(|| internal(anyhow::anyhow!("history cannot be empty after a lock")))?;
    Ok(AdvanceOutcome {
        closed,
        next_step_id: next,
        done,
    })
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
