use super::*;
use crate::{registry, voting, ApiContext};
use shared::error::ErrorCode;
use storage::Storage;

async fn ctx() -> ApiContext {
    ApiContext {
        storage: Storage::new("sqlite::memory:").await.expect("db"),
    }
}

async fn live_session(ctx: &ApiContext, viewer_key: &str) -> shared::protocol::SessionSummary {
    let created = create_session(ctx, viewer_key, false, None)
        .await
        .expect("create");
    activate(ctx, created.session_id).await.expect("activate")
}

async fn voter(
    ctx: &ApiContext,
    session_id: shared::domain::SessionId,
    viewer: &str,
) -> shared::protocol::ParticipantSummary {
    registry::check_in(ctx, session_id, viewer, viewer, None)
        .await
        .expect("check in")
}

#[tokio::test]
async fn new_session_is_pending_and_points_at_the_first_step() {
    let ctx = ctx().await;
    let created = create_session(&ctx, "friday", true, None)
        .await
        .expect("create");
    assert_eq!(created.status, SessionStatus::Pending);
    assert_eq!(created.current_step_id.as_deref(), Some("colour"));
    assert_eq!(created.step_index, 0);
    assert!(created.step_history.is_empty());
    assert!(created.allow_repeat_ips);
    assert_eq!(created.params["_signupsOpen"], serde_json::json!(true));
}

#[tokio::test]
async fn blank_viewer_key_gets_a_generated_one() {
    let ctx = ctx().await;
    let created = create_session(&ctx, "   ", false, None)
        .await
        .expect("create");
    assert!(!created.viewer_key.trim().is_empty());
}

#[tokio::test]
async fn viewer_key_hosts_repeat_sessions() {
    let ctx = ctx().await;
    let first = create_session(&ctx, "friday", false, None)
        .await
        .expect("first create");
    close(&ctx, first.session_id).await.expect("close first");

    let second = create_session(&ctx, "friday", false, None)
        .await
        .expect("second create under the same key");
    assert_ne!(first.session_id, second.session_id);
    assert_eq!(second.status, SessionStatus::Pending);

    // The older run stays ended, untouched by the new one.
    let old = get_session(&ctx, first.session_id).await.expect("reload first");
    assert_eq!(old.status, SessionStatus::Ended);
}

#[tokio::test]
async fn only_pending_sessions_activate() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    assert_eq!(session.status, SessionStatus::Live);

    let err = activate(&ctx, session.session_id)
        .await
        .expect_err("re-activate");
    assert!(matches!(err.code, ErrorCode::InvalidTransition));
}

#[tokio::test]
async fn advance_without_votes_fails_unless_forced() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;

    let err = advance_step(&ctx, session.session_id, false)
        .await
        .expect_err("no votes");
    assert!(matches!(err.code, ErrorCode::NoVotes));

    let outcome = advance_step(&ctx, session.session_id, true)
        .await
        .expect("forced");
    assert_eq!(outcome.closed.step_id, "colour");
    assert_eq!(outcome.closed.votes, 0);
    assert_eq!(outcome.next_step_id.as_deref(), Some("pattern"));
    assert!(!outcome.done);
}

#[tokio::test]
async fn advance_applies_the_winner_and_appends_history() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    let alice = voter(&ctx, session.session_id, "alice").await;
    let bob = voter(&ctx, session.session_id, "bob").await;

    voting::cast_vote(&ctx, session.session_id, "colour", alice.participant_id, "GINGER")
        .await
        .expect("alice vote");
    voting::cast_vote(&ctx, session.session_id, "colour", bob.participant_id, "GINGER")
        .await
        .expect("bob vote");

    let outcome = advance_step(&ctx, session.session_id, false)
        .await
        .expect("advance");
    assert_eq!(outcome.closed.option_key, "GINGER");
    assert_eq!(outcome.closed.label, "Ginger");
    assert_eq!(outcome.closed.votes, 2);

    let reloaded = get_session(&ctx, session.session_id).await.expect("reload");
    assert_eq!(reloaded.step_index, 1);
    assert_eq!(reloaded.current_step_id.as_deref(), Some("pattern"));
    assert_eq!(reloaded.params["colour"], serde_json::json!("GINGER"));

    let history = get_history(&ctx, session.session_id).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].option_key, "GINGER");
}

#[tokio::test]
async fn first_lock_closes_signups() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    voter(&ctx, session.session_id, "early-bird").await;

    advance_step(&ctx, session.session_id, true)
        .await
        .expect("advance");

    let err = registry::check_in(&ctx, session.session_id, "latecomer", "Late", None)
        .await
        .expect_err("signups should be closed");
    assert!(matches!(err.code, ErrorCode::SignupsClosed));
}

#[tokio::test]
async fn tie_breaks_towards_the_earlier_first_vote() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    let a = voter(&ctx, session.session_id, "a").await;
    let b = voter(&ctx, session.session_id, "b").await;
    let c = voter(&ctx, session.session_id, "c").await;
    let d = voter(&ctx, session.session_id, "d").await;

    for (who, option) in [
        (a, "GINGER"),
        (b, "BLACK"),
        (c, "BLACK"),
        (d, "GINGER"),
    ] {
        voting::cast_vote(&ctx, session.session_id, "colour", who.participant_id, option)
            .await
            .expect("vote");
    }

    let outcome = advance_step(&ctx, session.session_id, false)
        .await
        .expect("advance");
    assert_eq!(outcome.closed.option_key, "GINGER");
    assert_eq!(outcome.closed.votes, 2);
}

#[tokio::test]
async fn concurrent_advances_resolve_to_one_winner_and_one_stale_step() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    let alice = voter(&ctx, session.session_id, "alice").await;
    voting::cast_vote(&ctx, session.session_id, "colour", alice.participant_id, "GINGER")
        .await
        .expect("vote");

    let ctx_a = ctx.clone();
    let ctx_b = ctx.clone();
    let (left, right) = tokio::join!(
        async move { advance_step(&ctx_a, session.session_id, false).await },
        async move { advance_step(&ctx_b, session.session_id, false).await }
    );

    let wins = [&left, &right].iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one advance should land");
    // The loser either lost the conditional update (StaleStep) or read the
    // already-moved pointer and found the fresh step without votes.
    let loser = [left, right]
        .into_iter()
        .find_map(|r| r.err())
        .expect("one advance should fail");
    assert!(matches!(
        loser.code,
        ErrorCode::StaleStep | ErrorCode::NoVotes
    ));
}

#[tokio::test]
async fn advance_is_refused_outside_live() {
    let ctx = ctx().await;
    let created = create_session(&ctx, "s", false, None).await.expect("create");

    let err = advance_step(&ctx, created.session_id, true)
        .await
        .expect_err("pending advance");
    assert!(matches!(err.code, ErrorCode::InvalidTransition));

    close(&ctx, created.session_id).await.expect("close");
    let err = advance_step(&ctx, created.session_id, true)
        .await
        .expect_err("ended advance");
    assert!(matches!(err.code, ErrorCode::InvalidTransition));
}

#[tokio::test]
async fn close_is_idempotent_and_terminal() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;

    let closed = close(&ctx, session.session_id).await.expect("close");
    assert_eq!(closed.status, SessionStatus::Ended);
    let again = close(&ctx, session.session_id).await.expect("re-close");
    assert_eq!(again.status, SessionStatus::Ended);

    let err = activate(&ctx, session.session_id)
        .await
        .expect_err("activate after end");
    assert!(matches!(err.code, ErrorCode::InvalidTransition));
}

#[tokio::test]
async fn current_step_exposes_computed_options() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;

    let prompt = current_step(&ctx, session.session_id).await.expect("step");
    assert_eq!(prompt.step_id, "colour");
    assert!(prompt.options.iter().any(|o| o.key == "GINGER"));

    close(&ctx, session.session_id).await.expect("close");
    let err = current_step(&ctx, session.session_id)
        .await
        .expect_err("no step once ended");
    assert!(matches!(err.code, ErrorCode::NotFound));
}

#[tokio::test]
async fn full_playthrough_ends_the_session_and_history_replays() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;

    let mut guard = 0;
    loop {
        let outcome = advance_step(&ctx, session.session_id, true)
            .await
            .expect("advance");
        if outcome.done {
            break;
        }
        guard += 1;
        assert!(guard < 100, "catalogue should be finite");
    }

    let finished = get_session(&ctx, session.session_id).await.expect("reload");
    assert_eq!(finished.status, SessionStatus::Ended);
    assert!(finished.current_step_id.is_none());

    // Replaying the history over default params rebuilds the stored build.
    let history = get_history(&ctx, session.session_id).await.expect("history");
    assert_eq!(history.len() as i64, finished.step_index);
    let mut replayed = BuildParams::default();
    for entry in &history {
        let steps = catalogue(&replayed);
        let step = step_by_id(&steps, &entry.step_id).expect("replay step");
        step.apply(&entry.option_key, &mut replayed).expect("replay apply");
    }
    replayed.signups_open = false;
    replayed.votes_open = false;

    let stored: BuildParams = serde_json::from_value(finished.params).expect("stored params");
    assert_eq!(replayed, stored);
}
