//! End-to-end session flow: create, go live, admit viewers, vote, lock steps,
//! and finish with a replayable history.

use engine::{registry, session, voting, ApiContext};
use shared::{domain::SessionStatus, error::ErrorCode};
use storage::Storage;

async fn ctx() -> ApiContext {
    ApiContext {
        storage: Storage::new("sqlite::memory:").await.expect("db"),
    }
}

#[tokio::test]
async fn a_session_runs_from_checkin_to_finished_build() {
    let ctx = ctx().await;

    let created = session::create_session(&ctx, "friday-stream", false, None)
        .await
        .expect("create");
    assert_eq!(created.status, SessionStatus::Pending);

    // Viewers cannot join before the session goes live.
    let err = registry::check_in(&ctx, created.session_id, "alice", "Alice", None)
        .await
        .expect_err("early check in");
    assert!(matches!(err.code, ErrorCode::SessionNotLive));

    let live = session::activate(&ctx, created.session_id)
        .await
        .expect("activate");
    assert_eq!(live.current_step_id.as_deref(), Some("colour"));

    let alice = registry::check_in(&ctx, live.session_id, "alice", "Alice", None)
        .await
        .expect("alice");
    let bob = registry::check_in(&ctx, live.session_id, "bob", "Bob", None)
        .await
        .expect("bob");
    let carol = registry::check_in(&ctx, live.session_id, "carol", "Carol", None)
        .await
        .expect("carol");

    // First round: 2-1 for GINGER.
    voting::cast_vote(&ctx, live.session_id, "colour", alice.participant_id, "GINGER")
        .await
        .expect("alice vote");
    voting::cast_vote(&ctx, live.session_id, "colour", bob.participant_id, "BLACK")
        .await
        .expect("bob vote");
    voting::cast_vote(&ctx, live.session_id, "colour", carol.participant_id, "GINGER")
        .await
        .expect("carol vote");

    let outcome = session::advance_step(&ctx, live.session_id, false)
        .await
        .expect("lock colour");
    assert_eq!(outcome.closed.option_key, "GINGER");
    assert_eq!(outcome.closed.votes, 2);
    assert_eq!(outcome.next_step_id.as_deref(), Some("pattern"));

    // Sign-ups closed after the first lock; kicked viewers cannot vote.
    let err = registry::check_in(&ctx, live.session_id, "dave", "Dave", None)
        .await
        .expect_err("late check in");
    assert!(matches!(err.code, ErrorCode::SignupsClosed));

    registry::update_participant(&ctx, bob.participant_id, None, Some("kicked"))
        .await
        .expect("kick bob");
    let err = voting::cast_vote(&ctx, live.session_id, "pattern", bob.participant_id, "Tabby")
        .await
        .expect_err("kicked vote");
    assert!(matches!(err.code, ErrorCode::Kicked));

    // Second round: only Alice votes.
    voting::cast_vote(&ctx, live.session_id, "pattern", alice.participant_id, "Tabby")
        .await
        .expect("alice pattern vote");
    let outcome = session::advance_step(&ctx, live.session_id, false)
        .await
        .expect("lock pattern");
    assert_eq!(outcome.closed.option_key, "Tabby");

    // The host walks the remaining steps with defaults.
    let mut done = outcome.done;
    while !done {
        done = session::advance_step(&ctx, live.session_id, true)
            .await
            .expect("advance")
            .done;
    }

    let finished = session::get_session(&ctx, live.session_id)
        .await
        .expect("reload");
    assert_eq!(finished.status, SessionStatus::Ended);
    assert!(finished.current_step_id.is_none());
    assert_eq!(finished.params["colour"], serde_json::json!("GINGER"));
    assert_eq!(finished.params["peltName"], serde_json::json!("Tabby"));

    let history = session::get_history(&ctx, live.session_id)
        .await
        .expect("history");
    assert_eq!(history[0].step_id, "colour");
    assert_eq!(history[0].votes, 2);
    assert_eq!(history[1].step_id, "pattern");
    assert_eq!(history.len() as i64, finished.step_index);
}
