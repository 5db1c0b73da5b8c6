use super::*;
use crate::{registry, session, ApiContext};
use shared::error::ErrorCode;
use storage::Storage;

async fn ctx() -> ApiContext {
    ApiContext {
        storage: Storage::new("sqlite::memory:").await.expect("db"),
    }
}

async fn live_session(ctx: &ApiContext, viewer_key: &str) -> shared::protocol::SessionSummary {
    let created = session::create_session(ctx, viewer_key, false, None)
        .await
        .expect("create");
    session::activate(ctx, created.session_id)
        .await
        .expect("activate")
}

async fn voter(
    ctx: &ApiContext,
    session_id: SessionId,
    viewer: &str,
) -> shared::protocol::ParticipantSummary {
    registry::check_in(ctx, session_id, viewer, viewer, None)
        .await
        .expect("check in")
}

#[tokio::test]
async fn records_a_vote_with_denormalized_voter_name() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    let alice = voter(&ctx, session.session_id, "alice").await;

    let vote = cast_vote(&ctx, session.session_id, "colour", alice.participant_id, "GINGER")
        .await
        .expect("vote");
    assert_eq!(vote.option_key, "GINGER");
    assert_eq!(vote.participant_name.as_deref(), Some("alice"));

    let listed = list_votes(&ctx, session.session_id, "colour")
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].voted_by, alice.participant_id);
}

#[tokio::test]
async fn votes_for_a_step_that_moved_are_refused() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    let alice = voter(&ctx, session.session_id, "alice").await;

    let err = cast_vote(&ctx, session.session_id, "pattern", alice.participant_id, "Tabby")
        .await
        .expect_err("wrong step");
    assert!(matches!(err.code, ErrorCode::StepMoved));
    assert_eq!(err.message, "Voting has moved to a different step.");
}

#[tokio::test]
async fn participants_must_belong_to_the_session() {
    let ctx = ctx().await;
    let session_a = live_session(&ctx, "a").await;
    let session_b = live_session(&ctx, "b").await;
    let stranger = voter(&ctx, session_b.session_id, "stranger").await;

    let err = cast_vote(
        &ctx,
        session_a.session_id,
        "colour",
        stranger.participant_id,
        "GINGER",
    )
    .await
    .expect_err("cross-session vote");
    assert!(matches!(err.code, ErrorCode::ParticipantMismatch));

    let err = cast_vote(&ctx, session_a.session_id, "colour", ParticipantId(9999), "GINGER")
        .await
        .expect_err("unknown participant");
    assert!(matches!(err.code, ErrorCode::ParticipantMismatch));
}

#[tokio::test]
async fn kicked_viewers_get_the_kicked_message() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    let alice = voter(&ctx, session.session_id, "alice").await;
    registry::update_participant(&ctx, alice.participant_id, None, Some("kicked"))
        .await
        .expect("kick");

    let err = cast_vote(&ctx, session.session_id, "colour", alice.participant_id, "GINGER")
        .await
        .expect_err("kicked vote");
    assert!(matches!(err.code, ErrorCode::Kicked));
    assert_eq!(err.message, "You have been removed from this stream.");
}

#[tokio::test]
async fn non_active_viewers_are_not_allowed_to_vote() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    let alice = voter(&ctx, session.session_id, "alice").await;
    registry::update_participant(&ctx, alice.participant_id, None, Some("pending"))
        .await
        .expect("suspend");

    let err = cast_vote(&ctx, session.session_id, "colour", alice.participant_id, "GINGER")
        .await
        .expect_err("pending vote");
    assert!(matches!(err.code, ErrorCode::NotAllowedToVote));
}

#[tokio::test]
async fn one_vote_per_participant_per_step() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    let alice = voter(&ctx, session.session_id, "alice").await;

    cast_vote(&ctx, session.session_id, "colour", alice.participant_id, "GINGER")
        .await
        .expect("first vote");
    let err = cast_vote(&ctx, session.session_id, "colour", alice.participant_id, "BLACK")
        .await
        .expect_err("second vote");
    assert!(matches!(err.code, ErrorCode::DuplicateVote));
    assert_eq!(err.message, "You already voted in this round.");
}

#[tokio::test]
async fn unknown_option_keys_are_refused() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    let alice = voter(&ctx, session.session_id, "alice").await;

    let err = cast_vote(
        &ctx,
        session.session_id,
        "colour",
        alice.participant_id,
        "NOT_A_COLOUR",
    )
    .await
    .expect_err("bogus option");
    assert!(matches!(err.code, ErrorCode::UnknownOption));
}

#[tokio::test]
async fn votes_after_close_are_refused() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    let alice = voter(&ctx, session.session_id, "alice").await;
    session::close(&ctx, session.session_id).await.expect("close");

    let err = cast_vote(&ctx, session.session_id, "colour", alice.participant_id, "GINGER")
        .await
        .expect_err("vote after close");
    assert!(matches!(err.code, ErrorCode::SessionNotLive));
}

#[tokio::test]
async fn tally_orders_leaders_first() {
    let ctx = ctx().await;
    let session = live_session(&ctx, "s").await;
    let a = voter(&ctx, session.session_id, "a").await;
    let b = voter(&ctx, session.session_id, "b").await;
    let c = voter(&ctx, session.session_id, "c").await;

    for (who, option) in [(a, "BLACK"), (b, "GINGER"), (c, "BLACK")] {
        cast_vote(&ctx, session.session_id, "colour", who.participant_id, option)
            .await
            .expect("vote");
    }

    let counts = tally(&ctx, session.session_id, None).await.expect("tally");
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].option_key, "BLACK");
    assert_eq!(counts[0].votes, 2);
    assert_eq!(counts[1].option_key, "GINGER");

    let by_name = tally(&ctx, session.session_id, Some("colour"))
        .await
        .expect("tally by step");
    assert_eq!(by_name.len(), 2);
}
