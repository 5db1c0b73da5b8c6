use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use engine::{registry, session, voting, ApiContext};
use serde::Deserialize;
use shared::{
    domain::{ParticipantId, SessionId},
    error::{ApiError, ErrorCode},
    protocol::{
        AdvanceOutcome, ParticipantSummary, ServerEvent, SessionSummary, StepPrompt, TallyEntry,
        VoteSummary,
    },
};
use steps::BuildParams;
use storage::Storage;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

mod config;

use config::{load_settings, prepare_database_url};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
    events: broadcast::Sender<ServerEvent>,
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    viewer_key: Option<String>,
    #[serde(default)]
    allow_repeat_ips: bool,
    #[serde(default)]
    params: Option<BuildParams>,
}

#[derive(Debug, Default, Deserialize)]
struct AdvanceRequest {
    #[serde(default)]
    force_default: bool,
}

#[derive(Debug, Deserialize)]
struct CheckInRequest {
    viewer_session: String,
    display_name: String,
    #[serde(default)]
    fingerprint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateParticipantRequest {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CastVoteRequest {
    step_id: String,
    participant_id: i64,
    option_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct TallyQuery {
    #[serde(default)]
    step_id: Option<String>,
}

const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext { storage };
    let (events, _) = broadcast::channel(256);

    let state = AppState { api, events };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sessions", post(http_create_session))
        .route("/sessions/:session_id", get(http_get_session))
        .route("/sessions/:session_id/activate", post(http_activate))
        .route("/sessions/:session_id/close", post(http_close))
        .route("/sessions/:session_id/advance", post(http_advance))
        .route("/sessions/:session_id/step", get(http_current_step))
        .route("/sessions/:session_id/history", get(http_history))
        .route("/sessions/:session_id/tally", get(http_tally))
        .route(
            "/sessions/:session_id/participants",
            get(http_list_participants).post(http_check_in),
        )
        .route("/participants/:participant_id", patch(http_update_participant))
        .route("/sessions/:session_id/votes", post(http_cast_vote))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.api.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "db unavailable"),
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::AlreadyCheckedIn
        | ErrorCode::DuplicateVote
        | ErrorCode::StaleStep
        | ErrorCode::InvalidTransition => StatusCode::CONFLICT,
        ErrorCode::SessionNotLive
        | ErrorCode::SignupsClosed
        | ErrorCode::Kicked
        | ErrorCode::NotAllowedToVote => StatusCode::FORBIDDEN,
        ErrorCode::DisplayNameRequired
        | ErrorCode::StepMoved
        | ErrorCode::ParticipantMismatch
        | ErrorCode::NoVotes
        | ErrorCode::UnknownOption => StatusCode::BAD_REQUEST,
    };
    (status, Json(err))
}

async fn http_create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionSummary>, (StatusCode, Json<ApiError>)> {
    let summary = session::create_session(
        &state.api,
        req.viewer_key.as_deref().unwrap_or(""),
        req.allow_repeat_ips,
        req.params,
    )
    .await
    .map_err(reject)?;
    Ok(Json(summary))
}

async fn http_get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<Json<SessionSummary>, (StatusCode, Json<ApiError>)> {
    let summary = session::get_session(&state.api, SessionId(session_id))
        .await
        .map_err(reject)?;
    Ok(Json(summary))
}

async fn http_activate(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<Json<SessionSummary>, (StatusCode, Json<ApiError>)> {
    let summary = session::activate(&state.api, SessionId(session_id))
        .await
        .map_err(reject)?;
    let _ = state.events.send(ServerEvent::SessionActivated {
        session_id: summary.session_id,
    });
    Ok(Json(summary))
}

async fn http_close(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<Json<SessionSummary>, (StatusCode, Json<ApiError>)> {
    let summary = session::close(&state.api, SessionId(session_id))
        .await
        .map_err(reject)?;
    let _ = state.events.send(ServerEvent::SessionEnded {
        session_id: summary.session_id,
    });
    Ok(Json(summary))
}

async fn http_advance(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<AdvanceOutcome>, (StatusCode, Json<ApiError>)> {
    let session_id = SessionId(session_id);
    let outcome = session::advance_step(&state.api, session_id, req.force_default)
        .await
        .map_err(reject)?;
    let _ = state.events.send(ServerEvent::StepAdvanced {
        session_id,
        outcome: outcome.clone(),
    });
    if outcome.done {
        let _ = state.events.send(ServerEvent::SessionEnded { session_id });
    }
    Ok(Json(outcome))
}

async fn http_current_step(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<Json<StepPrompt>, (StatusCode, Json<ApiError>)> {
    let prompt = session::current_step(&state.api, SessionId(session_id))
        .await
        .map_err(reject)?;
    Ok(Json(prompt))
}

async fn http_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<Json<Vec<shared::domain::HistoryEntry>>, (StatusCode, Json<ApiError>)> {
    let history = session::get_history(&state.api, SessionId(session_id))
        .await
        .map_err(reject)?;
    Ok(Json(history))
}

async fn http_tally(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Query(q): Query<TallyQuery>,
) -> Result<Json<Vec<TallyEntry>>, (StatusCode, Json<ApiError>)> {
    let counts = voting::tally(&state.api, SessionId(session_id), q.step_id.as_deref())
        .await
        .map_err(reject)?;
    Ok(Json(counts))
}

async fn http_list_participants(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<Json<Vec<ParticipantSummary>>, (StatusCode, Json<ApiError>)> {
    let participants = registry::list_participants(&state.api, SessionId(session_id))
        .await
        .map_err(reject)?;
    Ok(Json(participants))
}

async fn http_check_in(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Json(req): Json<CheckInRequest>,
) -> Result<Json<ParticipantSummary>, (StatusCode, Json<ApiError>)> {
    let session_id = SessionId(session_id);
    let participant = registry::check_in(
        &state.api,
        session_id,
        &req.viewer_session,
        &req.display_name,
        req.fingerprint.as_deref(),
    )
    .await
    .map_err(reject)?;
    let _ = state.events.send(ServerEvent::ParticipantJoined {
        session_id,
        participant: participant.clone(),
    });
    Ok(Json(participant))
}

async fn http_update_participant(
    State(state): State<Arc<AppState>>,
    Path(participant_id): Path<i64>,
    Json(req): Json<UpdateParticipantRequest>,
) -> Result<Json<ParticipantSummary>, (StatusCode, Json<ApiError>)> {
    let participant = registry::update_participant(
        &state.api,
        ParticipantId(participant_id),
        req.display_name.as_deref(),
        req.status.as_deref(),
    )
    .await
    .map_err(reject)?;
    Ok(Json(participant))
}

async fn http_cast_vote(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Json(req): Json<CastVoteRequest>,
) -> Result<Json<VoteSummary>, (StatusCode, Json<ApiError>)> {
    let session_id = SessionId(session_id);
    let vote = voting::cast_vote(
        &state.api,
        session_id,
        &req.step_id,
        ParticipantId(req.participant_id),
        &req.option_key,
    )
    .await
    .map_err(reject)?;
    let _ = state.events.send(ServerEvent::VoteRecorded {
        session_id,
        step_id: vote.step_id.clone(),
        option_key: vote.option_key.clone(),
    });
    Ok(Json(vote))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();

    let send_task = tokio::spawn(async move {
        while let Ok(event) = events_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}
