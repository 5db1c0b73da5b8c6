pub mod registry;
pub mod session;
pub mod voting;

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use shared::{
    domain::SessionRecord,
    error::{ApiError, ErrorCode},
    protocol::SessionSummary,
};
use steps::BuildParams;
use storage::Storage;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

pub(crate) fn parse_params(session: &SessionRecord) -> Result<BuildParams, ApiError> {
    serde_json::from_value(session.params.clone()).map_err(|err| {
        ApiError::new(
            ErrorCode::Internal,
            format!("session {} has corrupt params: {err}", session.id.0),
        )
    })
}

pub(crate) fn session_summary(record: SessionRecord) -> SessionSummary {
    SessionSummary {
        session_id: record.id,
        viewer_key: record.viewer_key,
        status: record.status,
        current_step_id: record.current_step_id,
        step_index: record.step_index,
        step_history: record.step_history,
        params: record.params,
        allow_repeat_ips: record.allow_repeat_ips,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

const FINGERPRINT_MAX: usize = 120;
const FINGERPRINT_BUCKET_SECS: i64 = 3600;

/// Anti-abuse fingerprint for a check-in. A caller-supplied value wins
/// (trimmed and capped); otherwise the viewer session is hashed into an
/// hourly bucket so repeat check-in attempts collapse to the same value.
pub(crate) fn derive_fingerprint(viewer_session: &str, provided: Option<&str>) -> String {
    if let Some(raw) = provided {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return trimmed.chars().take(FINGERPRINT_MAX).collect();
        }
    }

    if !viewer_session.is_empty() {
        let bucket = Utc::now().timestamp() / FINGERPRINT_BUCKET_SECS;
        let mut hasher = Sha256::new();
        hasher.update(format!("{viewer_session}:{bucket}").as_bytes());
        return format!("{:x}", hasher.finalize());
    }

    Uuid::new_v4().simple().to_string()
}
