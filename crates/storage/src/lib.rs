use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{
    HistoryEntry, ParticipantId, ParticipantRecord, ParticipantStatus, SessionId, SessionRecord,
    SessionStatus, VoteId, VoteMeta, VoteRecord,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Outcome of a guarded participant insert. The insert only lands while the
/// session row is live, so session close and check-in cannot interleave.
#[derive(Debug)]
pub enum ParticipantInsert {
    Inserted(ParticipantRecord),
    SessionNotLive,
    AlreadyCheckedIn,
}

/// Outcome of a guarded vote insert. The guard pins both the live status and
/// the step pointer, so a vote cannot land for a step that an advance already
/// locked, no matter how the statements interleave.
#[derive(Debug)]
pub enum VoteInsert {
    Inserted(VoteRecord),
    SessionNotLive,
    StepMoved,
    DuplicateVote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyRow {
    pub option_key: String,
    pub votes: i64,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_session(
        &self,
        viewer_key: &str,
        allow_repeat_ips: bool,
        params: &serde_json::Value,
        current_step_id: Option<&str>,
    ) -> Result<SessionRecord> {
        let row = sqlx::query(
            "INSERT INTO sessions (viewer_key, allow_repeat_ips, params, current_step_id)
             VALUES (?, ?, ?, ?)
             RETURNING id, viewer_key, status, current_step_id, step_index, step_history, params, allow_repeat_ips, created_at, updated_at",
        )
        .bind(viewer_key)
        .bind(allow_repeat_ips)
        .bind(params.to_string())
        .bind(current_step_id)
        .fetch_one(&self.pool)
        .await?;
        session_from_row(&row)
    }

    pub async fn get_session(&self, session_id: SessionId) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(
            "SELECT id, viewer_key, status, current_step_id, step_index, step_history, params, allow_repeat_ips, created_at, updated_at
             FROM sessions WHERE id = ?",
        )
        .bind(session_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    /// Newest session for a viewer key. Keys are not unique; a streamer
    /// accumulates one row per stream, so lookups want the latest.
    pub async fn find_session_by_viewer_key(
        &self,
        viewer_key: &str,
    ) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(
            "SELECT id, viewer_key, status, current_step_id, step_index, step_history, params, allow_repeat_ips, created_at, updated_at
             FROM sessions WHERE viewer_key = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(viewer_key)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    /// Flips a pending session live and pins the opening step. The status
    /// guard makes a second activation a no-op, reported as `false`.
    pub async fn activate_session(
        &self,
        session_id: SessionId,
        first_step_id: &str,
    ) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE sessions
             SET status = 'live', current_step_id = ?, step_index = 0, updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND status = 'pending'",
        )
        .bind(first_step_id)
        .bind(session_id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    /// Ends a session from any non-terminal state. Check-ins and votes racing
    /// this update lose: their EXISTS guard stops matching once this commits.
    pub async fn close_session(&self, session_id: SessionId) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE sessions
             SET status = 'ended', current_step_id = NULL, updated_at = CURRENT_TIMESTAMP
             WHERE id = ? AND status != 'ended'",
        )
        .bind(session_id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    /// Moves the step pointer, conditioned on the pointer the caller read.
    /// A concurrent advance that committed first leaves zero rows updated.
    /// With `finish` set the same statement also ends the session, so the
    /// final step locks and the terminal transition commit together.
    pub async fn advance_session(
        &self,
        session_id: SessionId,
        expected_step_id: &str,
        next_step_id: Option<&str>,
        next_step_index: i64,
        step_history: &[HistoryEntry],
        params: &serde_json::Value,
        finish: bool,
    ) -> Result<bool> {
        let history_json = serde_json::to_string(step_history)?;
        let updated = if finish {
            sqlx::query(
                "UPDATE sessions
                 SET status = 'ended', current_step_id = NULL, step_index = ?, step_history = ?, params = ?, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ? AND status = 'live' AND current_step_id = ?",
            )
            .bind(next_step_index)
            .bind(history_json)
            .bind(params.to_string())
            .bind(session_id.0)
            .bind(expected_step_id)
            .execute(&self.pool)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                "UPDATE sessions
                 SET current_step_id = ?, step_index = ?, step_history = ?, params = ?, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ? AND status = 'live' AND current_step_id = ?",
            )
            .bind(next_step_id)
            .bind(next_step_index)
            .bind(history_json)
            .bind(params.to_string())
            .bind(session_id.0)
            .bind(expected_step_id)
            .execute(&self.pool)
            .await?
            .rows_affected()
        };
        Ok(updated > 0)
    }

    pub async fn insert_participant(
        &self,
        session_id: SessionId,
        viewer_session: &str,
        display_name: &str,
        fingerprint: &str,
    ) -> Result<ParticipantInsert> {
        // Single statement: the row only lands while the session is live.
        let result = sqlx::query(
            "INSERT INTO participants (session_id, viewer_session, display_name, fingerprint)
             SELECT ?, ?, ?, ?
             WHERE EXISTS (SELECT 1 FROM sessions WHERE id = ? AND status = 'live')
             RETURNING id, session_id, viewer_session, display_name, status, fingerprint, created_at, updated_at",
        )
        .bind(session_id.0)
        .bind(viewer_session)
        .bind(display_name)
        .bind(fingerprint)
        .bind(session_id.0)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => Ok(ParticipantInsert::Inserted(participant_from_row(&row)?)),
            Ok(None) => Ok(ParticipantInsert::SessionNotLive),
            Err(err) if is_unique_violation(&err) => Ok(ParticipantInsert::AlreadyCheckedIn),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get_participant(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Option<ParticipantRecord>> {
        let row = sqlx::query(
            "SELECT id, session_id, viewer_session, display_name, status, fingerprint, created_at, updated_at
             FROM participants WHERE id = ?",
        )
        .bind(participant_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(participant_from_row).transpose()
    }

    pub async fn find_participant(
        &self,
        session_id: SessionId,
        viewer_session: &str,
    ) -> Result<Option<ParticipantRecord>> {
        let row = sqlx::query(
            "SELECT id, session_id, viewer_session, display_name, status, fingerprint, created_at, updated_at
             FROM participants WHERE session_id = ? AND viewer_session = ?",
        )
        .bind(session_id.0)
        .bind(viewer_session)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(participant_from_row).transpose()
    }

    pub async fn list_participants(&self, session_id: SessionId) -> Result<Vec<ParticipantRecord>> {
        let rows = sqlx::query(
            "SELECT id, session_id, viewer_session, display_name, status, fingerprint, created_at, updated_at
             FROM participants WHERE session_id = ? ORDER BY id ASC",
        )
        .bind(session_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(participant_from_row).collect()
    }

    pub async fn update_participant(
        &self,
        participant_id: ParticipantId,
        display_name: Option<&str>,
        status: Option<ParticipantStatus>,
    ) -> Result<Option<ParticipantRecord>> {
        let row = sqlx::query(
            "UPDATE participants
             SET display_name = COALESCE(?, display_name),
                 status = COALESCE(?, status),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?
             RETURNING id, session_id, viewer_session, display_name, status, fingerprint, created_at, updated_at",
        )
        .bind(display_name)
        .bind(status.map(|s| s.as_str()))
        .bind(participant_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(participant_from_row).transpose()
    }

    pub async fn insert_vote(
        &self,
        session_id: SessionId,
        step_id: &str,
        option_key: &str,
        meta: &VoteMeta,
        voted_by: ParticipantId,
    ) -> Result<VoteInsert> {
        let meta_json = serde_json::to_string(meta)?;
        let result = sqlx::query(
            "INSERT INTO votes (session_id, step_id, option_key, option_meta, voted_by)
             SELECT ?, ?, ?, ?, ?
             WHERE EXISTS (SELECT 1 FROM sessions WHERE id = ? AND status = 'live' AND current_step_id = ?)
             RETURNING id, session_id, step_id, option_key, option_meta, voted_by, created_at, updated_at",
        )
        .bind(session_id.0)
        .bind(step_id)
        .bind(option_key)
        .bind(meta_json)
        .bind(voted_by.0)
        .bind(session_id.0)
        .bind(step_id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => Ok(VoteInsert::Inserted(vote_from_row(&row)?)),
            Ok(None) => {
                // The guard failed; a second read says which half of it.
                let session = self.get_session(session_id).await?;
                match session {
                    Some(record) if record.status == SessionStatus::Live => {
                        Ok(VoteInsert::StepMoved)
                    }
                    _ => Ok(VoteInsert::SessionNotLive),
                }
            }
            Err(err) if is_unique_violation(&err) => Ok(VoteInsert::DuplicateVote),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list_votes(&self, session_id: SessionId, step_id: &str) -> Result<Vec<VoteRecord>> {
        let rows = sqlx::query(
            "SELECT id, session_id, step_id, option_key, option_meta, voted_by, created_at, updated_at
             FROM votes WHERE session_id = ? AND step_id = ? ORDER BY id ASC",
        )
        .bind(session_id.0)
        .bind(step_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(vote_from_row).collect()
    }

    pub async fn tally(&self, session_id: SessionId, step_id: &str) -> Result<Vec<TallyRow>> {
        let rows = sqlx::query(
            "SELECT option_key, COUNT(*) AS votes
             FROM votes
             WHERE session_id = ? AND step_id = ?
             GROUP BY option_key
             ORDER BY votes DESC, MIN(created_at) ASC, MIN(id) ASC",
        )
        .bind(session_id.0)
        .bind(step_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| TallyRow {
                option_key: r.get::<String, _>(0),
                votes: r.get::<i64, _>(1),
            })
            .collect())
    }

    /// Leading option for a step. Ties break towards the option whose first
    /// vote landed earlier; the vote id is the arbiter within one timestamp
    /// tick, so the result is a total order.
    pub async fn winner(&self, session_id: SessionId, step_id: &str) -> Result<Option<TallyRow>> {
        let row = sqlx::query(
            "SELECT option_key, COUNT(*) AS votes
             FROM votes
             WHERE session_id = ? AND step_id = ?
             GROUP BY option_key
             ORDER BY votes DESC, MIN(created_at) ASC, MIN(id) ASC
             LIMIT 1",
        )
        .bind(session_id.0)
        .bind(step_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| TallyRow {
            option_key: r.get::<String, _>(0),
            votes: r.get::<i64, _>(1),
        }))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

fn session_from_row(row: &SqliteRow) -> Result<SessionRecord> {
    let status_raw = row.get::<String, _>(2);
    let status = SessionStatus::parse(&status_raw)
        .with_context(|| format!("unknown session status '{status_raw}'"))?;
    let step_history: Vec<HistoryEntry> = serde_json::from_str(&row.get::<String, _>(5))
        .context("corrupt step_history column")?;
    let params: serde_json::Value =
        serde_json::from_str(&row.get::<String, _>(6)).context("corrupt params column")?;
    Ok(SessionRecord {
        id: SessionId(row.get::<i64, _>(0)),
        viewer_key: row.get::<String, _>(1),
        status,
        current_step_id: row.get::<Option<String>, _>(3),
        step_index: row.get::<i64, _>(4),
        step_history,
        params,
        allow_repeat_ips: row.get::<bool, _>(7),
        created_at: row.get::<DateTime<Utc>, _>(8),
        updated_at: row.get::<DateTime<Utc>, _>(9),
    })
}

fn participant_from_row(row: &SqliteRow) -> Result<ParticipantRecord> {
    let status_raw = row.get::<String, _>(4);
    let status = ParticipantStatus::parse(&status_raw)
        .with_context(|| format!("unknown participant status '{status_raw}'"))?;
    Ok(ParticipantRecord {
        id: ParticipantId(row.get::<i64, _>(0)),
        session_id: SessionId(row.get::<i64, _>(1)),
        viewer_session: row.get::<String, _>(2),
        display_name: row.get::<String, _>(3),
        status,
        fingerprint: row.get::<String, _>(5),
        created_at: row.get::<DateTime<Utc>, _>(6),
        updated_at: row.get::<DateTime<Utc>, _>(7),
    })
}

fn vote_from_row(row: &SqliteRow) -> Result<VoteRecord> {
    let meta: VoteMeta =
        serde_json::from_str(&row.get::<String, _>(4)).context("corrupt option_meta column")?;
    Ok(VoteRecord {
        id: VoteId(row.get::<i64, _>(0)),
        session_id: SessionId(row.get::<i64, _>(1)),
        step_id: row.get::<String, _>(2),
        option_key: row.get::<String, _>(3),
        option_meta: meta,
        voted_by: ParticipantId(row.get::<i64, _>(5)),
        created_at: row.get::<DateTime<Utc>, _>(6),
        updated_at: row.get::<DateTime<Utc>, _>(7),
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
