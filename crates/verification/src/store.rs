//! Postgres access for the verification queue's own tables
//! (`verification_tasks`, `admin_sessions`, `verifiers`) — separate tables
//! from the filings Store, but the same `sqlx::PgPool`/plain-query style as
//! `pipeline_store::StoreClient`.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::VerificationConfig;
use crate::error::VerificationError;
use crate::model::{TaskStatus, VerificationTask};

pub struct VerificationStore {
    pool: PgPool,
}

impl VerificationStore {
    pub async fn connect(config: &VerificationConfig) -> Result<Self, VerificationError> {
        let url = config.database_url.clone().unwrap_or_default();
        let pool = PgPoolOptions::new().max_connections(config.max_connections).connect(&url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes admin sessions past `expires_at` and flips `verifiers.active`
    /// to false for any session no longer present. Returns the combined
    /// count, matching `cleanup_expired_sessions`'s `expired + inactive` sum.
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, VerificationError> {
        let expired = sqlx::query("DELETE FROM admin_sessions WHERE expires_at < now()").execute(&self.pool).await?;

        let inactive = sqlx::query(
            "UPDATE verifiers SET active = false \
             WHERE active = true \
               AND session_id NOT IN (SELECT session_id FROM admin_sessions)",
        )
        .execute(&self.pool)
        .await?;

        Ok(expired.rows_affected() + inactive.rows_affected())
    }

    /// Session ids from `admin_sessions` that have not expired — the set an
    /// in-progress task's `assigned_to_session` is checked against.
    pub async fn active_session_ids(&self) -> Result<Vec<String>, VerificationError> {
        let rows = sqlx::query("SELECT session_id FROM admin_sessions WHERE expires_at >= now()")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("session_id")).collect())
    }

    /// Releases in-progress tasks whose `assigned_to_session` is not in
    /// `active_session_ids` back to `queued`, clearing the assignment.
    pub async fn release_orphaned_tasks(&self, active_session_ids: &[String]) -> Result<u64, VerificationError> {
        let result = sqlx::query(
            "UPDATE verification_tasks \
             SET status = 'queued', assigned_to_user = NULL, assigned_to_session = NULL, assigned_at = NULL \
             WHERE status = 'in_progress' \
               AND assigned_to_session IS NOT NULL \
               AND NOT (assigned_to_session = ANY($1))",
        )
        .bind(active_session_ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// In-progress tasks assigned before `threshold` — timeout candidates.
    pub async fn in_progress_tasks_older_than(
        &self,
        threshold: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<VerificationTask>, VerificationError> {
        let rows = sqlx::query(
            "SELECT id, announcement_id, status, assigned_to_session, assigned_at, \
                    retry_count, timeout_count, current_data, created_at \
             FROM verification_tasks \
             WHERE status = 'in_progress' AND assigned_at IS NOT NULL AND assigned_at < $1 \
             ORDER BY assigned_at ASC LIMIT $2",
        )
        .bind(threshold)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| VerificationTask {
                id: r.get("id"),
                announcement_id: r.get("announcement_id"),
                status: TaskStatus::InProgress,
                assigned_to_session: r.get("assigned_to_session"),
                assigned_at: r.get("assigned_at"),
                retry_count: r.get("retry_count"),
                timeout_count: r.get("timeout_count"),
                current_data: r.get("current_data"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    /// Releases a timed-out task back to `queued`, bumping `retry_count` and
    /// `timeout_count`.
    pub async fn release_timeout_task(&self, id: Uuid) -> Result<(), VerificationError> {
        sqlx::query(
            "UPDATE verification_tasks \
             SET status = 'queued', assigned_to_user = NULL, assigned_to_session = NULL, assigned_at = NULL, \
                 retry_count = retry_count + 1, timeout_count = timeout_count + 1 \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Dead-letters a task that exhausted its retries: `verified` with
    /// `is_verified = false` and an explanatory note.
    pub async fn dead_letter_task(&self, id: Uuid, note: &str) -> Result<(), VerificationError> {
        sqlx::query(
            "UPDATE verification_tasks \
             SET status = 'verified', is_verified = false, verification_notes = $2, verified_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(note)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn queued_tasks(&self, limit: i64) -> Result<Vec<VerificationTask>, VerificationError> {
        let rows = sqlx::query(
            "SELECT id, announcement_id, status, assigned_to_session, assigned_at, \
                    retry_count, timeout_count, current_data, created_at \
             FROM verification_tasks \
             WHERE status = 'queued' ORDER BY created_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| VerificationTask {
                id: r.get("id"),
                announcement_id: r.get("announcement_id"),
                status: TaskStatus::Queued,
                assigned_to_session: r.get("assigned_to_session"),
                assigned_at: r.get("assigned_at"),
                retry_count: r.get("retry_count"),
                timeout_count: r.get("timeout_count"),
                current_data: r.get("current_data"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    pub async fn count_by_status(&self, status: TaskStatus) -> Result<u64, VerificationError> {
        let row = sqlx::query("SELECT count(*) AS n FROM verification_tasks WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    pub async fn active_verifier_count(&self) -> Result<u64, VerificationError> {
        let row = sqlx::query("SELECT count(*) AS n FROM verifiers WHERE active = true").fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>("n") as u64)
    }
}
