//! The verification-task/session/verifier shapes the janitor reads and
//! writes. Mirrors `queue_manager.py`'s `TaskStatus`/`VerificationTask`
//! dataclasses one-for-one; the admin UI that actually creates and verifies
//! these tasks is an external collaborator this crate does not implement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    InProgress,
    Verified,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Verified => "verified",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "in_progress" => Ok(TaskStatus::InProgress),
            "verified" => Ok(TaskStatus::Verified),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerificationTask {
    pub id: Uuid,
    pub announcement_id: Uuid,
    pub status: TaskStatus,
    pub assigned_to_session: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub timeout_count: i32,
    pub current_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Rolled up once per cleanup cycle for logging/`/api/verification_status`,
/// matching `QueueStats` in the source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupStats {
    pub expired_sessions_cleaned: u64,
    pub orphaned_tasks_released: u64,
    pub timeout_tasks_released: u64,
    pub tasks_dead_lettered: u64,
    pub queued_tasks: u64,
    pub in_progress_tasks: u64,
    pub active_verifiers: u64,
    pub notified: u64,
}
