//! One cleanup cycle (§4.12), grounded on `queue_manager.py`'s
//! `cleanup_cycle`: expire sessions, release orphaned tasks, handle
//! timeouts (release-with-retry or dead-letter), then notify online
//! verifiers about queued work. Notifications go out over the same
//! [`QueueBroker`] pub/sub primitive `BroadcastFrontend` uses for filing
//! pushes, but on a dedicated channel — verifiers are never joined into the
//! `"all"` filing room.

use chrono::Utc;
use pipeline_queue::QueueBroker;

use crate::config::VerificationConfig;
use crate::model::{CleanupStats, TaskStatus};
use crate::store::VerificationStore;
use crate::VerificationError;

/// Pub/sub channel the janitor publishes "new task"/"tasks released"
/// notifications on. Distinct from `BroadcastFrontend`'s WebSocket room —
/// this is Redis pub/sub consumed by the (external) admin verification UI.
pub const NOTIFICATION_CHANNEL: &str = "backfin:verification:notifications";

fn dead_letter_note(max_retry_count: u32) -> String {
    format!("Auto-rejected: Max retries exceeded ({max_retry_count})")
}

/// Step 2/3 of §4.12: release tasks whose session died, and either release
/// or dead-letter tasks that outran `task_timeout`.
async fn handle_orphaned_and_timeout_tasks(
    store: &VerificationStore,
    config: &VerificationConfig,
) -> Result<(u64, u64, u64), VerificationError> {
    let active_sessions = store.active_session_ids().await?;
    let orphaned = store.release_orphaned_tasks(&active_sessions).await?;

    let threshold = Utc::now() - chrono::Duration::seconds(config.task_timeout_secs as i64);
    let timed_out = store.in_progress_tasks_older_than(threshold, 1000).await?;

    let mut released = 0u64;
    let mut dead_lettered = 0u64;
    for task in &timed_out {
        if (task.retry_count as u32) >= config.max_retry_count {
            store.dead_letter_task(task.id, &dead_letter_note(config.max_retry_count)).await?;
            dead_lettered += 1;
            tracing::warn!(task_id = %task.id, retry_count = task.retry_count, "task dead-lettered, max retries exceeded");
        } else {
            store.release_timeout_task(task.id).await?;
            released += 1;
            tracing::info!(task_id = %task.id, retry_count = task.retry_count + 1, "timeout task released back to queue");
        }
    }

    Ok((orphaned, released, dead_lettered))
}

/// Step 4 of §4.12: if any verifiers are online and tasks are queued,
/// notify the first `notify_batch` of them.
async fn notify_queued_tasks(
    store: &VerificationStore,
    broker: &dyn QueueBroker,
    config: &VerificationConfig,
    active_verifiers: u64,
) -> Result<u64, VerificationError> {
    if active_verifiers == 0 {
        return Ok(0);
    }

    let queued = store.queued_tasks(config.notify_batch as i64).await?;
    if queued.is_empty() {
        return Ok(0);
    }

    let mut notified = 0u64;
    for task in &queued {
        let payload = serde_json::json!({
            "type": "new_task",
            "id": task.id,
            "announcement_id": task.announcement_id,
            "created_at": task.created_at,
        });
        broker.publish(NOTIFICATION_CHANNEL, &payload.to_string()).await?;
        notified += 1;
    }

    tracing::info!(notified, active_verifiers, "notified verifiers of queued tasks");
    Ok(notified)
}

/// Runs one full cleanup cycle and returns the stats, mirroring
/// `cleanup_cycle`/`update_stats` combined.
pub async fn run_cycle(
    store: &VerificationStore,
    broker: &dyn QueueBroker,
    config: &VerificationConfig,
) -> Result<CleanupStats, VerificationError> {
    let expired_sessions_cleaned = store.cleanup_expired_sessions().await?;
    let (orphaned_tasks_released, timeout_tasks_released, tasks_dead_lettered) =
        handle_orphaned_and_timeout_tasks(store, config).await?;

    let queued_tasks = store.count_by_status(TaskStatus::Queued).await?;
    let in_progress_tasks = store.count_by_status(TaskStatus::InProgress).await?;
    let active_verifiers = store.active_verifier_count().await?;

    let notified = if queued_tasks > 0 { notify_queued_tasks(store, broker, config, active_verifiers).await? } else { 0 };

    if orphaned_tasks_released > 0 {
        let payload = serde_json::json!({"type": "tasks_released", "count": orphaned_tasks_released, "reason": "orphaned_sessions"});
        broker.publish(NOTIFICATION_CHANNEL, &payload.to_string()).await?;
    }

    Ok(CleanupStats {
        expired_sessions_cleaned,
        orphaned_tasks_released,
        timeout_tasks_released,
        tasks_dead_lettered,
        queued_tasks,
        in_progress_tasks,
        active_verifiers,
        notified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_letter_note_matches_source_wording() {
        assert_eq!(dead_letter_note(3), "Auto-rejected: Max retries exceeded (3)");
    }
}
