//! WorkerSupervisor (§4.8): watches each queue's depth and spawns ephemeral
//! worker processes to match demand, respecting a per-queue concurrency cap
//! and a spawn cooldown. Grounded on the original `worker_spawner`'s
//! poll-and-spawn loop — this is its Rust incarnation, trading Python's
//! `subprocess.Popen` bookkeeping for `tokio::process::Command` and a
//! `JoinSet`.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pipeline_queue::QueueBroker;
use tokio::process::{Child, Command};

use crate::config::{SupervisedQueue, SupervisorConfig};
use crate::error::PipelineError;

const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

struct RunningWorker {
    child: Child,
    spawned_at: Instant,
    worker_id: String,
}

/// Tracks every queue's live workers and last-spawn time, and drives the
/// spawn/reap loop. Holds no queue-name -> config lookup beyond what
/// `SupervisorConfig` already gives it.
pub struct WorkerSupervisor {
    queue: Arc<dyn QueueBroker>,
    config: SupervisorConfig,
    active: HashMap<String, Vec<RunningWorker>>,
    last_spawn: HashMap<String, Instant>,
}

impl WorkerSupervisor {
    pub fn new(queue: Arc<dyn QueueBroker>, config: SupervisorConfig) -> Self {
        Self { queue, config, active: HashMap::new(), last_spawn: HashMap::new() }
    }

    /// Runs the monitor-and-spawn loop until `shutdown` resolves (typically
    /// a ctrl_c future), then terminates every still-running worker.
    pub async fn run_until(&mut self, shutdown: impl std::future::Future<Output = ()>) -> Result<(), PipelineError> {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("supervisor received shutdown signal, terminating workers");
                    self.terminate_all().await;
                    return Ok(());
                }
                _ = tokio::time::sleep(MONITOR_INTERVAL) => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "supervisor tick failed");
                    }
                }
            }
        }
    }

    /// One pass: reap finished/overrun workers, then top each queue up to
    /// `min(job_count, max_concurrent)` live workers.
    async fn tick(&mut self) -> Result<(), PipelineError> {
        self.reap_finished_and_overrun();

        for q in self.config.queues.clone() {
            let depth = self.queue.queue_len(&q.name).await?;
            if depth == 0 {
                continue;
            }
            let current = self.active.get(&q.name).map(Vec::len).unwrap_or(0) as u32;
            let target = depth.min(q.max_concurrent as u64) as u32;
            let needed = target.saturating_sub(current);

            for _ in 0..needed {
                if !self.can_spawn(&q) {
                    break;
                }
                self.spawn_worker(&q)?;
            }
        }
        Ok(())
    }

    fn reap_finished_and_overrun(&mut self) {
        for (name, workers) in self.active.iter_mut() {
            let max_runtime =
                self.config.queues.iter().find(|q| &q.name == name).map(|q| Duration::from_secs(q.max_runtime_secs));

            workers.retain_mut(|w| match w.child.try_wait() {
                Ok(Some(status)) => {
                    tracing::info!(worker_id = %w.worker_id, queue = %name, ?status, "worker finished");
                    false
                }
                Ok(None) => {
                    if let Some(max_runtime) = max_runtime {
                        if w.spawned_at.elapsed() > max_runtime {
                            tracing::warn!(worker_id = %w.worker_id, queue = %name, "worker exceeded max runtime, killing");
                            let _ = w.child.start_kill();
                            return false;
                        }
                    }
                    true
                }
                Err(e) => {
                    tracing::error!(worker_id = %w.worker_id, error = %e, "error polling worker status");
                    false
                }
            });
        }
        self.active.retain(|_, workers| !workers.is_empty());
    }

    fn can_spawn(&self, q: &SupervisedQueue) -> bool {
        let current = self.active.get(&q.name).map(Vec::len).unwrap_or(0) as u32;
        if current >= q.max_concurrent {
            return false;
        }
        if let Some(last) = self.last_spawn.get(&q.name) {
            if last.elapsed() < Duration::from_secs(q.cooldown_secs) {
                return false;
            }
        }
        true
    }

    fn spawn_worker(&mut self, q: &SupervisedQueue) -> Result<(), PipelineError> {
        let worker_id = format!("{}_{}", q.name, uuid::Uuid::new_v4().simple());
        let stdout_path = PathBuf::from(&self.config.log_dir).join(format!("{worker_id}.out.log"));
        let stderr_path = PathBuf::from(&self.config.log_dir).join(format!("{worker_id}.err.log"));
        std::fs::create_dir_all(&self.config.log_dir)?;

        let stdout_file = OpenOptions::new().create(true).append(true).open(&stdout_path)?;
        let stderr_file = OpenOptions::new().create(true).append(true).open(&stderr_path)?;

        let child = Command::new(&q.binary)
            .arg("--once")
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file))
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id();
        self.active.entry(q.name.clone()).or_default().push(RunningWorker { child, spawned_at: Instant::now(), worker_id: worker_id.clone() });
        self.last_spawn.insert(q.name.clone(), Instant::now());

        tracing::info!(worker_id, queue = %q.name, pid, "spawned worker");
        Ok(())
    }

    async fn terminate_all(&mut self) {
        for (name, workers) in self.active.iter_mut() {
            for w in workers.iter_mut() {
                tracing::info!(worker_id = %w.worker_id, queue = %name, "terminating worker on shutdown");
                let _ = w.child.start_kill();
            }
        }
        self.active.clear();
    }
}
