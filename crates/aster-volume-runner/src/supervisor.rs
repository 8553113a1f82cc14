/*
[INPUT]:  Task lifecycle commands and the on-disk task store
[OUTPUT]: Spawned, signalled and reconciled worker processes
[POS]:    Process layer - task supervisor
[UPDATE]: When spawn arguments or termination escalation change
*/

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::store::{TaskStatus, TaskStore};

/// Grace period after SIGTERM before escalating.
const TERM_GRACE: Duration = Duration::from_secs(5);

/// Wait after SIGKILL before giving up on the pid.
const KILL_GRACE: Duration = Duration::from_secs(3);

/// Liveness poll interval while waiting for a worker to exit.
const EXIT_POLL: Duration = Duration::from_millis(200);

/// Subcommand the supervisor spawns; also the cmdline marker used to
/// verify that a recorded pid still belongs to one of our workers.
const WORKER_SUBCOMMAND: &str = "run-worker";

/// One orphaned task fixed by a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanFix {
    pub task_id: String,
    pub reason: String,
}

/// Spawns one worker process per task and keeps the store's view of
/// those processes truthful.
pub struct Supervisor {
    store: Arc<TaskStore>,
    config_path: PathBuf,
    log_level: String,
}

impl Supervisor {
    pub fn new(store: Arc<TaskStore>, config_path: PathBuf, log_level: String) -> Self {
        Self {
            store,
            config_path,
            log_level,
        }
    }

    /// Launch a worker for the task. Refused while one is already running.
    pub async fn start(&self, task_id: &str) -> Result<u32> {
        let task = self
            .store
            .get(task_id)
            .await
            .ok_or_else(|| anyhow!("Task '{}' not found", task_id))?;
        if task.status == TaskStatus::Running {
            return Err(anyhow!("Task '{}' is already running", task_id));
        }

        let pid = self.spawn_worker(task_id)?;
        self.store
            .set_status(task_id, TaskStatus::Running, Some(pid), None)
            .await?;
        info!(task_id, pid, "worker started");
        Ok(pid)
    }

    /// Stop a running worker: SIGTERM, grace wait, SIGKILL escalation.
    /// The task ends up stopped regardless of what the process does.
    pub async fn stop(&self, task_id: &str) -> Result<()> {
        self.halt(task_id, TaskStatus::Stopped).await
    }

    /// Stop the worker but mark the task paused so it can be resumed.
    pub async fn pause(&self, task_id: &str) -> Result<()> {
        let task = self
            .store
            .get(task_id)
            .await
            .ok_or_else(|| anyhow!("Task '{}' not found", task_id))?;
        if task.status != TaskStatus::Running {
            return Err(anyhow!("Task '{}' is not running", task_id));
        }
        self.halt(task_id, TaskStatus::Paused).await
    }

    /// Relaunch a paused task. Its statistics carry over.
    pub async fn resume(&self, task_id: &str) -> Result<u32> {
        let task = self
            .store
            .get(task_id)
            .await
            .ok_or_else(|| anyhow!("Task '{}' not found", task_id))?;
        if task.status != TaskStatus::Paused {
            return Err(anyhow!("Task '{}' is not paused", task_id));
        }
        self.start(task_id).await
    }

    /// Fix every `running` task whose worker is gone or unrecognizable.
    pub async fn reconcile_orphans(&self) -> Result<Vec<OrphanFix>> {
        let mut fixes = Vec::new();
        for task in self.store.list().await {
            if task.status != TaskStatus::Running {
                continue;
            }

            let reason = match task.worker_pid {
                None => Some("no worker pid recorded".to_string()),
                Some(pid) if !process::is_alive(pid) => {
                    Some(format!("worker process {pid} not found"))
                }
                Some(pid) if !process::is_our_worker(pid, &task.id) => {
                    Some(format!("pid {pid} belongs to another process"))
                }
                Some(_) => None,
            };

            if let Some(reason) = reason {
                warn!(task_id = %task.id, %reason, "orphaned task detected");
                self.store
                    .set_status(&task.id, TaskStatus::Stopped, None, Some(reason.clone()))
                    .await?;
                fixes.push(OrphanFix {
                    task_id: task.id,
                    reason,
                });
            }
        }
        Ok(fixes)
    }

    async fn halt(&self, task_id: &str, final_status: TaskStatus) -> Result<()> {
        let task = self
            .store
            .get(task_id)
            .await
            .ok_or_else(|| anyhow!("Task '{}' not found", task_id))?;

        if let Some(pid) = task.worker_pid {
            process::terminate(pid).await;
        }

        self.store
            .set_status(task_id, final_status, None, None)
            .await?;
        info!(task_id, ?final_status, "worker halted");
        Ok(())
    }

    /// Spawn `current_exe run-worker <id>` detached in its own process
    /// group so a supervisor SIGINT does not take the workers down.
    fn spawn_worker(&self, task_id: &str) -> Result<u32> {
        let exe = std::env::current_exe().context("resolve current executable")?;

        let mut command = Command::new(exe);
        command
            .arg(WORKER_SUBCOMMAND)
            .arg(task_id)
            .arg("--config")
            .arg(&self.config_path)
            .arg("--log-level")
            .arg(&self.log_level)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn().context("spawn worker process")?;
        Ok(child.id())
    }
}

/// OS process probes and termination.
pub(crate) mod process {
    use super::{Duration, EXIT_POLL, KILL_GRACE, TERM_GRACE, WORKER_SUBCOMMAND};

    /// True when a process with this pid exists (a zombie counts).
    #[cfg(unix)]
    pub fn is_alive(pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    #[cfg(not(unix))]
    pub fn is_alive(_pid: u32) -> bool {
        false
    }

    /// True when the pid's cmdline looks like our worker for this task.
    ///
    /// A recycled pid belonging to an unrelated process fails this check.
    /// When /proc is unavailable the check passes; liveness alone decides.
    pub fn is_our_worker(pid: u32, task_id: &str) -> bool {
        let path = format!("/proc/{pid}/cmdline");
        match std::fs::read(&path) {
            Ok(raw) => {
                let args: Vec<&str> = raw
                    .split(|byte| *byte == 0)
                    .filter_map(|part| std::str::from_utf8(part).ok())
                    .filter(|part| !part.is_empty())
                    .collect();
                args.iter().any(|arg| *arg == WORKER_SUBCOMMAND)
                    && args.iter().any(|arg| *arg == task_id)
            }
            Err(_) => true,
        }
    }

    /// SIGTERM, wait up to the grace period, SIGKILL, wait again.
    /// An absent process returns immediately.
    #[cfg(unix)]
    pub async fn terminate(pid: u32) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let target = Pid::from_raw(pid as i32);
        if kill(target, None).is_err() {
            return;
        }

        let _ = kill(target, Some(Signal::SIGTERM));
        if wait_exit(pid, TERM_GRACE).await {
            return;
        }

        tracing::warn!(pid, "worker ignored SIGTERM, escalating to SIGKILL");
        let _ = kill(target, Some(Signal::SIGKILL));
        wait_exit(pid, KILL_GRACE).await;
    }

    #[cfg(not(unix))]
    pub async fn terminate(_pid: u32) {}

    async fn wait_exit(pid: u32, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if !is_alive(pid) {
                return true;
            }
            tokio::time::sleep(EXIT_POLL).await;
        }
        !is_alive(pid)
    }
}
