/*
[INPUT]:  Task CRUD and status transitions from the CLI, supervisor and workers
[OUTPUT]: Durable task records in a JSON file with atomic writes
[POS]:    Persistence layer - task store
[UPDATE]: When task fields or lifecycle rules change
*/

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use aster_spot_adapter::OrderType;

use crate::stats::RunStats;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Stopped,
    Running,
    Paused,
    Error,
}

fn default_sell_first() -> bool {
    true
}

/// One self-trading task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub symbol: String,
    /// Base-asset quantity per round.
    pub quantity: Decimal,
    /// Number of paired rounds to run.
    pub rounds: u64,
    /// Pause between rounds, seconds.
    pub interval_secs: u64,
    /// Order type used for the paired legs.
    pub order_type: OrderType,
    /// Whether the sell leg leads the buy inside a round.
    #[serde(default = "default_sell_first")]
    pub sell_first: bool,
    pub status: TaskStatus,
    /// OS pid of the worker; present exactly while status is Running.
    pub worker_pid: Option<u32>,
    pub last_error: Option<String>,
    #[serde(default)]
    pub stats: RunStats,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TaskRecord {
    pub fn new(id: String, symbol: String, quantity: Decimal, rounds: u64, interval_secs: u64) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            symbol,
            quantity,
            rounds,
            interval_secs,
            order_type: OrderType::Limit,
            sell_first: true,
            status: TaskStatus::Stopped,
            worker_pid: None,
            last_error: None,
            stats: RunStats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(anyhow!("Task ID cannot be empty"));
        }
        if self.symbol.is_empty() {
            return Err(anyhow!("Symbol cannot be empty"));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(anyhow!("Quantity must be positive"));
        }
        if self.rounds == 0 {
            return Err(anyhow!("Rounds must be at least 1"));
        }
        Ok(())
    }

    /// Transition status, keeping the pid consistent with it.
    pub fn set_status(&mut self, status: TaskStatus, pid: Option<u32>) {
        self.status = status;
        self.worker_pid = if status == TaskStatus::Running {
            pid
        } else {
            None
        };
    }
}

/// JSON-file-backed task store shared by the supervisor and workers.
///
/// The supervisor CLI and each worker run in separate processes, each with
/// its own `TaskStore` over the same file. Every operation therefore
/// re-reads `tasks.json` instead of trusting an open-time snapshot; a
/// mutation is a read-modify-write under the in-process mutex, so a status
/// change never erases statistics flushed by another process in between.
#[derive(Debug)]
pub struct TaskStore {
    tasks_path: PathBuf,
    write_lock: Mutex<()>,
}

impl TaskStore {
    /// Open the store under `data_dir`, creating it when absent.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("create data dir {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.json");
        // Surface an unreadable file at open, not on first use.
        Self::load(&tasks_path).await?;

        Ok(Self {
            tasks_path,
            write_lock: Mutex::new(()),
        })
    }

    async fn load(path: &Path) -> Result<HashMap<String, TaskRecord>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(path).await?;
        let tasks: Vec<TaskRecord> = serde_json::from_str(&content)?;
        Ok(tasks.into_iter().map(|t| (t.id.clone(), t)).collect())
    }

    pub async fn create(&self, task: TaskRecord) -> Result<()> {
        task.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut tasks = Self::load(&self.tasks_path).await?;
        if tasks.contains_key(&task.id) {
            return Err(anyhow!("Task with ID '{}' already exists", task.id));
        }
        tasks.insert(task.id.clone(), task);
        self.save(&tasks).await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<TaskRecord> {
        let mut tasks = Self::load(&self.tasks_path).await.ok()?;
        tasks.remove(id)
    }

    pub async fn list(&self) -> Vec<TaskRecord> {
        let tasks = Self::load(&self.tasks_path).await.unwrap_or_default();
        let mut list: Vec<_> = tasks.into_values().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// Delete a task; refused while its worker is running.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tasks = Self::load(&self.tasks_path).await?;
        match tasks.get(id) {
            None => return Err(anyhow!("Task '{}' not found", id)),
            Some(task) if task.status == TaskStatus::Running => {
                return Err(anyhow!("Task '{}' is running; stop it before deleting", id));
            }
            Some(_) => {}
        }
        tasks.remove(id);
        self.save(&tasks).await?;
        Ok(())
    }

    /// Apply an update closure to one task and persist.
    pub async fn update(&self, id: &str, f: impl FnOnce(&mut TaskRecord)) -> Result<TaskRecord> {
        let _guard = self.write_lock.lock().await;
        let mut tasks = Self::load(&self.tasks_path).await?;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| anyhow!("Task '{}' not found", id))?;
        f(task);
        task.updated_at = chrono::Utc::now();
        let updated = task.clone();
        self.save(&tasks).await?;
        Ok(updated)
    }

    /// Transition a task's status, keeping the pid invariant.
    pub async fn set_status(
        &self,
        id: &str,
        status: TaskStatus,
        pid: Option<u32>,
        error: Option<String>,
    ) -> Result<TaskRecord> {
        self.update(id, |task| {
            task.set_status(status, pid);
            if error.is_some() {
                task.last_error = error;
            }
        })
        .await
    }

    /// Persist run statistics written back by a worker.
    pub async fn update_stats(&self, id: &str, stats: RunStats) -> Result<TaskRecord> {
        self.update(id, |task| task.stats = stats).await
    }

    async fn save(&self, tasks: &HashMap<String, TaskRecord>) -> Result<()> {
        let mut list: Vec<_> = tasks.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        let content = serde_json::to_string_pretty(&list)?;

        // Atomic write: write to temp file then rename
        let temp_path = self.tasks_path.with_extension("tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &self.tasks_path).await?;
        Ok(())
    }
}
