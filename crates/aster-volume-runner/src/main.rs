/*
[INPUT]:  CLI arguments, YAML configuration file
[OUTPUT]: Task lifecycle commands and spawned worker runs
[POS]:    Binary entry point
[UPDATE]: When changing CLI commands or startup flow
*/

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aster_volume_runner::{
    worker, RunnerConfig, Supervisor, TaskRecord, TaskStore,
};

#[derive(Parser, Debug)]
#[command(name = "aster-volume-runner", version, about = "Paired-order volume runner for the AsterDEX spot market")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", global = true, default_value = "config.yaml")]
    config_path: PathBuf,
    #[arg(long = "log-level", value_name = "LEVEL", global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new task
    Create {
        /// Task identifier; generated when omitted
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        symbol: String,
        /// Base-asset quantity per round
        #[arg(long)]
        quantity: Decimal,
        /// Number of paired rounds
        #[arg(long)]
        rounds: u64,
        /// Pause between rounds, seconds
        #[arg(long, default_value_t = 30)]
        interval: u64,
        /// Submit the buy leg before the sell
        #[arg(long)]
        buy_first: bool,
    },
    /// List all tasks
    List,
    /// Start a task's worker process
    Start { task_id: String },
    /// Stop a running task
    Stop { task_id: String },
    /// Pause a running task (resumable, statistics kept)
    Pause { task_id: String },
    /// Resume a paused task
    Resume { task_id: String },
    /// Delete a task (must not be running)
    Delete { task_id: String },
    /// Reconcile tasks whose worker processes are gone
    Reconcile,
    /// Internal: run one task inside this process (spawned by `start`)
    #[command(hide = true, name = "run-worker")]
    RunWorker { task_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config_path
        .to_str()
        .ok_or_else(|| anyhow!("config path must be valid utf-8"))?
        .to_string();
    let config = RunnerConfig::from_file(&config_path)
        .with_context(|| format!("load config {config_path}"))?;

    // The worker installs its own file-backed subscriber.
    if let Command::RunWorker { task_id } = &cli.command {
        return worker::run_worker(task_id, config, &cli.log_level).await;
    }

    init_tracing(&cli.log_level)?;

    let data_dir = config.resolve_data_dir()?;
    let store = Arc::new(TaskStore::open(&data_dir).await?);
    let supervisor = Supervisor::new(store.clone(), cli.config_path.clone(), cli.log_level.clone());

    match cli.command {
        Command::Create {
            id,
            symbol,
            quantity,
            rounds,
            interval,
            buy_first,
        } => {
            let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let mut task = TaskRecord::new(id.clone(), symbol, quantity, rounds, interval);
            task.sell_first = !buy_first;
            store.create(task).await?;
            println!("created task {id}");
        }
        Command::List => {
            run_orphan_pass(&supervisor).await?;
            print_tasks(&store).await;
        }
        Command::Start { task_id } => {
            run_orphan_pass(&supervisor).await?;
            let pid = supervisor.start(&task_id).await?;
            println!("started task {task_id} (pid {pid})");
        }
        Command::Stop { task_id } => {
            supervisor.stop(&task_id).await?;
            println!("stopped task {task_id}");
        }
        Command::Pause { task_id } => {
            supervisor.pause(&task_id).await?;
            println!("paused task {task_id}");
        }
        Command::Resume { task_id } => {
            run_orphan_pass(&supervisor).await?;
            let pid = supervisor.resume(&task_id).await?;
            println!("resumed task {task_id} (pid {pid})");
        }
        Command::Delete { task_id } => {
            store.delete(&task_id).await?;
            println!("deleted task {task_id}");
        }
        Command::Reconcile => {
            let fixes = supervisor.reconcile_orphans().await?;
            if fixes.is_empty() {
                println!("no orphaned tasks");
            }
            for fix in fixes {
                println!("stopped {}: {}", fix.task_id, fix.reason);
            }
        }
        Command::RunWorker { .. } => unreachable!("handled before supervisor setup"),
    }

    Ok(())
}

async fn run_orphan_pass(supervisor: &Supervisor) -> Result<()> {
    let fixes = supervisor.reconcile_orphans().await?;
    for fix in &fixes {
        info!(task_id = %fix.task_id, reason = %fix.reason, "orphaned task stopped");
    }
    Ok(())
}

async fn print_tasks(store: &TaskStore) {
    let tasks = store.list().await;
    if tasks.is_empty() {
        println!("no tasks");
        return;
    }
    println!(
        "{:<38} {:<12} {:>10} {:>7} {:<8} {:>6} {:>9} {:>12}",
        "ID", "SYMBOL", "QTY", "ROUNDS", "STATUS", "PID", "COMPLETED", "VOLUME"
    );
    for task in tasks {
        println!(
            "{:<38} {:<12} {:>10} {:>7} {:<8} {:>6} {:>9} {:>12}",
            task.id,
            task.symbol,
            task.quantity,
            task.rounds,
            format!("{:?}", task.status).to_lowercase(),
            task.worker_pid
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "-".to_string()),
            task.stats.completed_rounds,
            task.stats.total_volume_quote(),
        );
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}
