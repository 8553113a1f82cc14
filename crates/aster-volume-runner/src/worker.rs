/*
[INPUT]:  Task id, runner configuration, OS shutdown signals
[OUTPUT]: One executed task run with statistics and final status
[POS]:    Process layer - worker entry point (one task per process)
[UPDATE]: When run phases or final status rules change
*/

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use aster_spot_adapter::{AsterClient, ClientConfig, Credentials, SpotExchange};

use crate::config::RunnerConfig;
use crate::engine::{split_symbol, EngineError, EngineSettings, PairEngine};
use crate::reconcile::Reconciler;
use crate::stats::RunStats;
use crate::stop::StopController;
use crate::store::{TaskRecord, TaskStatus, TaskStore};

/// Open the per-task log file and install the process-wide subscriber.
///
/// The returned guard must stay alive for the whole run or buffered log
/// lines are lost.
fn init_worker_logging(log_dir: &Path, task_id: &str, log_level: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("create log dir {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::never(log_dir, format!("task-{task_id}.log"));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize worker tracing subscriber")?;

    Ok(guard)
}

fn build_exchange(config: &RunnerConfig) -> Result<Arc<dyn SpotExchange>> {
    let client_config = ClientConfig::default();
    let mut client = match &config.base_url {
        Some(url) => AsterClient::with_config_and_base_url(client_config, url),
        None => AsterClient::with_config(client_config),
    }
    .context("build exchange client")?;

    client.set_credentials(Credentials {
        api_key: config.account.api_key.clone(),
        api_secret: config.account.api_secret.clone(),
    });
    Ok(Arc::new(client))
}

/// Run one task to completion inside this process.
///
/// The final status follows the error taxonomy: submission, configuration
/// and connectivity failures end in `error`; everything else, including a
/// requested stop, ends in `stopped`.
pub async fn run_worker(task_id: &str, config: RunnerConfig, log_level: &str) -> Result<()> {
    let data_dir = config.resolve_data_dir()?;
    let log_dir = config.resolve_log_dir()?;
    let _log_guard = init_worker_logging(&log_dir, task_id, log_level)?;

    let store = TaskStore::open(&data_dir).await?;
    let task = store
        .get(task_id)
        .await
        .ok_or_else(|| anyhow!("Task '{}' not found", task_id))?;

    store
        .set_status(task_id, TaskStatus::Running, Some(std::process::id()), None)
        .await?;

    info!(
        task_id,
        symbol = %task.symbol,
        rounds = task.rounds,
        quantity = %task.quantity,
        "worker started"
    );

    let stop = StopController::new();
    stop.install_signal_handlers();

    let exchange = build_exchange(&config)?;

    match execute(exchange, &task, &config, stop).await {
        Ok(stats) => {
            info!(
                completed = stats.completed_rounds,
                failed = stats.failed_rounds,
                supplements = stats.supplement_orders,
                volume = %stats.total_volume_quote(),
                net_loss = %stats.net_loss_quote,
                "worker finished"
            );
            store.update_stats(task_id, stats).await?;
            store
                .set_status(task_id, TaskStatus::Stopped, None, None)
                .await?;
            Ok(())
        }
        Err(run_err) => {
            error!(error = %run_err.error, "worker failed");
            store.update_stats(task_id, run_err.stats).await?;
            store
                .set_status(
                    task_id,
                    TaskStatus::Error,
                    None,
                    Some(run_err.error.to_string()),
                )
                .await?;
            Err(run_err.error)
        }
    }
}

/// A failed run still carries the statistics gathered so far.
struct RunFailure {
    error: anyhow::Error,
    stats: RunStats,
}

async fn execute(
    exchange: Arc<dyn SpotExchange>,
    task: &TaskRecord,
    config: &RunnerConfig,
    stop: StopController,
) -> std::result::Result<RunStats, RunFailure> {
    let (base_asset, quote_asset) = split_symbol(&task.symbol);

    if let Err(err) = exchange.ping().await {
        return Err(RunFailure {
            error: anyhow!(err).context("exchange connectivity check"),
            stats: RunStats::default(),
        });
    }

    // Lingering orders from a previous run lock funds and would distort
    // the baseline.
    match exchange.open_orders(&task.symbol).await {
        Ok(orders) => {
            for order in orders {
                if let Err(err) = exchange.cancel_order(&task.symbol, order.order_id).await {
                    warn!(
                        order_id = order.order_id,
                        error = %err,
                        "could not cancel lingering order"
                    );
                }
            }
        }
        Err(err) => warn!(error = %err, "open orders query failed"),
    }

    // Baseline is captured before any auto-purchase.
    let account = match exchange.account().await {
        Ok(account) => account,
        Err(err) => {
            return Err(RunFailure {
                error: anyhow!(err).context("capture baseline balance"),
                stats: RunStats::default(),
            })
        }
    };
    let baseline_base = account.free_balance(&base_asset);
    let baseline_quote = account.free_balance(&quote_asset);

    // A resumed task keeps its accumulated statistics; initial balances
    // are only captured on the first run.
    let mut stats = task.stats.clone();
    if stats.initial_base_balance.is_zero() && stats.initial_quote_balance.is_zero() {
        stats.initial_base_balance = baseline_base;
        stats.initial_quote_balance = baseline_quote;
    }

    let rounds_done = stats.completed_rounds + stats.failed_rounds;
    let rounds_remaining = task.rounds.saturating_sub(rounds_done);
    if rounds_remaining == 0 {
        info!(rounds = task.rounds, "all rounds already executed");
        return Ok(stats);
    }

    let filters = match exchange.symbol_filters(&task.symbol).await {
        Ok(filters) => filters,
        Err(err) => {
            return Err(RunFailure {
                error: anyhow!(err).context("fetch symbol filters"),
                stats,
            })
        }
    };
    let commission = match exchange.commission_rate(&task.symbol).await {
        Ok(commission) => commission,
        Err(err) => {
            return Err(RunFailure {
                error: anyhow!(err).context("fetch commission rate"),
                stats,
            })
        }
    };

    let mut reconciler = Reconciler::new(
        exchange.clone(),
        task.symbol.clone(),
        base_asset.clone(),
        filters,
        config.engine.clone(),
        commission.taker_commission_rate,
        baseline_base,
    );

    if let Err(err) = reconciler.ensure_sufficient(task.quantity, &mut stats).await {
        return Err(RunFailure {
            error: err.context("pre-run balance sufficiency"),
            stats,
        });
    }

    let settings = EngineSettings {
        symbol: task.symbol.clone(),
        base_asset: base_asset.clone(),
        quote_asset: quote_asset.clone(),
        quantity: task.quantity,
        rounds: rounds_remaining,
        interval: Duration::from_secs(task.interval_secs),
        sell_first: task.sell_first,
        tuning: config.engine.clone(),
    };

    let mut engine = match PairEngine::new(exchange.clone(), settings, stop.clone()).await {
        Ok(engine) => engine,
        Err(err) => {
            return Err(RunFailure {
                error: anyhow!(err).context("initialize pair engine"),
                stats,
            })
        }
    };
    engine.set_stats(stats);

    let engine_result = engine.run().await;
    let mut stats = engine.into_stats();

    // Reconciliation and liquidation run no matter how the engine ended.
    if let Err(err) = reconciler.reconcile(&mut stats).await {
        warn!(error = %err, "final reconciliation failed");
    }
    if let Err(err) = reconciler.liquidate(&mut stats).await {
        warn!(error = %err, "final liquidation failed");
    }

    match exchange.account().await {
        Ok(account) => {
            let final_base = account.free_balance(&base_asset);
            let final_quote = account.free_balance(&quote_asset);
            stats.finalize(final_base, final_quote);
        }
        Err(err) => {
            warn!(error = %err, "final balance query failed");
            stats.finalize(stats.initial_base_balance, stats.initial_quote_balance);
        }
    }

    match engine_result {
        Ok(()) => Ok(stats),
        Err(err @ EngineError::Submission(_))
        | Err(err @ EngineError::Config(_))
        | Err(err @ EngineError::Connectivity(_)) => Err(RunFailure {
            error: anyhow!(err).context("pair engine run"),
            stats,
        }),
    }
}
