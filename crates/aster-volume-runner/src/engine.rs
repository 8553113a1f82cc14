/*
[INPUT]:  Exchange capability, engine settings, stop controller
[OUTPUT]: Executed paired rounds with compensation and statistics
[POS]:    Core layer - pair execution engine
[UPDATE]: When round flow or classification rules change
*/

use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use aster_spot_adapter::{
    AsterError, BookTicker, OrderAck, OrderState, Side, SpotExchange, SymbolFilters, TimeInForce,
};

use crate::config::EngineTuning;
use crate::pricing;
use crate::stats::RunStats;
use crate::stop::StopController;

/// Ceiling on how long both submissions may take together.
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempts per status/balance query before degrading.
const QUERY_ATTEMPTS: u32 = 3;

/// Backoff between query retries.
const QUERY_BACKOFF: Duration = Duration::from_millis(200);

/// Fatal engine errors; anything else is handled inside the round loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("order submission failed: {0}")]
    Submission(AsterError),

    #[error("exchange connectivity lost: {0}")]
    Connectivity(AsterError),

    #[error("configuration rejected: {0}")]
    Config(String),
}

/// How one round resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Both legs filled in full inside the monitor window.
    BothFilled,
    /// One leg filled, the other was cancelled and compensated.
    OneSideCompensated,
    /// Both legs filled partially; both shortfalls compensated.
    BothPartialCompensated,
    /// Neither leg traded; both cancelled, nothing to compensate.
    BothCancelled,
    /// Statuses were unavailable; resolved from the balance delta.
    BalanceInferred { compensated: bool },
    /// Free balance could not cover the round quantity.
    InsufficientBalance,
}

impl RoundOutcome {
    /// Rounds that moved volume count as completed.
    pub fn is_completed(self) -> bool {
        matches!(
            self,
            RoundOutcome::BothFilled
                | RoundOutcome::OneSideCompensated
                | RoundOutcome::BothPartialCompensated
                | RoundOutcome::BalanceInferred { compensated: true }
        )
    }
}

/// Static settings for one engine run.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub quantity: Decimal,
    pub rounds: u64,
    pub interval: Duration,
    /// Which leg leads the stagger.
    pub sell_first: bool,
    pub tuning: EngineTuning,
}

/// Split a concatenated symbol into base and quote assets.
pub fn split_symbol(symbol: &str) -> (String, String) {
    const QUOTES: [&str; 4] = ["USDT", "USDC", "USD", "BTC"];
    for quote in QUOTES {
        if let Some(base) = symbol.strip_suffix(quote) {
            if !base.is_empty() {
                return (base.to_string(), quote.to_string());
            }
        }
    }
    // Unrecognized quote: assume the last four characters.
    let cut = symbol.len().saturating_sub(4);
    (symbol[..cut].to_string(), symbol[cut..].to_string())
}

/// Pair execution engine: one buy and one sell per round, strictly
/// sequential rounds, compensation for whatever fails to fill.
pub struct PairEngine {
    exchange: Arc<dyn SpotExchange>,
    settings: EngineSettings,
    stop: StopController,
    filters: SymbolFilters,
    maker_rate: Decimal,
    taker_rate: Decimal,
    stats: RunStats,
}

async fn retry_query<T, Fut>(mut op: impl FnMut() -> Fut) -> Result<T, AsterError>
where
    Fut: Future<Output = Result<T, AsterError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < QUERY_ATTEMPTS => {
                attempt += 1;
                debug!(error = %err, attempt, "query failed, retrying");
                tokio::time::sleep(QUERY_BACKOFF).await;
            }
            Err(err) => return Err(err),
        }
    }
}

impl PairEngine {
    /// Fetch instrument filters and commission rates, then build the engine.
    pub async fn new(
        exchange: Arc<dyn SpotExchange>,
        settings: EngineSettings,
        stop: StopController,
    ) -> Result<Self, EngineError> {
        if settings.quantity <= Decimal::ZERO {
            return Err(EngineError::Config("quantity must be positive".to_string()));
        }

        let filters = exchange
            .symbol_filters(&settings.symbol)
            .await
            .map_err(EngineError::Connectivity)?;
        let commission = exchange
            .commission_rate(&settings.symbol)
            .await
            .map_err(EngineError::Connectivity)?;

        Ok(Self {
            exchange,
            settings,
            stop,
            filters,
            maker_rate: commission.maker_commission_rate,
            taker_rate: commission.taker_commission_rate,
            stats: RunStats::default(),
        })
    }

    /// Seed the engine with statistics carried over from earlier phases.
    pub fn set_stats(&mut self, stats: RunStats) {
        self.stats = stats;
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn into_stats(self) -> RunStats {
        self.stats
    }

    /// Run the configured number of rounds, stopping early when tripped.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        for round in 0..self.settings.rounds {
            if self.stop.is_stopping() {
                info!(round, "stop requested before round");
                break;
            }

            let outcome = self.run_round(round).await?;
            if outcome.is_completed() {
                self.stats.record_completed_round();
            } else {
                self.stats.record_failed_round();
            }
            info!(
                round,
                ?outcome,
                completed = self.stats.completed_rounds,
                failed = self.stats.failed_rounds,
                "round finished"
            );

            if self.stop.is_stopping() {
                break;
            }
            if round + 1 < self.settings.rounds {
                self.stop.interruptible_wait(self.settings.interval).await;
            }
        }
        Ok(())
    }

    async fn run_round(&mut self, round: u64) -> Result<RoundOutcome, EngineError> {
        let account = retry_query(|| self.exchange.account())
            .await
            .map_err(EngineError::Connectivity)?;
        let free_base = account.free_balance(&self.settings.base_asset);
        let pre_round_base = free_base;

        let available = free_base - self.settings.tuning.safety_margin;
        let qty = pricing::align_qty(self.settings.quantity.min(available), &self.filters);
        if qty <= Decimal::ZERO {
            warn!(%free_base, "balance cannot cover the round quantity");
            return Ok(RoundOutcome::InsufficientBalance);
        }

        let ticker = self.fetch_ticker().await?;
        let pair = pricing::derive_pair(&ticker, &self.filters, pricing::round_bias(round));
        let (sell_price, sell_qty) = pricing::enforce_min_notional(pair.sell, qty, &self.filters);
        let (buy_price, buy_qty) = pricing::enforce_min_notional(pair.buy, qty, &self.filters);

        debug!(
            round,
            %sell_price, %buy_price, %qty,
            bid = %ticker.bid_price, ask = %ticker.ask_price,
            "submitting paired orders"
        );

        let (sell_ack, buy_ack) = self
            .submit_pair(sell_price, sell_qty, buy_price, buy_qty)
            .await?;

        let monitored = self.monitor_fills(&sell_ack, &buy_ack).await;
        match monitored {
            Some((sell_state, buy_state)) => {
                self.classify_and_settle(sell_state, buy_state, &ticker).await
            }
            None => self.settle_by_balance(&sell_ack, &buy_ack, pre_round_base, &ticker).await,
        }
    }

    /// Resolve the ticker from the book, falling back to depth
    /// top-of-book when the ticker endpoint stays unavailable.
    async fn fetch_ticker(&self) -> Result<BookTicker, EngineError> {
        let symbol = &self.settings.symbol;
        match retry_query(|| self.exchange.book_ticker(symbol)).await {
            Ok(ticker) => Ok(ticker),
            Err(err) => {
                warn!(error = %err, "book ticker unavailable, falling back to depth");
                let depth = retry_query(|| self.exchange.depth(symbol, 5))
                    .await
                    .map_err(EngineError::Connectivity)?;
                match (depth.best_bid(), depth.best_ask()) {
                    (Some(bid), Some(ask)) => Ok(BookTicker {
                        symbol: symbol.clone(),
                        bid_price: bid.price(),
                        bid_qty: bid.qty(),
                        ask_price: ask.price(),
                        ask_qty: ask.qty(),
                    }),
                    _ => Err(EngineError::Connectivity(AsterError::InvalidResponse(
                        "empty depth book".to_string(),
                    ))),
                }
            }
        }
    }

    /// Submit the leading leg, then the other after a fixed stagger,
    /// joined with a timeout. A failure on either side cancels whatever
    /// was accepted and is fatal.
    async fn submit_pair(
        &self,
        sell_price: Decimal,
        sell_qty: Decimal,
        buy_price: Decimal,
        buy_qty: Decimal,
    ) -> Result<(OrderAck, OrderAck), EngineError> {
        let stagger = Duration::from_millis(self.settings.tuning.stagger_ms);
        let (sell_delay, buy_delay) = if self.settings.sell_first {
            (Duration::ZERO, stagger)
        } else {
            (stagger, Duration::ZERO)
        };

        let exchange = self.exchange.clone();
        let symbol = self.settings.symbol.clone();
        let sell_task = tokio::spawn(async move {
            tokio::time::sleep(sell_delay).await;
            exchange
                .place_limit_order(&symbol, Side::Sell, sell_qty, sell_price, TimeInForce::Gtc)
                .await
        });

        let exchange = self.exchange.clone();
        let symbol = self.settings.symbol.clone();
        let buy_task = tokio::spawn(async move {
            tokio::time::sleep(buy_delay).await;
            exchange
                .place_limit_order(&symbol, Side::Buy, buy_qty, buy_price, TimeInForce::Gtc)
                .await
        });

        let joined = tokio::time::timeout(SUBMIT_TIMEOUT, async {
            tokio::join!(sell_task, buy_task)
        })
        .await
        .map_err(|_| {
            EngineError::Submission(AsterError::Timeout {
                duration: SUBMIT_TIMEOUT.as_secs(),
            })
        })?;

        let flatten = |side: &str,
                       join: Result<Result<OrderAck, AsterError>, tokio::task::JoinError>|
         -> Result<OrderAck, AsterError> {
            match join {
                Ok(result) => result,
                Err(err) => Err(AsterError::InvalidResponse(format!(
                    "{side} submission task failed: {err}"
                ))),
            }
        };

        let sell_result = flatten("sell", joined.0);
        let buy_result = flatten("buy", joined.1);

        match (sell_result, buy_result) {
            (Ok(sell_ack), Ok(buy_ack)) => Ok((sell_ack, buy_ack)),
            (Ok(sell_ack), Err(err)) => {
                warn!(error = %err, "buy submission failed, cancelling sell");
                self.cancel_quietly(sell_ack.order_id).await;
                Err(EngineError::Submission(err))
            }
            (Err(err), Ok(buy_ack)) => {
                warn!(error = %err, "sell submission failed, cancelling buy");
                self.cancel_quietly(buy_ack.order_id).await;
                Err(EngineError::Submission(err))
            }
            (Err(err), Err(_)) => Err(EngineError::Submission(err)),
        }
    }

    /// Poll both orders through the monitor window.
    ///
    /// Returns None when statuses stay unavailable after retries, which
    /// switches the round to balance inference.
    async fn monitor_fills(
        &self,
        sell_ack: &OrderAck,
        buy_ack: &OrderAck,
    ) -> Option<(OrderState, OrderState)> {
        let symbol = &self.settings.symbol;
        let window = Duration::from_millis(self.settings.tuning.monitor_window_ms);
        let poll = Duration::from_millis(self.settings.tuning.poll_interval_ms);
        let deadline = Instant::now() + window;

        let mut latest: Option<(OrderState, OrderState)> = None;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let pause = poll.min(remaining).max(Duration::from_millis(1));
            tokio::time::sleep(pause).await;

            let sell = retry_query(|| self.exchange.query_order(symbol, sell_ack.order_id)).await;
            let buy = retry_query(|| self.exchange.query_order(symbol, buy_ack.order_id)).await;
            match (sell, buy) {
                (Ok(sell_state), Ok(buy_state)) => {
                    let both_terminal =
                        sell_state.status.is_terminal() && buy_state.status.is_terminal();
                    latest = Some((sell_state, buy_state));
                    if both_terminal {
                        break;
                    }
                }
                (sell, buy) => {
                    if let Err(err) = sell.and(buy) {
                        warn!(error = %err, "order statuses unavailable, will infer from balance");
                    }
                    return None;
                }
            }

            if Instant::now() >= deadline {
                break;
            }
        }
        latest
    }

    /// Resolve the round from the final order states.
    async fn classify_and_settle(
        &mut self,
        sell_state: OrderState,
        buy_state: OrderState,
        ticker: &BookTicker,
    ) -> Result<RoundOutcome, EngineError> {
        let sell_final = self.finalize_leg(sell_state).await;
        let buy_final = self.finalize_leg(buy_state).await;

        self.record_leg(&sell_final);
        self.record_leg(&buy_final);

        let sell_shortfall = sell_final.unfilled_qty();
        let buy_shortfall = buy_final.unfilled_qty();
        let sell_traded = !sell_final.executed_qty.is_zero();
        let buy_traded = !buy_final.executed_qty.is_zero();

        if sell_shortfall.is_zero() && buy_shortfall.is_zero() {
            return Ok(RoundOutcome::BothFilled);
        }

        if !sell_traded && !buy_traded {
            info!("neither leg traded inside the window");
            return Ok(RoundOutcome::BothCancelled);
        }

        // At least one leg traded; restore the untraded remainder with
        // market orders on the same side.
        if !buy_shortfall.is_zero() {
            self.compensate(Side::Buy, buy_shortfall, ticker.ask_price).await;
        }
        if !sell_shortfall.is_zero() {
            self.compensate(Side::Sell, sell_shortfall, ticker.bid_price).await;
        }

        if sell_traded && buy_traded && !sell_shortfall.is_zero() && !buy_shortfall.is_zero() {
            Ok(RoundOutcome::BothPartialCompensated)
        } else {
            Ok(RoundOutcome::OneSideCompensated)
        }
    }

    /// Cancel a leg that is still live and return its final state.
    async fn finalize_leg(&self, state: OrderState) -> OrderState {
        if state.status.is_terminal() {
            return state;
        }
        match self
            .exchange
            .cancel_order(&self.settings.symbol, state.order_id)
            .await
        {
            Ok(final_state) => final_state,
            Err(err) => {
                warn!(order_id = state.order_id, error = %err, "cancel failed, using last known state");
                state
            }
        }
    }

    fn record_leg(&mut self, state: &OrderState) {
        if state.executed_qty.is_zero() {
            return;
        }
        self.stats.record_fill(
            state.side == Side::Buy,
            state.cummulative_quote_qty,
            self.maker_rate,
        );
    }

    /// Market order for exactly the unfilled quantity. Sub-minimum
    /// notionals are accepted as-is; a failed order only warns.
    async fn compensate(&mut self, side: Side, qty: Decimal, reference_price: Decimal) -> bool {
        let qty = pricing::align_qty(qty, &self.filters);
        let notional = qty * reference_price;
        if qty.is_zero() || notional < self.filters.min_notional {
            debug!(%qty, %notional, "compensation below minimum notional, accepted");
            return true;
        }

        match self
            .exchange
            .place_market_order(&self.settings.symbol, side, qty)
            .await
        {
            Ok(ack) => {
                info!(order_id = ack.order_id, %side, %qty, "compensation order placed");
                self.stats.record_supplement_order();
                self.stats
                    .record_fill(side == Side::Buy, notional, self.taker_rate);
                true
            }
            Err(err) => {
                warn!(%side, %qty, error = %err, "compensation order failed");
                false
            }
        }
    }

    /// Fallback when statuses stay unavailable: cancel both legs, then
    /// infer what traded from the base-balance delta. A concurrent
    /// external transfer would be misattributed here.
    async fn settle_by_balance(
        &mut self,
        sell_ack: &OrderAck,
        buy_ack: &OrderAck,
        pre_round_base: Decimal,
        ticker: &BookTicker,
    ) -> Result<RoundOutcome, EngineError> {
        self.cancel_quietly(sell_ack.order_id).await;
        self.cancel_quietly(buy_ack.order_id).await;

        let account = retry_query(|| self.exchange.account())
            .await
            .map_err(EngineError::Connectivity)?;
        let diff = account.free_balance(&self.settings.base_asset) - pre_round_base;
        let tolerance = self.settings.tuning.drift_tolerance;

        if diff < -tolerance {
            info!(%diff, "balance dropped, buying back the difference");
            let compensated = self.compensate(Side::Buy, -diff, ticker.ask_price).await;
            Ok(RoundOutcome::BalanceInferred { compensated })
        } else if diff > tolerance {
            info!(%diff, "balance rose, selling off the difference");
            let compensated = self.compensate(Side::Sell, diff, ticker.bid_price).await;
            Ok(RoundOutcome::BalanceInferred { compensated })
        } else {
            info!(%diff, "balance unchanged, treating round as failed");
            Ok(RoundOutcome::BalanceInferred { compensated: false })
        }
    }

    async fn cancel_quietly(&self, order_id: i64) {
        if let Err(err) = self
            .exchange
            .cancel_order(&self.settings.symbol, order_id)
            .await
        {
            debug!(order_id, error = %err, "cancel attempt failed");
        }
    }
}
