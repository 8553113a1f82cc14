/*
[INPUT]:  Baseline balance, exchange capability, drift tolerances
[OUTPUT]: Corrective market orders restoring the baseline balance
[POS]:    Core layer - balance reconciliation and liquidation
[UPDATE]: When drift targets or batching rules change
*/

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use aster_spot_adapter::{Side, SpotExchange, SymbolFilters};

use crate::config::EngineTuning;
use crate::pricing;
use crate::stats::RunStats;

/// Batch count for a corrective purchase of the given quote notional.
fn batch_count(notional: Decimal) -> u32 {
    if notional < Decimal::from(60) {
        1
    } else if notional <= Decimal::from(500) {
        5
    } else {
        10
    }
}

/// Restores the base-asset balance to its run-start baseline.
///
/// Auto-purchases made to cover a round are tracked as debt: drift is
/// measured against baseline plus outstanding debt, and the final
/// liquidation sells the surplus above the bare baseline, clearing it.
pub struct Reconciler {
    exchange: Arc<dyn SpotExchange>,
    symbol: String,
    base_asset: String,
    filters: SymbolFilters,
    tuning: EngineTuning,
    taker_rate: Decimal,
    baseline_base: Decimal,
    auto_purchased: Decimal,
}

impl Reconciler {
    pub fn new(
        exchange: Arc<dyn SpotExchange>,
        symbol: String,
        base_asset: String,
        filters: SymbolFilters,
        tuning: EngineTuning,
        taker_rate: Decimal,
        baseline_base: Decimal,
    ) -> Self {
        Self {
            exchange,
            symbol,
            base_asset,
            filters,
            tuning,
            taker_rate,
            baseline_base,
            auto_purchased: Decimal::ZERO,
        }
    }

    pub fn baseline(&self) -> Decimal {
        self.baseline_base
    }

    pub fn outstanding_debt(&self) -> Decimal {
        self.auto_purchased
    }

    async fn free_base(&self) -> Result<Decimal> {
        let account = self.exchange.account().await.context("query account")?;
        Ok(account.free_balance(&self.base_asset))
    }

    async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(self.tuning.settle_delay_ms)).await;
    }

    /// Make sure one round's quantity (plus the safety margin) is free,
    /// buying the shortfall in batches and recording it as debt.
    ///
    /// The live balance is re-checked between batches so a fill from
    /// elsewhere stops the purchase early.
    pub async fn ensure_sufficient(
        &mut self,
        round_qty: Decimal,
        stats: &mut RunStats,
    ) -> Result<()> {
        let required = round_qty + self.tuning.safety_margin;
        let free = self.free_base().await?;
        if free >= required {
            return Ok(());
        }

        let shortfall = required - free;
        let ticker = self
            .exchange
            .book_ticker(&self.symbol)
            .await
            .context("query book ticker")?;
        let notional = shortfall * ticker.ask_price;
        let batches = batch_count(notional);
        let batch_qty = pricing::ceil_to_step(
            shortfall / Decimal::from(batches),
            self.filters.step_size,
        );

        info!(
            %shortfall, %notional, batches,
            "balance below round quantity, auto-purchasing"
        );

        for batch in 0..batches {
            let free = self.free_base().await?;
            if free >= required {
                debug!(batch, %free, "balance sufficient, stopping purchase early");
                break;
            }

            let remaining = pricing::ceil_to_step(required - free, self.filters.step_size);
            let qty = batch_qty.min(remaining);
            if qty.is_zero() {
                break;
            }

            let ack = self
                .exchange
                .place_market_order(&self.symbol, Side::Buy, qty)
                .await
                .context("auto-purchase order")?;
            info!(order_id = ack.order_id, %qty, batch, "auto-purchase batch placed");

            self.auto_purchased += qty;
            stats.record_supplement_order();
            stats.record_fill(true, qty * ticker.ask_price, self.taker_rate);

            self.settle().await;
        }

        Ok(())
    }

    /// Correct drift against baseline plus outstanding debt with single
    /// market orders, up to the attempt ceiling. Already within tolerance
    /// means zero orders.
    pub async fn reconcile(&mut self, stats: &mut RunStats) -> Result<()> {
        let target = self.baseline_base + self.auto_purchased;
        let tolerance = self.tuning.drift_tolerance;

        for attempt in 0..self.tuning.max_reconcile_attempts {
            let current = self.free_base().await?;
            let drift = current - target;
            if drift.abs() <= tolerance {
                debug!(%drift, attempt, "balance within tolerance");
                return Ok(());
            }

            let ticker = self
                .exchange
                .book_ticker(&self.symbol)
                .await
                .context("query book ticker")?;
            let qty = pricing::align_qty(drift.abs(), &self.filters);
            let (side, reference_price) = if drift > Decimal::ZERO {
                (Side::Sell, ticker.bid_price)
            } else {
                (Side::Buy, ticker.ask_price)
            };

            if qty.is_zero() || qty * reference_price < self.filters.min_notional {
                info!(%drift, "corrective order below minimum notional, drift accepted");
                return Ok(());
            }

            match self
                .exchange
                .place_market_order(&self.symbol, side, qty)
                .await
            {
                Ok(ack) => {
                    info!(order_id = ack.order_id, %side, %qty, %drift, attempt, "corrective order placed");
                    stats.record_supplement_order();
                    stats.record_fill(side == Side::Buy, qty * reference_price, self.taker_rate);
                }
                Err(err) => {
                    warn!(%side, %qty, error = %err, "corrective order failed");
                }
            }

            self.settle().await;
        }

        let current = self.free_base().await?;
        warn!(
            drift = %(current - target),
            attempts = self.tuning.max_reconcile_attempts,
            "reconciliation attempt ceiling reached"
        );
        Ok(())
    }

    /// Sell the surplus above the bare baseline in notional-sized batches,
    /// clearing the auto-purchase debt. Sub-minimum batches are dust and
    /// stay on the account.
    pub async fn liquidate(&mut self, stats: &mut RunStats) -> Result<()> {
        let current = self.free_base().await?;
        let surplus = pricing::align_qty(current - self.baseline_base, &self.filters);
        if surplus <= Decimal::ZERO {
            self.auto_purchased = Decimal::ZERO;
            return Ok(());
        }

        let ticker = self
            .exchange
            .book_ticker(&self.symbol)
            .await
            .context("query book ticker")?;
        let notional = surplus * ticker.bid_price;
        let batches = batch_count(notional);
        let batch_qty = pricing::floor_to_step(
            surplus / Decimal::from(batches),
            self.filters.step_size,
        );

        info!(%surplus, %notional, batches, "liquidating surplus above baseline");

        let mut remaining = surplus;
        for batch in 0..batches {
            if remaining.is_zero() {
                break;
            }
            let qty = if batch + 1 == batches {
                remaining
            } else {
                batch_qty.min(remaining)
            };
            if qty.is_zero() || qty * ticker.bid_price < self.filters.min_notional {
                debug!(%qty, batch, "batch below minimum notional, left as dust");
                break;
            }

            match self
                .exchange
                .place_market_order(&self.symbol, Side::Sell, qty)
                .await
            {
                Ok(ack) => {
                    info!(order_id = ack.order_id, %qty, batch, "liquidation batch placed");
                    stats.record_supplement_order();
                    stats.record_fill(false, qty * ticker.bid_price, self.taker_rate);
                    remaining -= qty;
                }
                Err(err) => {
                    warn!(%qty, batch, error = %err, "liquidation batch failed");
                    break;
                }
            }

            self.settle().await;
        }

        self.auto_purchased = Decimal::ZERO;
        Ok(())
    }
}
