/*
[INPUT]:  Per-round execution results
[OUTPUT]: Cumulative run statistics persisted on the task record
[POS]:    Accounting layer - volumes, fees and round counters
[UPDATE]: When tracking new execution metrics
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cumulative statistics for one task run.
///
/// Quote-denominated fields use the symbol's quote asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub completed_rounds: u64,
    pub failed_rounds: u64,
    /// Corrective market orders placed by compensation and reconciliation.
    pub supplement_orders: u64,
    pub buy_volume_quote: Decimal,
    pub sell_volume_quote: Decimal,
    pub total_fees_quote: Decimal,
    pub initial_base_balance: Decimal,
    pub final_base_balance: Decimal,
    pub initial_quote_balance: Decimal,
    pub final_quote_balance: Decimal,
    /// Quote spent minus quote recovered across the whole run.
    pub net_loss_quote: Decimal,
}

impl RunStats {
    pub fn record_completed_round(&mut self) {
        self.completed_rounds += 1;
    }

    pub fn record_failed_round(&mut self) {
        self.failed_rounds += 1;
    }

    pub fn record_supplement_order(&mut self) {
        self.supplement_orders += 1;
    }

    /// Record traded quote volume and the fee charged on it.
    pub fn record_fill(&mut self, is_buy: bool, quote_volume: Decimal, fee_rate: Decimal) {
        if is_buy {
            self.buy_volume_quote += quote_volume;
        } else {
            self.sell_volume_quote += quote_volume;
        }
        self.total_fees_quote += quote_volume * fee_rate;
    }

    /// Close out the run: capture final balances and derive net loss.
    pub fn finalize(&mut self, final_base: Decimal, final_quote: Decimal) {
        self.final_base_balance = final_base;
        self.final_quote_balance = final_quote;
        self.net_loss_quote = self.initial_quote_balance - self.final_quote_balance;
    }

    pub fn total_volume_quote(&self) -> Decimal {
        self.buy_volume_quote + self.sell_volume_quote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn decimal(value: &str) -> Decimal {
        Decimal::from_str(value).expect("valid decimal")
    }

    #[test]
    fn fills_accumulate_volume_and_fees() {
        let mut stats = RunStats::default();
        stats.record_fill(true, decimal("70"), decimal("0.001"));
        stats.record_fill(false, decimal("70"), decimal("0.001"));

        assert_eq!(stats.buy_volume_quote, decimal("70"));
        assert_eq!(stats.sell_volume_quote, decimal("70"));
        assert_eq!(stats.total_fees_quote, decimal("0.14"));
        assert_eq!(stats.total_volume_quote(), decimal("140"));
    }

    #[test]
    fn finalize_derives_net_loss_from_quote_delta() {
        let mut stats = RunStats {
            initial_quote_balance: decimal("1000"),
            ..RunStats::default()
        };
        stats.finalize(decimal("10"), decimal("998.6"));

        assert_eq!(stats.net_loss_quote, decimal("1.4"));
        assert_eq!(stats.final_base_balance, decimal("10"));
    }
}
