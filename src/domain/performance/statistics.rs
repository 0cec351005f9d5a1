use crate::domain::trading::types::Trade;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use statrs::statistics::{Data, Distribution};

/// Descriptive statistics of one evaluation.
///
/// Trades are classified on their net profit (after fees). Percentages are in
/// percent, e.g. a 55% win rate is `55.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradingStatistics {
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    pub total_net_profit: Decimal,
    pub total_return_pct: f64,
    pub total_fees: Decimal,

    // Trade Statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,

    // Profit Metrics
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub profit_factor: f64,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub average_trade_duration: f64,
    pub max_trade_duration: i64,

    // Consecutive Trades
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,

    // Balance curve
    /// Largest peak-to-trough decline of the balance, as a positive percent
    pub max_drawdown_pct: f64,
    /// Mean over standard deviation of step-to-step balance returns (not annualized)
    pub sharpe_ratio: f64,
}

impl TradingStatistics {
    pub fn calculate(trades: &[Trade], balance_history: &[Decimal], initial_balance: Decimal) -> Self {
        let final_balance = balance_history.last().copied().unwrap_or(initial_balance);
        let total_net_profit = final_balance - initial_balance;
        let total_return_pct = if initial_balance > Decimal::ZERO {
            (total_net_profit / initial_balance * Decimal::ONE_HUNDRED)
                .to_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let winning: Vec<Decimal> = trades
            .iter()
            .filter(|t| t.is_win())
            .map(|t| t.net_pnl())
            .collect();
        let losing: Vec<Decimal> = trades
            .iter()
            .filter(|t| t.is_loss())
            .map(|t| t.net_pnl())
            .collect();
        let total_trades = trades.len();

        let win_rate = if total_trades > 0 {
            (winning.len() as f64 / total_trades as f64) * 100.0
        } else {
            0.0
        };

        let gross_profit: Decimal = winning.iter().sum();
        let gross_loss: Decimal = losing.iter().sum();

        let profit_factor = if gross_loss < Decimal::ZERO {
            gross_profit.to_f64().unwrap_or(0.0) / gross_loss.abs().to_f64().unwrap_or(1.0)
        } else if gross_profit > Decimal::ZERO {
            f64::INFINITY
        } else {
            0.0
        };

        let average_win = if winning.is_empty() {
            Decimal::ZERO
        } else {
            gross_profit / Decimal::from(winning.len())
        };
        let average_loss = if losing.is_empty() {
            Decimal::ZERO
        } else {
            gross_loss / Decimal::from(losing.len())
        };

        let average_trade_duration = if total_trades > 0 {
            trades.iter().map(|t| t.duration as f64).sum::<f64>() / total_trades as f64
        } else {
            0.0
        };

        let (max_consecutive_wins, max_consecutive_losses) = Self::consecutive_streaks(trades);

        Self {
            initial_balance,
            final_balance,
            total_net_profit,
            total_return_pct,
            total_fees: trades.iter().map(|t| t.fees).sum(),
            total_trades,
            winning_trades: winning.len(),
            losing_trades: losing.len(),
            win_rate,
            gross_profit,
            gross_loss,
            profit_factor,
            average_win,
            average_loss,
            largest_win: winning.iter().copied().max().unwrap_or(Decimal::ZERO),
            largest_loss: losing.iter().copied().min().unwrap_or(Decimal::ZERO),
            average_trade_duration,
            max_trade_duration: trades.iter().map(|t| t.duration).max().unwrap_or(0),
            max_consecutive_wins,
            max_consecutive_losses,
            max_drawdown_pct: Self::max_drawdown(initial_balance, balance_history),
            sharpe_ratio: Self::sharpe_ratio(&Self::returns(balance_history)),
        }
    }

    fn consecutive_streaks(trades: &[Trade]) -> (usize, usize) {
        let mut max_wins = 0;
        let mut max_losses = 0;
        let mut wins = 0;
        let mut losses = 0;

        for trade in trades {
            if trade.is_win() {
                wins += 1;
                losses = 0;
            } else if trade.is_loss() {
                losses += 1;
                wins = 0;
            } else {
                wins = 0;
                losses = 0;
            }
            max_wins = max_wins.max(wins);
            max_losses = max_losses.max(losses);
        }

        (max_wins, max_losses)
    }

    fn max_drawdown(initial_balance: Decimal, balance_history: &[Decimal]) -> f64 {
        let mut max_dd = 0.0;
        let mut peak = initial_balance;

        for &balance in balance_history {
            if balance > peak {
                peak = balance;
            }

            if peak > Decimal::ZERO {
                let drawdown_pct = (peak - balance)
                    .checked_div(peak)
                    .and_then(|d| d.to_f64())
                    .unwrap_or(0.0)
                    * 100.0;
                if drawdown_pct > max_dd {
                    max_dd = drawdown_pct;
                }
            }
        }

        max_dd.min(100.0)
    }

    fn returns(balance_history: &[Decimal]) -> Vec<f64> {
        balance_history
            .windows(2)
            .filter_map(|w| {
                let prev = w[0].to_f64()?;
                let curr = w[1].to_f64()?;
                (prev > 0.0).then(|| (curr - prev) / prev)
            })
            .collect()
    }

    fn sharpe_ratio(returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }

        let data = Data::new(returns.to_vec());
        match (data.mean(), data.std_dev()) {
            (Some(mean), Some(std_dev)) if std_dev > 1e-12 => mean / std_dev,
            _ => 0.0,
        }
    }
}
