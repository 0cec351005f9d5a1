//! Fitness and score of a finished evaluation.
//!
//! Fitness starts from the balance growth factor (final / initial balance)
//! and is multiplied by one penalty per violated evaluation target. A penalty
//! is `exp(-shortfall / target)`, so it tends to 1 near the target and decays
//! smoothly with the relative shortfall. Score is a monotone transform of
//! fitness used to rank agents.

use crate::domain::errors::ConfigError;
use crate::domain::performance::statistics::TradingStatistics;
use crate::domain::trading::types::Trade;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DAYS_PER_MONTH: f64 = 30.4375;
const DAYS_PER_YEAR: f64 = 365.25;

/// Objective targets from the `[evaluation]` section. Returns, drawdown and
/// win rate are in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub maximize_nb_trades: Option<bool>,
    pub minimum_nb_trades: Option<usize>,
    /// In candles
    pub maximum_trade_duration: Option<i64>,
    pub expected_return_per_day: Option<f64>,
    pub expected_return_per_month: Option<f64>,
    /// Per year
    pub expected_return: Option<f64>,
    pub maximum_drawdown: Option<f64>,
    pub minimum_winrate: Option<f64>,
    pub minimum_profit_factor: Option<f64>,
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("evaluation.expected_return_per_day", self.expected_return_per_day),
            ("evaluation.expected_return_per_month", self.expected_return_per_month),
            ("evaluation.expected_return", self.expected_return),
            ("evaluation.maximum_drawdown", self.maximum_drawdown),
            ("evaluation.minimum_winrate", self.minimum_winrate),
            ("evaluation.minimum_profit_factor", self.minimum_profit_factor),
        ];
        for (field, value) in positive {
            if let Some(v) = value
                && !(v.is_finite() && v > 0.0)
            {
                return Err(ConfigError::invalid(field, format!("must be positive, got {}", v)));
            }
        }
        if let Some(v) = self.minimum_winrate
            && v > 100.0
        {
            return Err(ConfigError::invalid(
                "evaluation.minimum_winrate",
                format!("must not exceed 100, got {}", v),
            ));
        }
        if self.minimum_nb_trades == Some(0) {
            return Err(ConfigError::invalid("evaluation.minimum_nb_trades", "must be at least 1"));
        }
        if let Some(v) = self.maximum_trade_duration
            && v <= 0
        {
            return Err(ConfigError::invalid(
                "evaluation.maximum_trade_duration",
                format!("must be positive, got {}", v),
            ));
        }
        Ok(())
    }
}

/// Closed history of one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub trades: &'a [Trade],
    pub balance_history: &'a [Decimal],
    pub initial_balance: Decimal,
    /// Calendar length of the replayed window
    pub period_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitnessReport {
    pub fitness: f64,
    pub score: f64,
    /// Every metric and multiplier that went into the fitness
    pub details: BTreeMap<String, f64>,
    pub statistics: TradingStatistics,
}

pub struct FitnessEvaluator;

impl FitnessEvaluator {
    pub fn evaluate(config: &EvaluationConfig, input: &EvaluationInput<'_>) -> FitnessReport {
        let statistics = TradingStatistics::calculate(
            input.trades,
            input.balance_history,
            input.initial_balance,
        );
        let mut details = BTreeMap::new();

        let growth = Self::growth(&statistics);
        details.insert("growth".to_string(), growth);
        let mut fitness = growth;

        if config.maximize_nb_trades == Some(true) {
            let bonus = (1.0 + statistics.total_trades as f64).ln() + 1.0;
            details.insert("nb_trades_bonus".to_string(), bonus);
            fitness *= bonus;
        }

        if let Some(minimum) = config.minimum_nb_trades {
            let factor = Self::floor_penalty(statistics.total_trades as f64, minimum as f64);
            details.insert("minimum_nb_trades_penalty".to_string(), factor);
            fitness *= factor;
        }

        if let Some(minimum) = config.minimum_winrate {
            let factor = Self::floor_penalty(statistics.win_rate, minimum);
            details.insert("minimum_winrate_penalty".to_string(), factor);
            fitness *= factor;
        }

        if let Some(minimum) = config.minimum_profit_factor {
            let factor = Self::floor_penalty(statistics.profit_factor, minimum);
            details.insert("minimum_profit_factor_penalty".to_string(), factor);
            fitness *= factor;
        }

        let expected_returns = [
            ("return_per_day", config.expected_return_per_day, 1.0),
            ("return_per_month", config.expected_return_per_month, DAYS_PER_MONTH),
            ("return_per_year", config.expected_return, DAYS_PER_YEAR),
        ];
        for (name, expected, days_per_period) in expected_returns {
            let Some(expected) = expected else { continue };
            let actual = Self::compounded_return(growth, input.period_days, days_per_period);
            let factor = Self::floor_penalty(actual, expected);
            details.insert(name.to_string(), actual);
            details.insert(format!("expected_{}_penalty", name), factor);
            fitness *= factor;
        }

        if let Some(maximum) = config.maximum_drawdown {
            let factor = Self::ceiling_penalty(statistics.max_drawdown_pct, maximum);
            details.insert("maximum_drawdown_penalty".to_string(), factor);
            fitness *= factor;
        }

        if let Some(maximum) = config.maximum_trade_duration {
            let factor =
                Self::ceiling_penalty(statistics.max_trade_duration as f64, maximum as f64);
            details.insert("maximum_trade_duration_penalty".to_string(), factor);
            fitness *= factor;
        }

        details.insert("nb_trades".to_string(), statistics.total_trades as f64);
        details.insert("winrate".to_string(), statistics.win_rate);
        details.insert("max_drawdown".to_string(), statistics.max_drawdown_pct);
        details.insert("profit_factor".to_string(), statistics.profit_factor);

        let fitness = if fitness.is_finite() { fitness.max(0.0) } else { 0.0 };

        FitnessReport {
            fitness,
            score: Self::score(fitness),
            details,
            statistics,
        }
    }

    /// Ranking transform of a fitness value
    pub fn score(fitness: f64) -> f64 {
        100.0 * (1.0 + fitness.max(0.0)).ln()
    }

    fn growth(statistics: &TradingStatistics) -> f64 {
        if statistics.initial_balance <= Decimal::ZERO {
            return 0.0;
        }
        (statistics.final_balance / statistics.initial_balance)
            .to_f64()
            .unwrap_or(0.0)
            .max(0.0)
    }

    /// Return in percent per period of `days_per_period` days, compounded over the window.
    fn compounded_return(growth: f64, period_days: f64, days_per_period: f64) -> f64 {
        if period_days <= 0.0 || growth <= 0.0 {
            return -100.0;
        }
        let periods = period_days / days_per_period;
        (growth.powf(1.0 / periods) - 1.0) * 100.0
    }

    /// Penalty for falling short of a minimum target
    fn floor_penalty(actual: f64, target: f64) -> f64 {
        if actual >= target || target <= 0.0 {
            1.0
        } else {
            (-(target - actual) / target).exp()
        }
    }

    /// Penalty for exceeding a maximum target
    fn ceiling_penalty(actual: f64, target: f64) -> f64 {
        if actual <= target || target <= 0.0 {
            1.0
        } else {
            (-(actual - target) / target).exp()
        }
    }
}
