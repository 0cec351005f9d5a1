//! Trading rules from the `[strategy]` section.

use crate::domain::errors::ConfigError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::trading_schedule::TradingSchedule;
use crate::domain::risk::take_profit_stop_loss::TakeProfitStopLossConfig;
use crate::domain::risk::trailing_stop::TrailingStopLossConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Primary timeframe: one simulation step per candle of this timeframe
    pub timeframe: Timeframe,
    /// Fraction of the balance risked down to the stop-loss (0.01 = 1%)
    pub risk_per_trade: Decimal,
    pub maximum_trades_per_day: Option<u32>,
    /// Largest candle spread, in points, at which a trade may be made
    pub maximum_spread: Option<Decimal>,
    /// Steps a position must stay open before the agent may close it
    pub minimum_trade_duration: Option<u32>,
    /// Steps after which an open position is force-closed
    pub maximum_trade_duration: Option<u32>,
    /// Cooldown in steps after a close before a new entry is allowed
    pub minimum_duration_before_next_trade: Option<u32>,
    #[serde(default = "default_true")]
    pub can_close_trade: bool,
    #[serde(default = "default_true")]
    pub can_open_long_trade: bool,
    #[serde(default = "default_true")]
    pub can_open_short_trade: bool,
    pub take_profit_stop_loss: TakeProfitStopLossConfig,
    pub trailing_stop_loss: Option<TrailingStopLossConfig>,
    pub trading_schedule: Option<TradingSchedule>,
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.risk_per_trade <= Decimal::ZERO || self.risk_per_trade > Decimal::ONE {
            return Err(ConfigError::invalid(
                "strategy.risk_per_trade",
                format!("must be within (0, 1], got {}", self.risk_per_trade),
            ));
        }
        if self.maximum_trades_per_day == Some(0) {
            return Err(ConfigError::invalid(
                "strategy.maximum_trades_per_day",
                "must be at least 1",
            ));
        }
        if let Some(spread) = self.maximum_spread
            && spread < Decimal::ZERO
        {
            return Err(ConfigError::invalid(
                "strategy.maximum_spread",
                format!("must not be negative, got {}", spread),
            ));
        }
        if self.maximum_trade_duration == Some(0) {
            return Err(ConfigError::invalid(
                "strategy.maximum_trade_duration",
                "must be at least 1",
            ));
        }
        if let (Some(min), Some(max)) = (self.minimum_trade_duration, self.maximum_trade_duration)
            && min > max
        {
            return Err(ConfigError::invalid(
                "strategy.minimum_trade_duration",
                format!("{} exceeds maximum_trade_duration {}", min, max),
            ));
        }
        if !self.can_open_long_trade && !self.can_open_short_trade {
            return Err(ConfigError::invalid(
                "strategy.can_open_long_trade",
                "at least one of long or short entries must be allowed",
            ));
        }

        self.take_profit_stop_loss.validate()?;
        if let Some(trailing) = &self.trailing_stop_loss {
            trailing.validate()?;
        }
        if let Some(schedule) = &self.trading_schedule {
            schedule.validate()?;
        }
        Ok(())
    }
}
