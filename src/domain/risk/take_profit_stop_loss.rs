//! Take-profit / stop-loss price resolution.
//!
//! Each level is resolved once, when a position opens, from one of four
//! offset kinds. Only the trailing stop may move the stop-loss afterwards.

use crate::domain::errors::{ConfigError, DataError};
use crate::domain::market::candle::Candle;
use crate::domain::trading::types::{OrderType, PositionSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Distance of a take-profit or stop-loss level from the entry price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PriceOffset {
    /// Fixed number of ticks
    Points { points: Decimal },
    /// Percent of the entry price
    Percent { percent: Decimal },
    /// Lowest low / highest high of the last `period` candles
    Extremum { period: usize },
    /// Multiple of the Average True Range
    Atr { period: usize, multiplier: Decimal },
}

impl PriceOffset {
    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        match self {
            PriceOffset::Points { points } if *points <= Decimal::ZERO => {
                Err(ConfigError::invalid(field, format!("points must be positive, got {}", points)))
            }
            PriceOffset::Percent { percent }
                if *percent <= Decimal::ZERO || *percent >= Decimal::ONE_HUNDRED =>
            {
                Err(ConfigError::invalid(
                    field,
                    format!("percent must be within (0, 100), got {}", percent),
                ))
            }
            PriceOffset::Extremum { period: 0 } | PriceOffset::Atr { period: 0, .. } => {
                Err(ConfigError::invalid(field, "period must be at least 1"))
            }
            PriceOffset::Atr { multiplier, .. } if *multiplier <= Decimal::ZERO => Err(
                ConfigError::invalid(field, format!("multiplier must be positive, got {}", multiplier)),
            ),
            _ => Ok(()),
        }
    }

    /// ATR period this offset needs computed before resolution, if any
    pub fn atr_period(&self) -> Option<usize> {
        match self {
            PriceOffset::Atr { period, .. } => Some(*period),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitStopLossConfig {
    pub take_profit: PriceOffset,
    pub stop_loss: PriceOffset,
}

impl TakeProfitStopLossConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.take_profit
            .validate("strategy.take_profit_stop_loss.take_profit")?;
        self.stop_loss
            .validate("strategy.take_profit_stop_loss.stop_loss")
    }

    pub fn offset(&self, order_type: OrderType) -> &PriceOffset {
        match order_type {
            OrderType::TakeProfit => &self.take_profit,
            OrderType::StopLoss => &self.stop_loss,
        }
    }
}

/// Market context available when a level is resolved.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub entry_price: Decimal,
    pub tick_size: Decimal,
    /// Primary timeframe window, oldest first, ending at the entry candle
    pub candles: &'a [Candle],
    /// ATR value for the offset's period, when the offset is ATR based
    pub atr: Option<Decimal>,
}

/// Trigger price of a `order_type` order protecting a `side` position.
pub fn resolve_price(
    offset: &PriceOffset,
    order_type: OrderType,
    side: PositionSide,
    ctx: &ResolutionContext<'_>,
) -> Result<Decimal, DataError> {
    // +1 when the level sits above the entry price
    let above = match (side, order_type) {
        (PositionSide::Long, OrderType::TakeProfit) | (PositionSide::Short, OrderType::StopLoss) => {
            Decimal::ONE
        }
        (PositionSide::Long, OrderType::StopLoss) | (PositionSide::Short, OrderType::TakeProfit) => {
            Decimal::NEGATIVE_ONE
        }
    };

    let price = match offset {
        PriceOffset::Points { points } => ctx.entry_price + above * *points * ctx.tick_size,
        PriceOffset::Percent { percent } => {
            ctx.entry_price * (Decimal::ONE + above * *percent / Decimal::ONE_HUNDRED)
        }
        PriceOffset::Extremum { period } => {
            let start = ctx.candles.len().saturating_sub(*period);
            let window = &ctx.candles[start..];
            let extremum = if above > Decimal::ZERO {
                window.iter().map(|c| c.high).max()
            } else {
                window.iter().map(|c| c.low).min()
            };
            extremum.ok_or_else(|| DataError::EmptyWindow {
                what: "extremum".to_string(),
            })?
        }
        PriceOffset::Atr { period, multiplier } => {
            let atr = ctx
                .atr
                .ok_or_else(|| DataError::Indicator(format!("ATR({}) not available", period)))?;
            ctx.entry_price + above * atr * *multiplier
        }
    };

    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(high: Decimal, low: Decimal) -> Candle {
        Candle {
            date: 0,
            open: low,
            high,
            low,
            close: high,
            tick_volume: dec!(0),
            volume: dec!(0),
            spread: dec!(0),
        }
    }

    fn ctx(candles: &[Candle]) -> ResolutionContext<'_> {
        ResolutionContext {
            entry_price: dec!(100),
            tick_size: dec!(0.01),
            candles,
            atr: Some(dec!(2)),
        }
    }

    #[test]
    fn test_points_offset() {
        let offset = PriceOffset::Points { points: dec!(500) };
        let long_tp = resolve_price(&offset, OrderType::TakeProfit, PositionSide::Long, &ctx(&[]));
        let short_tp = resolve_price(&offset, OrderType::TakeProfit, PositionSide::Short, &ctx(&[]));

        assert_eq!(long_tp.unwrap(), dec!(105));
        assert_eq!(short_tp.unwrap(), dec!(95));
    }

    #[test]
    fn test_percent_offset() {
        let offset = PriceOffset::Percent { percent: dec!(2) };
        let long_sl = resolve_price(&offset, OrderType::StopLoss, PositionSide::Long, &ctx(&[]));
        let short_sl = resolve_price(&offset, OrderType::StopLoss, PositionSide::Short, &ctx(&[]));

        assert_eq!(long_sl.unwrap(), dec!(98));
        assert_eq!(short_sl.unwrap(), dec!(102));
    }

    #[test]
    fn test_extremum_uses_lookback_window() {
        let candles = vec![
            candle(dec!(120), dec!(80)),
            candle(dec!(104), dec!(97)),
            candle(dec!(103), dec!(99)),
        ];
        let offset = PriceOffset::Extremum { period: 2 };

        let sl = resolve_price(&offset, OrderType::StopLoss, PositionSide::Long, &ctx(&candles));
        let tp = resolve_price(&offset, OrderType::TakeProfit, PositionSide::Long, &ctx(&candles));

        assert_eq!(sl.unwrap(), dec!(97));
        assert_eq!(tp.unwrap(), dec!(104));
    }

    #[test]
    fn test_atr_offset_requires_value() {
        let offset = PriceOffset::Atr {
            period: 14,
            multiplier: dec!(1.5),
        };
        let tp = resolve_price(&offset, OrderType::TakeProfit, PositionSide::Long, &ctx(&[]));
        assert_eq!(tp.unwrap(), dec!(103));

        let missing = ResolutionContext {
            atr: None,
            ..ctx(&[])
        };
        assert!(matches!(
            resolve_price(&offset, OrderType::TakeProfit, PositionSide::Long, &missing),
            Err(DataError::Indicator(_))
        ));
    }

    #[test]
    fn test_validation() {
        assert!(PriceOffset::Points { points: dec!(0) }.validate("tp").is_err());
        assert!(PriceOffset::Extremum { period: 0 }.validate("tp").is_err());
        assert!(PriceOffset::Percent { percent: dec!(1.5) }.validate("tp").is_ok());
    }
}
