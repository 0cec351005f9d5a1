//! Trailing stop-loss state machine.
//!
//! `TrailingStop` is reset to `Inactive` whenever a position opens. Once the
//! unrealized move in the position's favor reaches the activation level it
//! becomes `Active`, and from then on every mark proposes a candidate stop at
//! `distance` behind the price. The ledger only accepts candidates that are
//! strictly more favorable than the current stop, so the stop never loosens.

use crate::domain::errors::ConfigError;
use crate::domain::trading::types::{Position, PositionSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingKind {
    /// Levels expressed in ticks
    Points,
    /// Levels expressed in percent of the entry (activation) or mark (distance) price
    Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingStopLossConfig {
    #[serde(rename = "type")]
    pub kind: TrailingKind,
    pub activation_level: Decimal,
    pub distance: Decimal,
}

impl TrailingStopLossConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.activation_level < Decimal::ZERO {
            return Err(ConfigError::invalid(
                "strategy.trailing_stop_loss.activation_level",
                format!("must not be negative, got {}", self.activation_level),
            ));
        }
        if self.distance <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "strategy.trailing_stop_loss.distance",
                format!("must be positive, got {}", self.distance),
            ));
        }
        Ok(())
    }

    fn is_reached(&self, position: &Position, mark: Decimal, tick_size: Decimal) -> bool {
        let gain = position.favorable_move(mark);
        match self.kind {
            TrailingKind::Points => gain >= self.activation_level * tick_size,
            TrailingKind::Percent => {
                position.entry_price > Decimal::ZERO
                    && gain / position.entry_price * Decimal::ONE_HUNDRED >= self.activation_level
            }
        }
    }

    fn candidate(&self, side: PositionSide, mark: Decimal, tick_size: Decimal) -> Decimal {
        let gap = match self.kind {
            TrailingKind::Points => self.distance * tick_size,
            TrailingKind::Percent => mark * self.distance / Decimal::ONE_HUNDRED,
        };
        mark - side.direction() * gap
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TrailingStop {
    /// Activation level not reached yet for the open position
    #[default]
    Inactive,
    /// Trailing engaged; `best_price` is the most favorable mark seen
    Active { best_price: Decimal },
}

impl TrailingStop {
    pub fn is_active(&self) -> bool {
        matches!(self, TrailingStop::Active { .. })
    }

    /// Reset when a position opens or closes
    pub fn reset(&mut self) {
        *self = TrailingStop::Inactive;
    }

    /// Feed a new mark price. Returns the candidate stop price once trailing is active.
    pub fn on_mark(
        &mut self,
        config: &TrailingStopLossConfig,
        position: &Position,
        mark: Decimal,
        tick_size: Decimal,
    ) -> Option<Decimal> {
        match self {
            TrailingStop::Inactive => {
                if !config.is_reached(position, mark, tick_size) {
                    return None;
                }
                *self = TrailingStop::Active { best_price: mark };
            }
            TrailingStop::Active { best_price } => {
                let better = match position.side {
                    PositionSide::Long => mark > *best_price,
                    PositionSide::Short => mark < *best_price,
                };
                if better {
                    *best_price = mark;
                }
            }
        }

        match self {
            TrailingStop::Active { best_price } => {
                Some(config.candidate(position.side, *best_price, tick_size))
            }
            TrailingStop::Inactive => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn points(activation: Decimal, distance: Decimal) -> TrailingStopLossConfig {
        TrailingStopLossConfig {
            kind: TrailingKind::Points,
            activation_level: activation,
            distance,
        }
    }

    #[test]
    fn test_inactive_until_activation_level() {
        let config = points(dec!(500), dec!(200));
        let position = Position::new(PositionSide::Long, dec!(1), dec!(100), 0, dec!(0));
        let mut stop = TrailingStop::default();

        assert_eq!(stop.on_mark(&config, &position, dec!(104), dec!(0.01)), None);
        assert!(!stop.is_active());

        assert_eq!(
            stop.on_mark(&config, &position, dec!(105), dec!(0.01)),
            Some(dec!(103))
        );
        assert!(stop.is_active());
    }

    #[test]
    fn test_candidate_never_loosens_for_long() {
        let config = points(dec!(0), dec!(200));
        let position = Position::new(PositionSide::Long, dec!(1), dec!(100), 0, dec!(0));
        let mut stop = TrailingStop::default();

        let marks = [dec!(101), dec!(106), dec!(103), dec!(104), dec!(110), dec!(90)];
        let mut previous = Decimal::MIN;
        for mark in marks {
            if let Some(candidate) = stop.on_mark(&config, &position, mark, dec!(0.01)) {
                assert!(candidate >= previous);
                previous = candidate;
            }
        }
        assert_eq!(previous, dec!(108));
    }

    #[test]
    fn test_percent_short_trails_below() {
        let config = TrailingStopLossConfig {
            kind: TrailingKind::Percent,
            activation_level: dec!(1),
            distance: dec!(2),
        };
        let position = Position::new(PositionSide::Short, dec!(1), dec!(100), 0, dec!(0));
        let mut stop = TrailingStop::default();

        assert_eq!(stop.on_mark(&config, &position, dec!(99.5), dec!(0.01)), None);
        assert_eq!(
            stop.on_mark(&config, &position, dec!(95), dec!(0.01)),
            Some(dec!(96.9))
        );
        // price bounces back up: candidate stays at the best mark
        assert_eq!(
            stop.on_mark(&config, &position, dec!(97), dec!(0.01)),
            Some(dec!(96.9))
        );
    }

    #[test]
    fn test_reset() {
        let mut stop = TrailingStop::Active {
            best_price: dec!(100),
        };
        stop.reset();
        assert_eq!(stop, TrailingStop::Inactive);
    }
}
