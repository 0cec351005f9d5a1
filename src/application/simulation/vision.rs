//! Encoding of the market and position state presented to the decision source.

use crate::domain::market::candle::IndicatorsData;
use crate::domain::trading::types::{Position, PositionInfo, PositionSide};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Position state needed by the position-info encodings
#[derive(Debug, Clone, Copy)]
pub struct PositionView<'a> {
    pub position: Option<&'a Position>,
    pub duration: u32,
    pub balance: Decimal,
}

/// Indicator values in ascending timeframe then id order, followed by one
/// value per configured position info. Every value lies in `[0, 1]`.
pub fn build_vision(
    indicators: &IndicatorsData,
    position_infos: &[PositionInfo],
    view: PositionView<'_>,
) -> Vec<f64> {
    let mut vision: Vec<f64> = indicators
        .values()
        .flat_map(|values| values.values().copied())
        .collect();
    vision.extend(position_infos.iter().map(|info| encode(*info, view)));
    vision
}

fn encode(info: PositionInfo, view: PositionView<'_>) -> f64 {
    match info {
        PositionInfo::Type => match view.position.map(|p| p.side) {
            None => 0.5,
            Some(PositionSide::Long) => 1.0,
            Some(PositionSide::Short) => 0.0,
        },
        PositionInfo::Pnl => {
            let percent = match view.position {
                Some(position) if view.balance > Decimal::ZERO => {
                    (position.pnl / view.balance * Decimal::ONE_HUNDRED)
                        .to_f64()
                        .unwrap_or(0.0)
                }
                _ => 0.0,
            };
            0.5 * (1.0 + percent.tanh())
        }
        PositionInfo::Duration => {
            let duration = view.duration as f64;
            duration / (duration + 1.0)
        }
    }
}
