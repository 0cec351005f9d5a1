use crate::domain::trading::types::SymbolInfo;
use rust_decimal::Decimal;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct SizingRequest {
    pub balance: Decimal,
    /// Fraction of the balance lost if the stop-loss is hit
    pub risk_per_trade: Decimal,
    pub entry_price: Decimal,
    pub stop_loss_price: Decimal,
    pub leverage: Decimal,
    pub conversion_rate: Decimal,
}

pub struct PositionSizer;

impl PositionSizer {
    /// Lot size risking `risk_per_trade` of the balance down to the stop-loss.
    ///
    /// The size is floored to the lot step, clamped to the symbol's lot limits
    /// and capped so that the required margin never exceeds the balance.
    /// Returns `None` when not even the minimum lot fits.
    pub fn calculate_size(symbol: &SymbolInfo, request: &SizingRequest) -> Option<Decimal> {
        if request.balance <= Decimal::ZERO || request.entry_price <= Decimal::ZERO {
            return None;
        }

        let value_per_lot = symbol.point_value * request.conversion_rate;
        let risk_amount = request.balance * request.risk_per_trade;
        let risk_per_lot = (request.entry_price - request.stop_loss_price).abs() * value_per_lot;

        let raw = if risk_per_lot > Decimal::ZERO {
            risk_amount / risk_per_lot
        } else {
            symbol.max_lot_size
        };
        let mut size = Self::floor_to_step(raw, symbol.lot_size_step)
            .max(symbol.min_lot_size)
            .min(symbol.max_lot_size);

        let margin_per_lot = request.entry_price * value_per_lot / request.leverage;
        if margin_per_lot > Decimal::ZERO {
            let affordable =
                Self::floor_to_step(request.balance / margin_per_lot, symbol.lot_size_step);
            if affordable < size {
                debug!(
                    "PositionSizer: capped size by margin {} -> {}",
                    size, affordable
                );
                size = affordable;
            }
        }

        if size < symbol.min_lot_size || size <= Decimal::ZERO {
            debug!(
                "PositionSizer: balance {} cannot cover the minimum lot {}",
                request.balance, symbol.min_lot_size
            );
            return None;
        }
        Some(size)
    }

    fn floor_to_step(size: Decimal, step: Decimal) -> Decimal {
        if step <= Decimal::ZERO {
            return size;
        }
        (size / step).floor() * step
    }
}
