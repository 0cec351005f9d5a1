use crate::domain::errors::ConfigError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short. Multiplies a price move into a signed profit.
    pub fn direction(&self) -> Decimal {
        match self {
            PositionSide::Long => Decimal::ONE,
            PositionSide::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    TakeProfit,
    StopLoss,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::TakeProfit => write!(f, "TAKE_PROFIT"),
            OrderType::StopLoss => write!(f, "STOP_LOSS"),
        }
    }
}

/// Position-state inputs appended to the vision after the indicator values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionInfo {
    Type,
    Pnl,
    Duration,
}

/// Why a position left the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    Decision,
    TakeProfit,
    StopLoss,
    Liquidation,
    RestDay,
    MaximumDuration,
    EndOfWindow,
}

impl From<OrderType> for CloseReason {
    fn from(order_type: OrderType) -> Self {
        match order_type {
            OrderType::TakeProfit => CloseReason::TakeProfit,
            OrderType::StopLoss => CloseReason::StopLoss,
        }
    }
}

/// Instrument description, as configured in the `[symbol]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub asset: String,
    /// Currency the instrument is quoted in
    pub base: String,
    /// Price precision; one tick (point) is `10^-decimal_places`
    pub decimal_places: u32,
    /// Account-currency value of a one unit price move for one lot
    pub point_value: Decimal,
    pub min_lot_size: Decimal,
    pub max_lot_size: Decimal,
    pub lot_size_step: Decimal,
    #[serde(default)]
    pub commission_per_lot: Decimal,
    /// Currency the commission is charged in
    pub commission_base: String,
}

impl SymbolInfo {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("symbol.point_value", self.point_value),
            ("symbol.min_lot_size", self.min_lot_size),
            ("symbol.max_lot_size", self.max_lot_size),
            ("symbol.lot_size_step", self.lot_size_step),
        ];
        for (field, value) in positive {
            if value <= Decimal::ZERO {
                return Err(ConfigError::invalid(field, format!("must be positive, got {}", value)));
            }
        }
        if self.min_lot_size > self.max_lot_size {
            return Err(ConfigError::invalid(
                "symbol.min_lot_size",
                format!("{} exceeds max_lot_size {}", self.min_lot_size, self.max_lot_size),
            ));
        }
        if self.commission_per_lot < Decimal::ZERO {
            return Err(ConfigError::invalid(
                "symbol.commission_per_lot",
                format!("must not be negative, got {}", self.commission_per_lot),
            ));
        }
        if self.decimal_places > 10 {
            return Err(ConfigError::invalid(
                "symbol.decimal_places",
                format!("must be at most 10, got {}", self.decimal_places),
            ));
        }
        Ok(())
    }

    /// Smallest price increment
    pub fn tick_size(&self) -> Decimal {
        Decimal::new(1, self.decimal_places)
    }

    pub fn points_to_price(&self, points: Decimal) -> Decimal {
        points * self.tick_size()
    }
}

/// Money conversions in effect for the current step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PnlContext {
    pub point_value: Decimal,
    /// Quote currency to account currency rate
    pub conversion_rate: Decimal,
}

impl PnlContext {
    pub fn new(point_value: Decimal, conversion_rate: Decimal) -> Self {
        Self {
            point_value,
            conversion_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub entry_date: i64,
    /// Unrealized profit at the last mark
    pub pnl: Decimal,
    /// Fees charged by the entry fill, realized at close
    pub entry_fees: Decimal,
}

impl Position {
    pub fn new(
        side: PositionSide,
        size: Decimal,
        entry_price: Decimal,
        entry_date: i64,
        entry_fees: Decimal,
    ) -> Self {
        Self {
            side,
            size,
            entry_price,
            entry_date,
            pnl: Decimal::ZERO,
            entry_fees,
        }
    }

    /// Profit of the position if it were closed at `price`.
    pub fn pnl_at(&self, price: Decimal, ctx: &PnlContext) -> Decimal {
        (price - self.entry_price)
            * self.side.direction()
            * self.size
            * ctx.point_value
            * ctx.conversion_rate
    }

    /// Price distance from entry, positive when in the position's favor
    pub fn favorable_move(&self, price: Decimal) -> Decimal {
        (price - self.entry_price) * self.side.direction()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub side: PositionSide,
    pub order_type: OrderType,
    pub price: Decimal,
}

impl Order {
    /// Whether a bar spanning `[low, high]` reaches the trigger price.
    pub fn is_triggered(&self, high: Decimal, low: Decimal) -> bool {
        match (self.side, self.order_type) {
            (PositionSide::Long, OrderType::TakeProfit)
            | (PositionSide::Short, OrderType::StopLoss) => high >= self.price,
            (PositionSide::Long, OrderType::StopLoss)
            | (PositionSide::Short, OrderType::TakeProfit) => low <= self.price,
        }
    }
}

/// Closed position, immutable once appended to the trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: PositionSide,
    pub entry_date: i64,
    pub exit_date: i64,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub size: Decimal,
    /// Gross realized profit, before fees
    pub pnl: Decimal,
    pub pnl_percent: f64,
    pub pnl_net_percent: f64,
    /// Entry plus exit fees
    pub fees: Decimal,
    /// Number of candles between entry and exit
    pub duration: i64,
    pub closed: bool,
    pub reason: CloseReason,
}

impl Trade {
    pub fn net_pnl(&self) -> Decimal {
        self.pnl - self.fees
    }

    pub fn is_win(&self) -> bool {
        self.net_pnl() > Decimal::ZERO
    }

    pub fn is_loss(&self) -> bool {
        self.net_pnl() < Decimal::ZERO
    }
}

pub(crate) fn percent_of(amount: Decimal, balance: Decimal) -> f64 {
    if balance <= Decimal::ZERO {
        return 0.0;
    }
    (amount / balance * Decimal::ONE_HUNDRED)
        .to_f64()
        .unwrap_or(0.0)
}
