use crate::domain::errors::LedgerError;
use crate::domain::trading::types::{
    CloseReason, Order, OrderType, PnlContext, Position, PositionSide, Trade, percent_of,
};
use rust_decimal::Decimal;
use serde::Serialize;

/// Exit fill handed to [`Ledger::close`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exit {
    pub price: Decimal,
    pub date: i64,
    pub fees: Decimal,
    pub reason: CloseReason,
}

/// Single-position account book.
///
/// Owns the realized balance, the open position (at most one), the pending
/// take-profit/stop-loss orders scoped to that position, and the append-only
/// trade history. Orders never outlive their position: every close clears them.
#[derive(Debug, Clone, Serialize)]
pub struct Ledger {
    balance: Decimal,
    position: Option<Position>,
    orders: Vec<Order>,
    trades: Vec<Trade>,
    candle_seconds: i64,
}

impl Ledger {
    pub fn new(initial_balance: Decimal, candle_seconds: i64) -> Self {
        Self {
            balance: initial_balance,
            position: None,
            orders: Vec::new(),
            trades: Vec::new(),
            candle_seconds: candle_seconds.max(1),
        }
    }

    /// Realized balance. Only changes when a position closes.
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Balance plus the unrealized profit of the open position at its last mark
    pub fn equity(&self) -> Decimal {
        self.balance + self.position.as_ref().map_or(Decimal::ZERO, |p| p.pnl)
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn open(&mut self, position: Position) -> Result<(), LedgerError> {
        if self.position.is_some() {
            return Err(LedgerError::PositionAlreadyOpen);
        }
        if position.size <= Decimal::ZERO {
            return Err(LedgerError::InvalidSize(position.size));
        }
        self.orders.clear();
        self.position = Some(position);
        Ok(())
    }

    /// Attach a conditional order to the open position, replacing any order of the same type.
    pub fn place_order(&mut self, order_type: OrderType, price: Decimal) -> Result<(), LedgerError> {
        let side = self.require_position()?.side;
        self.orders.retain(|o| o.order_type != order_type);
        self.orders.push(Order {
            side,
            order_type,
            price,
        });
        Ok(())
    }

    pub fn stop_loss(&self) -> Option<&Order> {
        self.orders
            .iter()
            .find(|o| o.order_type == OrderType::StopLoss)
    }

    /// Move the stop-loss to `candidate` only if that is strictly more favorable
    /// for the position holder. Returns the new trigger price when it moved.
    pub fn tighten_stop_loss(&mut self, candidate: Decimal) -> Result<Option<Decimal>, LedgerError> {
        let side = self.require_position()?.side;
        let improves = match self.stop_loss() {
            None => true,
            Some(current) => match side {
                PositionSide::Long => candidate > current.price,
                PositionSide::Short => candidate < current.price,
            },
        };
        if !improves {
            return Ok(None);
        }
        self.place_order(OrderType::StopLoss, candidate)?;
        Ok(Some(candidate))
    }

    /// Recompute the unrealized profit of the open position at `price`.
    pub fn mark(&mut self, price: Decimal, ctx: &PnlContext) -> Result<Decimal, LedgerError> {
        let position = self.position.as_mut().ok_or(LedgerError::NoOpenPosition)?;
        position.pnl = position.pnl_at(price, ctx);
        Ok(position.pnl)
    }

    /// First pending order reached by a bar spanning `[low, high]`.
    ///
    /// When both orders are reached within the same bar the stop-loss wins,
    /// since the intrabar path is unknown.
    pub fn triggered_order(&self, high: Decimal, low: Decimal) -> Option<Order> {
        let mut hit = self.orders.iter().filter(|o| o.is_triggered(high, low));
        let first = hit.next().copied()?;
        if first.order_type == OrderType::StopLoss {
            return Some(first);
        }
        Some(
            hit.find(|o| o.order_type == OrderType::StopLoss)
                .copied()
                .unwrap_or(first),
        )
    }

    /// Close the open position: realize its profit net of fees, drop every pending
    /// order and append the resulting trade to the history.
    pub fn close(&mut self, exit: Exit, ctx: &PnlContext) -> Result<Trade, LedgerError> {
        let position = self.position.take().ok_or(LedgerError::NoOpenPosition)?;
        self.orders.clear();

        let pnl = position.pnl_at(exit.price, ctx);
        let fees = position.entry_fees + exit.fees;
        let balance_at_entry = self.balance;

        let trade = Trade {
            side: position.side,
            entry_date: position.entry_date,
            exit_date: exit.date.max(position.entry_date),
            entry_price: position.entry_price,
            exit_price: exit.price,
            size: position.size,
            pnl,
            pnl_percent: percent_of(pnl, balance_at_entry),
            pnl_net_percent: percent_of(pnl - fees, balance_at_entry),
            fees,
            duration: (exit.date - position.entry_date).max(0) / self.candle_seconds,
            closed: true,
            reason: exit.reason,
        };

        self.balance += pnl - fees;
        self.trades.push(trade.clone());
        Ok(trade)
    }

    fn require_position(&self) -> Result<&Position, LedgerError> {
        self.position.as_ref().ok_or(LedgerError::NoOpenPosition)
    }
}
