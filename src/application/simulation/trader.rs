//! Per-candle trading state machine for one agent.
//!
//! A [`Trader`] owns its ledger, counters and histories. It reads a shared,
//! immutable [`Config`] and is driven one primary-timeframe candle at a time
//! through [`Trader::step`]. Nothing outside `step` (and the end-of-window
//! close) mutates trading state.

use crate::application::simulation::vision::{PositionView, build_vision};
use crate::config::Config;
use crate::domain::errors::{ConfigError, DataError, LedgerError, SimulationError};
use crate::domain::market::candle::{Candle, CandleWindows, IndicatorsData};
use crate::domain::performance::fitness::{EvaluationInput, FitnessEvaluator, FitnessReport};
use crate::domain::ports::{DecisionSource, IndicatorProvider};
use crate::domain::risk::position_sizing::{PositionSizer, SizingRequest};
use crate::domain::risk::take_profit_stop_loss::{ResolutionContext, resolve_price};
use crate::domain::risk::trailing_stop::TrailingStop;
use crate::domain::trading::fee_model::{FeeModel, LotCommissionFeeModel};
use crate::domain::trading::ledger::{Exit, Ledger};
use crate::domain::trading::types::{CloseReason, OrderType, PnlContext, Position, PositionSide, Trade};
use crate::infrastructure::indicators::IndicatorKind;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Market data for one step
#[derive(Debug, Clone)]
pub struct StepInput<'a> {
    /// Windows per timeframe; the last primary-timeframe candle is the one closing now
    pub candles: CandleWindows<'a>,
    pub indicators: &'a IndicatorsData,
    /// Quote-to-account currency rate in effect at this candle
    pub conversion_rate: Decimal,
    /// Marks the open position instead of the candle close when set
    pub mark_price: Option<Decimal>,
}

/// Decision applied by [`Trader::trade`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeOutcome {
    Wait,
    OpenedLong,
    OpenedShort,
    Closed,
}

impl TradeOutcome {
    pub fn code(&self) -> u8 {
        match self {
            TradeOutcome::Wait => 0,
            TradeOutcome::OpenedLong => 1,
            TradeOutcome::OpenedShort => 2,
            TradeOutcome::Closed => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Long,
    Short,
    Close,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathReason {
    BadTrader,
    Inactive,
}

impl fmt::Display for DeathReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeathReason::BadTrader => write!(f, "balance below bad trader threshold"),
            DeathReason::Inactive => write!(f, "inactive for too long"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StepResult {
    /// Trade closed during this step, whatever the reason
    pub closed: Option<Trade>,
    pub outcome: Option<TradeOutcome>,
    pub liquidated: bool,
    pub dead: bool,
}

/// Counters and clock of a trader
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraderState {
    pub current_date: Option<i64>,
    pub first_date: Option<i64>,
    pub current_day: Option<NaiveDate>,
    pub last_candle: Option<Candle>,
    pub conversion_rate: Decimal,
    /// Steps since entry of the open position, 0 when flat
    pub duration_in_position: u32,
    /// Cooldown before the next entry, counts down to 0
    pub duration_without_trade: u32,
    /// Flat steps since the last entry, drives the inactivity check
    pub steps_without_entry: u32,
    pub nb_trades_today: u32,
    /// Steps processed so far
    pub lifespan: u32,
    pub dead: bool,
    pub death: Option<DeathReason>,
}

pub struct Trader {
    config: Arc<Config>,
    source: Box<dyn DecisionSource>,
    fee_model: Box<dyn FeeModel>,
    ledger: Ledger,
    trailing: TrailingStop,
    state: TraderState,
    vision: Vec<f64>,
    decisions: Vec<f64>,
    balance_history: Vec<Decimal>,
    equity_history: Vec<Decimal>,
}

impl fmt::Debug for Trader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trader")
            .field("ledger", &self.ledger)
            .field("state", &self.state)
            .field("fee_model", &self.fee_model.description())
            .finish()
    }
}

impl Trader {
    pub fn new(config: Arc<Config>, source: Box<dyn DecisionSource>) -> Result<Self, ConfigError> {
        config.validate()?;
        let fee_model = LotCommissionFeeModel::for_symbol(&config.symbol, &config.general.account_currency);
        let ledger = Ledger::new(
            config.general.initial_balance,
            config.strategy.timeframe.to_seconds(),
        );
        Ok(Self {
            source,
            fee_model: Box::new(fee_model),
            ledger,
            trailing: TrailingStop::default(),
            state: TraderState {
                conversion_rate: Decimal::ONE,
                ..TraderState::default()
            },
            vision: Vec::new(),
            decisions: Vec::new(),
            balance_history: Vec::new(),
            equity_history: Vec::new(),
            config,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn state(&self) -> &TraderState {
        &self.state
    }

    pub fn is_dead(&self) -> bool {
        self.state.dead
    }

    pub fn trailing_stop(&self) -> &TrailingStop {
        &self.trailing
    }

    pub fn vision(&self) -> &[f64] {
        &self.vision
    }

    pub fn decisions(&self) -> &[f64] {
        &self.decisions
    }

    /// Realized balance, one sample per step
    pub fn balance_history(&self) -> &[Decimal] {
        &self.balance_history
    }

    /// Mark-to-market equity, one sample per step
    pub fn equity_history(&self) -> &[Decimal] {
        &self.equity_history
    }

    /// Advance by one primary-timeframe candle.
    pub fn step(&mut self, input: &StepInput<'_>) -> Result<StepResult, SimulationError> {
        if self.state.dead {
            return Ok(StepResult {
                dead: true,
                ..StepResult::default()
            });
        }

        let candle = self.primary_candle(input)?.clone();
        self.update(&candle, input.conversion_rate);

        let mut result = StepResult::default();
        if self.ledger.has_position() {
            let ctx = self.pnl_context();
            let mark = input.mark_price.unwrap_or(candle.close);
            self.ledger.mark(mark, &ctx)?;

            if let Some(trade) = self.check_liquidation(&candle)? {
                result.closed = Some(trade);
                result.liquidated = true;
            } else {
                self.update_trailing_stop_loss(mark)?;
                result.closed = self.check_open_orders(&candle)?;
            }
        }

        if result.closed.is_none()
            && let Some(trade) = self.check_forced_close(&candle)?
        {
            result.closed = Some(trade);
        }

        if self.can_trade() {
            self.look(input);
            self.think();
            let (outcome, closed) = self.execute_decision(input)?;
            if closed.is_some() {
                result.closed = closed;
            }
            result.outcome = Some(outcome);
        }

        self.check_liveness();
        result.dead = self.state.dead;

        self.balance_history.push(self.ledger.balance());
        self.equity_history.push(self.ledger.equity());
        Ok(result)
    }

    /// Day rollover, clock and duration counters.
    fn update(&mut self, candle: &Candle, conversion_rate: Decimal) {
        let day = candle.day();
        if self.state.current_day != Some(day) {
            self.state.nb_trades_today = 0;
            self.state.current_day = Some(day);
        }

        self.state.current_date = Some(candle.date);
        self.state.first_date.get_or_insert(candle.date);
        self.state.last_candle = Some(candle.clone());
        self.state.conversion_rate = conversion_rate;

        if self.ledger.has_position() {
            self.state.duration_in_position += 1;
        } else {
            self.state.duration_without_trade = self.state.duration_without_trade.saturating_sub(1);
            self.state.steps_without_entry += 1;
        }
        self.state.lifespan += 1;
    }

    /// Build the vision vector from the step's indicators and the position state.
    pub fn look(&mut self, input: &StepInput<'_>) {
        let view = PositionView {
            position: self.ledger.position(),
            duration: self.state.duration_in_position,
            balance: self.ledger.balance(),
        };
        self.vision = build_vision(input.indicators, &self.config.training.inputs.position, view);
    }

    pub fn think(&mut self) {
        self.decisions = self.source.decide(&self.vision);
    }

    /// Whether a decision may be executed this step. Has no side effects.
    pub fn can_trade(&self) -> bool {
        let strategy = &self.config.strategy;
        let Some(candle) = &self.state.last_candle else {
            return false;
        };
        if self.state.dead {
            return false;
        }
        if let Some(maximum) = strategy.maximum_spread
            && candle.spread > maximum
        {
            return false;
        }
        if let Some(schedule) = &strategy.trading_schedule
            && !schedule.allows_timestamp(candle.date)
        {
            return false;
        }
        if self.ledger.has_position() {
            return strategy.can_close_trade;
        }
        if let Some(maximum) = strategy.maximum_trades_per_day
            && self.state.nb_trades_today >= maximum
        {
            return false;
        }
        self.state.duration_without_trade == 0
    }

    /// Apply the latest decision vector. Performs at most one ledger mutation.
    pub fn trade(&mut self, input: &StepInput<'_>) -> Result<TradeOutcome, SimulationError> {
        self.execute_decision(input).map(|(outcome, _)| outcome)
    }

    /// Outcome of the latest decision, with the trade it closed if any.
    fn execute_decision(
        &mut self,
        input: &StepInput<'_>,
    ) -> Result<(TradeOutcome, Option<Trade>), SimulationError> {
        if !self.can_trade() {
            return Ok((TradeOutcome::Wait, None));
        }
        let can_open_long = self.config.strategy.can_open_long_trade;
        let can_open_short = self.config.strategy.can_open_short_trade;
        let has_position = self.ledger.has_position();

        match self.decision() {
            Decision::Long if !has_position && can_open_long => self
                .open_position_by_market(PositionSide::Long, input)
                .map(|outcome| (outcome, None)),
            Decision::Short if !has_position && can_open_short => self
                .open_position_by_market(PositionSide::Short, input)
                .map(|outcome| (outcome, None)),
            Decision::Close if has_position && self.minimum_duration_reached() => {
                let price = self.market_exit_price()?;
                let trade = self.close_position(price, CloseReason::Decision)?;
                Ok((TradeOutcome::Closed, Some(trade)))
            }
            _ => Ok((TradeOutcome::Wait, None)),
        }
    }

    /// Close any open position at the last close. Every trade in history is closed afterwards.
    pub fn close_open_position_at_end(&mut self) -> Result<Option<Trade>, SimulationError> {
        if !self.ledger.has_position() {
            return Ok(None);
        }
        let price = self.market_exit_price()?;
        let trade = self.close_position(price, CloseReason::EndOfWindow)?;
        if let Some(last) = self.balance_history.last_mut() {
            *last = self.ledger.balance();
        }
        if let Some(last) = self.equity_history.last_mut() {
            *last = self.ledger.equity();
        }
        Ok(Some(trade))
    }

    pub fn evaluate(&self) -> FitnessReport {
        let period_seconds = match (self.state.first_date, self.state.current_date) {
            (Some(first), Some(last)) => (last - first) as f64,
            _ => 0.0,
        };
        let candle_days = self.config.strategy.timeframe.to_seconds() as f64 / SECONDS_PER_DAY;
        let input = EvaluationInput {
            trades: self.ledger.trades(),
            balance_history: &self.balance_history,
            initial_balance: self.config.general.initial_balance,
            period_days: (period_seconds / SECONDS_PER_DAY).max(candle_days),
        };
        FitnessEvaluator::evaluate(&self.config.evaluation, &input)
    }

    /// Arg-max of `[long, short, close]`. A tie at the maximum holds.
    fn decision(&self) -> Decision {
        let outputs = &self.decisions[..self.decisions.len().min(3)];
        let (index, value) = outputs.iter().copied().enumerate().fold(
            (None, f64::NEG_INFINITY),
            |(best, best_value), (i, v)| {
                if v > best_value { (Some(i), v) } else { (best, best_value) }
            },
        );
        if value < self.config.training.decision_threshold() {
            return Decision::Hold;
        }
        if outputs.iter().filter(|v| **v == value).count() > 1 {
            return Decision::Hold;
        }
        match index {
            Some(0) => Decision::Long,
            Some(1) => Decision::Short,
            Some(2) => Decision::Close,
            _ => Decision::Hold,
        }
    }

    fn minimum_duration_reached(&self) -> bool {
        self.config
            .strategy
            .minimum_trade_duration
            .is_none_or(|minimum| self.state.duration_in_position >= minimum)
    }

    fn open_position_by_market(
        &mut self,
        side: PositionSide,
        input: &StepInput<'_>,
    ) -> Result<TradeOutcome, SimulationError> {
        let candle = self.primary_candle(input)?.clone();
        let window = input
            .candles
            .get(&self.config.strategy.timeframe)
            .copied()
            .unwrap_or_default();
        let symbol = &self.config.symbol;
        let tpsl = &self.config.strategy.take_profit_stop_loss;

        let entry_price = match side {
            PositionSide::Long => self.ask(&candle),
            PositionSide::Short => candle.close,
        };
        let atr_period = tpsl
            .take_profit
            .atr_period()
            .or_else(|| tpsl.stop_loss.atr_period());
        let atr = match atr_period {
            Some(period) => Some(latest_atr(window, period)?),
            None => None,
        };
        let resolution = ResolutionContext {
            entry_price,
            tick_size: symbol.tick_size(),
            candles: window,
            atr,
        };
        let stop_loss = resolve_price(tpsl.offset(OrderType::StopLoss), OrderType::StopLoss, side, &resolution)?;
        let take_profit =
            resolve_price(tpsl.offset(OrderType::TakeProfit), OrderType::TakeProfit, side, &resolution)?;

        let protective = match side {
            PositionSide::Long => stop_loss < entry_price && take_profit > entry_price,
            PositionSide::Short => stop_loss > entry_price && take_profit < entry_price,
        };
        if !protective {
            debug!(
                "Skipping {} entry at {}: stop loss {} / take profit {} on the wrong side",
                side, entry_price, stop_loss, take_profit
            );
            return Ok(TradeOutcome::Wait);
        }

        let request = SizingRequest {
            balance: self.ledger.balance(),
            risk_per_trade: self.config.strategy.risk_per_trade,
            entry_price,
            stop_loss_price: stop_loss,
            leverage: self.config.general.leverage,
            conversion_rate: self.state.conversion_rate,
        };
        let Some(size) = PositionSizer::calculate_size(symbol, &request) else {
            return Ok(TradeOutcome::Wait);
        };

        let fees = self.fee_model.fill_fee(size, self.state.conversion_rate);
        self.ledger
            .open(Position::new(side, size, entry_price, candle.date, fees))?;
        self.ledger.place_order(OrderType::TakeProfit, take_profit)?;
        self.ledger.place_order(OrderType::StopLoss, stop_loss)?;

        self.trailing.reset();
        self.state.duration_in_position = 0;
        self.state.steps_without_entry = 0;
        self.state.nb_trades_today += 1;

        debug!(
            side = %side,
            price = %entry_price,
            size = %size,
            take_profit = %take_profit,
            stop_loss = %stop_loss,
            "Opened position"
        );
        Ok(match side {
            PositionSide::Long => TradeOutcome::OpenedLong,
            PositionSide::Short => TradeOutcome::OpenedShort,
        })
    }

    fn close_position(&mut self, price: Decimal, reason: CloseReason) -> Result<Trade, SimulationError> {
        let size = self
            .ledger
            .position()
            .map(|p| p.size)
            .ok_or(LedgerError::NoOpenPosition)?;
        let exit = Exit {
            price,
            date: self.state.current_date.unwrap_or_default(),
            fees: self.fee_model.fill_fee(size, self.state.conversion_rate),
            reason,
        };
        let trade = self.ledger.close(exit, &self.pnl_context())?;

        self.trailing.reset();
        self.state.duration_in_position = 0;
        self.state.duration_without_trade = self
            .config
            .strategy
            .minimum_duration_before_next_trade
            .unwrap_or(0);

        debug!(
            side = %trade.side,
            price = %price,
            size = %trade.size,
            pnl = %trade.pnl,
            reason = ?reason,
            "Closed position"
        );
        Ok(trade)
    }

    /// Force-close at the bar's worst price once equity there falls to the stop-out level.
    fn check_liquidation(&mut self, candle: &Candle) -> Result<Option<Trade>, SimulationError> {
        let Some(position) = self.ledger.position() else {
            return Ok(None);
        };
        let ctx = self.pnl_context();
        let worst = match position.side {
            PositionSide::Long => candle.low,
            PositionSide::Short => candle.high,
        };
        let equity = self.ledger.balance() + position.pnl_at(worst, &ctx);
        let required_margin = position.size * position.entry_price * ctx.point_value * ctx.conversion_rate
            / self.config.general.leverage;
        if equity > required_margin * self.config.general.stop_out_level {
            return Ok(None);
        }

        warn!(
            side = %position.side,
            price = %worst,
            equity = %equity,
            margin = %required_margin,
            "Position liquidated"
        );
        self.close_position(worst, CloseReason::Liquidation).map(Some)
    }

    fn update_trailing_stop_loss(&mut self, mark: Decimal) -> Result<(), SimulationError> {
        let (Some(config), Some(position)) =
            (&self.config.strategy.trailing_stop_loss, self.ledger.position())
        else {
            return Ok(());
        };
        let tick_size = self.config.symbol.tick_size();
        let Some(candidate) = self.trailing.on_mark(config, position, mark, tick_size) else {
            return Ok(());
        };
        if let Some(price) = self.ledger.tighten_stop_loss(candidate)? {
            debug!(price = %price, "Trailing stop loss moved");
        }
        Ok(())
    }

    fn check_open_orders(&mut self, candle: &Candle) -> Result<Option<Trade>, SimulationError> {
        let Some(order) = self.ledger.triggered_order(candle.high, candle.low) else {
            return Ok(None);
        };
        debug!(order_type = %order.order_type, price = %order.price, "Order triggered");
        self.close_position(order.price, order.order_type.into()).map(Some)
    }

    /// Maximum duration and pre-rest-period closes.
    fn check_forced_close(&mut self, candle: &Candle) -> Result<Option<Trade>, SimulationError> {
        if !self.ledger.has_position() {
            return Ok(None);
        }
        let strategy = &self.config.strategy;
        let reason = if strategy
            .maximum_trade_duration
            .is_some_and(|maximum| self.state.duration_in_position >= maximum)
        {
            CloseReason::MaximumDuration
        } else if strategy.trading_schedule.as_ref().is_some_and(|schedule| {
            !schedule.allows_timestamp(candle.date + strategy.timeframe.to_seconds())
        }) {
            CloseReason::RestDay
        } else {
            return Ok(None);
        };
        let price = self.market_exit_price()?;
        self.close_position(price, reason).map(Some)
    }

    fn check_liveness(&mut self) {
        let training = &self.config.training;
        let initial = self.config.general.initial_balance;

        let bad = training.bad_trader_threshold.is_some_and(|threshold| {
            let floor = initial * Decimal::from_f64(threshold).unwrap_or(Decimal::ZERO);
            self.ledger.balance() < floor
        });
        let inactive = training
            .inactive_trader_threshold
            .is_some_and(|threshold| self.state.steps_without_entry >= threshold);

        let reason = if bad {
            DeathReason::BadTrader
        } else if inactive {
            DeathReason::Inactive
        } else {
            return;
        };
        self.state.dead = true;
        self.state.death = Some(reason);
        info!(
            "Trader died after {} steps: {} (balance {})",
            self.state.lifespan,
            reason,
            self.ledger.balance()
        );
    }

    fn primary_candle<'a>(&self, input: &StepInput<'a>) -> Result<&'a Candle, DataError> {
        let timeframe = self.config.strategy.timeframe;
        input
            .candles
            .get(&timeframe)
            .copied()
            .ok_or(DataError::MissingTimeframe(timeframe))?
            .last()
            .ok_or_else(|| DataError::EmptyWindow {
                what: timeframe.to_string(),
            })
    }

    fn pnl_context(&self) -> PnlContext {
        PnlContext::new(self.config.symbol.point_value, self.state.conversion_rate)
    }

    fn ask(&self, candle: &Candle) -> Decimal {
        candle.close + self.config.symbol.points_to_price(candle.spread)
    }

    /// Bid for a long exit, ask for a short one
    fn market_exit_price(&self) -> Result<Decimal, SimulationError> {
        let candle = self
            .state
            .last_candle
            .as_ref()
            .ok_or_else(|| DataError::EmptyWindow {
                what: "market".to_string(),
            })?;
        Ok(match self.ledger.position().map(|p| p.side) {
            Some(PositionSide::Short) => self.ask(candle),
            _ => candle.close,
        })
    }
}

fn latest_atr(window: &[Candle], period: usize) -> Result<Decimal, DataError> {
    let values = IndicatorKind::Atr { period }.calculate(window, false)?;
    values
        .last()
        .and_then(|v| Decimal::from_f64(*v))
        .ok_or_else(|| DataError::Indicator(format!("ATR({}) not available", period)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use crate::domain::risk::take_profit_stop_loss::PriceOffset;
    use crate::domain::risk::trailing_stop::{TrailingKind, TrailingStopLossConfig};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    const SAMPLE: &str = include_str!("../../../config/eurusd_h1.toml");
    const HOUR: i64 = 3600;
    // 2024-01-01 00:00 UTC, a Monday
    const START: i64 = 1_704_067_200;

    fn config() -> Config {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.symbol.point_value = dec!(1);
        config.symbol.decimal_places = 0;
        config.symbol.min_lot_size = dec!(1);
        config.symbol.max_lot_size = dec!(1);
        config.symbol.lot_size_step = dec!(1);
        config.symbol.commission_per_lot = dec!(0);
        config.general.initial_balance = dec!(1000);
        config.general.leverage = dec!(100);
        config.strategy.risk_per_trade = dec!(0.5);
        config.strategy.maximum_spread = None;
        config.strategy.maximum_trades_per_day = None;
        config.strategy.minimum_trade_duration = None;
        config.strategy.maximum_trade_duration = None;
        config.strategy.minimum_duration_before_next_trade = None;
        config.strategy.trailing_stop_loss = None;
        config.strategy.take_profit_stop_loss.take_profit = PriceOffset::Points { points: dec!(10) };
        config.strategy.take_profit_stop_loss.stop_loss = PriceOffset::Points { points: dec!(5) };
        config.training.bad_trader_threshold = None;
        config.training.inactive_trader_threshold = None;
        config.training.decision_threshold = None;
        config
    }

    fn candle(date: i64, close: Decimal) -> Candle {
        Candle {
            date,
            open: close,
            high: close,
            low: close,
            close,
            tick_volume: dec!(0),
            volume: dec!(0),
            spread: dec!(0),
        }
    }

    fn input<'a>(window: &'a [Candle], indicators: &'a IndicatorsData) -> StepInput<'a> {
        let mut candles = BTreeMap::new();
        candles.insert(Timeframe::OneHour, window);
        StepInput {
            candles,
            indicators,
            conversion_rate: dec!(1),
            mark_price: None,
        }
    }

    fn scripted(decisions: Vec<Vec<f64>>) -> Box<dyn DecisionSource> {
        let mut queue = decisions.into_iter();
        Box::new(move |_: &[f64]| queue.next().unwrap_or_default())
    }

    const LONG: [f64; 3] = [1.0, 0.0, 0.0];
    const CLOSE: [f64; 3] = [0.0, 0.0, 1.0];

    #[test]
    fn test_opens_with_orders() {
        let mut trader = Trader::new(Arc::new(config()), scripted(vec![LONG.to_vec()])).unwrap();
        let indicators = BTreeMap::new();
        let window = vec![candle(START, dec!(100))];

        let result = trader.step(&input(&window, &indicators)).unwrap();

        assert_eq!(result.outcome, Some(TradeOutcome::OpenedLong));
        let position = trader.ledger().position().unwrap();
        assert_eq!(position.entry_price, dec!(100));
        assert_eq!(trader.ledger().orders().len(), 2);
        assert_eq!(trader.state().nb_trades_today, 1);
        assert_eq!(trader.state().duration_in_position, 0);
    }

    #[test]
    fn test_explicit_mark_price() {
        let mut trader = Trader::new(Arc::new(config()), scripted(vec![LONG.to_vec()])).unwrap();
        let indicators = BTreeMap::new();
        let candles: Vec<Candle> = (0..2).map(|i| candle(START + i * HOUR, dec!(100))).collect();

        trader.step(&input(&candles[..1], &indicators)).unwrap();
        let step = StepInput {
            mark_price: Some(dec!(103)),
            ..input(&candles[..2], &indicators)
        };
        trader.step(&step).unwrap();

        assert_eq!(trader.ledger().position().unwrap().pnl, dec!(3));
        assert_eq!(trader.equity_history().last(), Some(&dec!(1003)));
        assert_eq!(trader.balance_history().last(), Some(&dec!(1000)));
    }

    #[test]
    fn test_trailing_stop_follows_explicit_mark_price() {
        let mut config = config();
        config.strategy.trailing_stop_loss = Some(TrailingStopLossConfig {
            kind: TrailingKind::Points,
            activation_level: dec!(0),
            distance: dec!(2),
        });
        let mut trader = Trader::new(Arc::new(config), scripted(vec![LONG.to_vec()])).unwrap();
        let indicators = BTreeMap::new();
        let candles: Vec<Candle> = (0..2).map(|i| candle(START + i * HOUR, dec!(100))).collect();

        trader.step(&input(&candles[..1], &indicators)).unwrap();
        let step = StepInput {
            mark_price: Some(dec!(110)),
            ..input(&candles[..2], &indicators)
        };
        let result = trader.step(&step).unwrap();

        // stop trailed to 110 - 2, then reached by the bar at 100
        let trade = result.closed.unwrap();
        assert_eq!(trade.reason, CloseReason::StopLoss);
        assert_eq!(trade.exit_price, dec!(108));
    }

    #[test]
    fn test_tie_at_maximum_holds() {
        let decisions = vec![vec![0.0, 0.0, 0.0], vec![0.6, 0.6, 0.1]];
        let mut trader = Trader::new(Arc::new(config()), scripted(decisions)).unwrap();
        let indicators = BTreeMap::new();
        let candles: Vec<Candle> = (0..2).map(|i| candle(START + i * HOUR, dec!(100))).collect();

        let first = trader.step(&input(&candles[..1], &indicators)).unwrap();
        let second = trader.step(&input(&candles[..2], &indicators)).unwrap();

        assert_eq!(first.outcome, Some(TradeOutcome::Wait));
        assert_eq!(second.outcome, Some(TradeOutcome::Wait));
        assert!(!trader.ledger().has_position());
    }

    #[test]
    fn test_decision_threshold_holds() {
        let mut config = config();
        config.training.decision_threshold = Some(0.9);
        let mut trader =
            Trader::new(Arc::new(config), scripted(vec![vec![0.8, 0.1, 0.1]])).unwrap();
        let indicators = BTreeMap::new();
        let window = vec![candle(START, dec!(100))];

        let result = trader.step(&input(&window, &indicators)).unwrap();

        assert_eq!(result.outcome, Some(TradeOutcome::Wait));
        assert!(!trader.ledger().has_position());
    }

    #[test]
    fn test_minimum_trade_duration_blocks_close() {
        let mut config = config();
        config.strategy.minimum_trade_duration = Some(2);
        let decisions = vec![LONG.to_vec(), CLOSE.to_vec(), CLOSE.to_vec()];
        let mut trader = Trader::new(Arc::new(config), scripted(decisions)).unwrap();
        let indicators = BTreeMap::new();
        let candles: Vec<Candle> = (0..3).map(|i| candle(START + i * HOUR, dec!(100))).collect();

        trader.step(&input(&candles[..1], &indicators)).unwrap();
        let second = trader.step(&input(&candles[..2], &indicators)).unwrap();
        assert_eq!(second.outcome, Some(TradeOutcome::Wait));
        let third = trader.step(&input(&candles[..3], &indicators)).unwrap();
        assert_eq!(third.outcome, Some(TradeOutcome::Closed));
        assert_eq!(trader.ledger().trades()[0].reason, CloseReason::Decision);
        assert_eq!(third.closed.as_ref(), trader.ledger().trades().last());
    }

    #[test]
    fn test_maximum_trade_duration_forces_close() {
        let mut config = config();
        config.strategy.maximum_trade_duration = Some(2);
        let mut trader = Trader::new(Arc::new(config), scripted(vec![LONG.to_vec()])).unwrap();
        let indicators = BTreeMap::new();
        let candles: Vec<Candle> = (0..3).map(|i| candle(START + i * HOUR, dec!(100))).collect();

        for end in 1..=3 {
            trader.step(&input(&candles[..end], &indicators)).unwrap();
        }

        let trade = &trader.ledger().trades()[0];
        assert_eq!(trade.reason, CloseReason::MaximumDuration);
        assert_eq!(trade.duration, 2);
    }

    #[test]
    fn test_cooldown_blocks_entries() {
        let mut config = config();
        config.strategy.minimum_duration_before_next_trade = Some(2);
        let decisions = vec![LONG.to_vec(), CLOSE.to_vec(), LONG.to_vec(), LONG.to_vec()];
        let mut trader = Trader::new(Arc::new(config), scripted(decisions)).unwrap();
        let indicators = BTreeMap::new();
        let candles: Vec<Candle> = (0..5).map(|i| candle(START + i * HOUR, dec!(100))).collect();

        trader.step(&input(&candles[..1], &indicators)).unwrap();
        trader.step(&input(&candles[..2], &indicators)).unwrap();
        assert_eq!(trader.state().duration_without_trade, 2);

        // counts down to 1: still blocked, the decision source is not queried
        trader.step(&input(&candles[..3], &indicators)).unwrap();
        assert!(!trader.ledger().has_position());
        assert_eq!(trader.state().duration_without_trade, 1);

        let result = trader.step(&input(&candles[..4], &indicators)).unwrap();
        assert_eq!(result.outcome, Some(TradeOutcome::OpenedLong));
    }

    #[test]
    fn test_spread_limit() {
        let mut config = config();
        config.strategy.maximum_spread = Some(dec!(3));
        let trader = {
            let mut trader = Trader::new(Arc::new(config), scripted(vec![LONG.to_vec()])).unwrap();
            let indicators = BTreeMap::new();
            let mut wide = candle(START, dec!(100));
            wide.spread = dec!(4);
            let window = vec![wide];
            let result = trader.step(&input(&window, &indicators)).unwrap();
            assert_eq!(result.outcome, None);
            trader
        };
        assert!(!trader.can_trade());
        assert!(!trader.ledger().has_position());
    }

    #[test]
    fn test_long_entry_pays_the_spread() {
        let mut trader = Trader::new(Arc::new(config()), scripted(vec![LONG.to_vec()])).unwrap();
        let indicators = BTreeMap::new();
        let mut quoted = candle(START, dec!(100));
        quoted.spread = dec!(2);
        let window = vec![quoted];

        trader.step(&input(&window, &indicators)).unwrap();

        assert_eq!(trader.ledger().position().unwrap().entry_price, dec!(102));
    }

    #[test]
    fn test_missing_primary_timeframe_is_a_data_error() {
        let mut trader = Trader::new(Arc::new(config()), scripted(vec![])).unwrap();
        let indicators = BTreeMap::new();
        let step = StepInput {
            candles: BTreeMap::new(),
            indicators: &indicators,
            conversion_rate: dec!(1),
            mark_price: None,
        };

        let err = trader.step(&step).unwrap_err();
        assert_eq!(
            err,
            SimulationError::Data(DataError::MissingTimeframe(Timeframe::OneHour))
        );
    }

    #[test]
    fn test_close_at_end_of_window() {
        let mut trader = Trader::new(Arc::new(config()), scripted(vec![LONG.to_vec()])).unwrap();
        let indicators = BTreeMap::new();
        let candles = vec![candle(START, dec!(100)), candle(START + HOUR, dec!(103))];

        trader.step(&input(&candles[..1], &indicators)).unwrap();
        trader.step(&input(&candles[..2], &indicators)).unwrap();
        let trade = trader.close_open_position_at_end().unwrap().unwrap();

        assert_eq!(trade.reason, CloseReason::EndOfWindow);
        assert_eq!(trade.pnl, dec!(3));
        assert_eq!(trader.balance_history().last(), Some(&dec!(1003)));
        assert!(trader.close_open_position_at_end().unwrap().is_none());
    }

    #[test]
    fn test_trade_outcome_codes() {
        assert_eq!(TradeOutcome::Wait.code(), 0);
        assert_eq!(TradeOutcome::OpenedLong.code(), 1);
        assert_eq!(TradeOutcome::OpenedShort.code(), 2);
        assert_eq!(TradeOutcome::Closed.code(), 3);
    }
}
