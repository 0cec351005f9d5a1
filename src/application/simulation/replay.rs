//! Market replay: turns full candle series into per-step windows and
//! indicator snapshots, then drives traders through them.
//!
//! A `Replay` is immutable once built and is shared read-only by every
//! trader evaluated on it.

use crate::application::simulation::trader::{DeathReason, StepInput, Trader};
use crate::config::Config;
use crate::domain::errors::{DataError, SimulationError};
use crate::domain::market::candle::{Candle, CandlesData, IndicatorsData};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::performance::fitness::FitnessReport;
use crate::domain::ports::{ConversionRateProvider, IndicatorProvider};
use crate::domain::risk::take_profit_stop_loss::PriceOffset;
use crate::domain::trading::types::Trade;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Candles kept in each window. Enlarged when a configured period needs more.
pub const DEFAULT_LOOKBACK: usize = 200;

#[derive(Debug, Clone)]
struct Frame {
    /// Exclusive end index of each timeframe's window in the full series
    ends: BTreeMap<Timeframe, usize>,
    indicators: IndicatorsData,
    conversion_rate: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub report: FitnessReport,
    pub steps: usize,
    pub death: Option<DeathReason>,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone)]
pub struct Replay {
    series: CandlesData,
    frames: Vec<Frame>,
    lookback: usize,
}

impl Replay {
    /// Build the frames of every primary candle closing within `[start, end]`.
    ///
    /// Candles before `start` are only used as indicator warm-up. Steps for
    /// which some required timeframe has no closed candle yet are skipped.
    pub fn new(
        config: &Config,
        series: CandlesData,
        rates: &dyn ConversionRateProvider,
        start: i64,
        end: i64,
    ) -> Result<Self, DataError> {
        let primary = config.strategy.timeframe;
        let required = config.required_timeframes();
        for timeframe in &required {
            if series.get(timeframe).is_none_or(|candles| candles.is_empty()) {
                return Err(DataError::MissingTimeframe(*timeframe));
            }
        }

        let lookback = Self::lookback_for(config);
        let primary_candles = series
            .get(&primary)
            .ok_or(DataError::MissingTimeframe(primary))?;

        let mut frames = Vec::new();
        let mut skipped = 0;
        for candle in primary_candles
            .iter()
            .filter(|c| c.date >= start && c.date <= end)
        {
            let ends: BTreeMap<Timeframe, usize> = required
                .iter()
                .map(|timeframe| {
                    let end = series
                        .get(timeframe)
                        .map_or(0, |candles| candles.partition_point(|c| c.date <= candle.date));
                    (*timeframe, end)
                })
                .collect();
            if ends.values().any(|end| *end == 0) {
                skipped += 1;
                continue;
            }

            let mut indicators = IndicatorsData::new();
            for (timeframe, kinds) in &config.training.inputs.indicators {
                let window = Self::slice(&series, &ends, *timeframe, lookback)?;
                let values = indicators.entry(*timeframe).or_default();
                for kind in kinds {
                    let computed = kind.calculate(window, true)?;
                    let latest = computed.last().copied().ok_or_else(|| DataError::EmptyWindow {
                        what: kind.id(),
                    })?;
                    values.insert(kind.id(), latest);
                }
            }

            frames.push(Frame {
                ends,
                indicators,
                conversion_rate: rates.rate_at(candle.date),
            });
        }

        if skipped > 0 {
            debug!("Replay: skipped {} steps without data on every timeframe", skipped);
        }
        info!(
            "Replay: {} steps on {} from {} to {}",
            frames.len(),
            primary,
            start,
            end
        );

        Ok(Self {
            series,
            frames,
            lookback,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Market data of step `index`
    pub fn input(&self, index: usize) -> Option<StepInput<'_>> {
        let frame = self.frames.get(index)?;
        let candles = frame
            .ends
            .keys()
            .filter_map(|timeframe| {
                Self::slice(&self.series, &frame.ends, *timeframe, self.lookback)
                    .ok()
                    .map(|window| (*timeframe, window))
            })
            .collect();
        Some(StepInput {
            candles,
            indicators: &frame.indicators,
            conversion_rate: frame.conversion_rate,
            mark_price: None,
        })
    }

    /// Step `trader` through every frame (or until it dies), close what is
    /// still open and evaluate it.
    pub fn run(&self, trader: &mut Trader) -> Result<EvaluationResult, SimulationError> {
        let mut steps = 0;
        for index in 0..self.frames.len() {
            if trader.is_dead() {
                break;
            }
            if let Some(input) = self.input(index) {
                trader.step(&input)?;
                steps += 1;
            }
        }
        trader.close_open_position_at_end()?;

        Ok(EvaluationResult {
            report: trader.evaluate(),
            steps,
            death: trader.state().death,
            trades: trader.ledger().trades().to_vec(),
        })
    }

    fn lookback_for(config: &Config) -> usize {
        let tpsl = &config.strategy.take_profit_stop_loss;
        let periods = config
            .training
            .inputs
            .indicators
            .values()
            .flatten()
            .filter_map(|kind| kind.period())
            .chain([&tpsl.take_profit, &tpsl.stop_loss].into_iter().filter_map(|offset| {
                offset.atr_period().or(match offset {
                    PriceOffset::Extremum { period } => Some(*period),
                    _ => None,
                })
            }));
        periods
            .map(|period| period * 4)
            .fold(DEFAULT_LOOKBACK, usize::max)
    }

    fn slice<'a>(
        series: &'a CandlesData,
        ends: &BTreeMap<Timeframe, usize>,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<&'a [Candle], DataError> {
        let candles = series
            .get(&timeframe)
            .ok_or(DataError::MissingTimeframe(timeframe))?;
        let end = ends
            .get(&timeframe)
            .copied()
            .ok_or(DataError::MissingTimeframe(timeframe))?;
        Ok(&candles[end.saturating_sub(lookback)..end])
    }
}
