//! Closed set of indicators available as agent inputs.
//!
//! Price indicators are computed with the `ta` crate by replaying the whole
//! window through a fresh indicator state, so the output is a pure function of
//! the window. Time indicators read the candle close date (UTC).

use crate::domain::errors::DataError;
use crate::domain::market::candle::{Candle, CandleSource, source_values};
use crate::domain::ports::IndicatorProvider;
use chrono::{Datelike, Timelike};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use ta::indicators::{
    AverageTrueRange, ExponentialMovingAverage, RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::{DataItem, Next};

fn default_source() -> CandleSource {
    CandleSource::Close
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum IndicatorKind {
    Rsi {
        period: usize,
        #[serde(default = "default_source")]
        source: CandleSource,
    },
    Ema {
        period: usize,
        #[serde(default = "default_source")]
        source: CandleSource,
    },
    Sma {
        period: usize,
        #[serde(default = "default_source")]
        source: CandleSource,
    },
    Atr {
        period: usize,
    },
    /// Raw candle field
    Candle {
        #[serde(default = "default_source")]
        source: CandleSource,
    },
    Hour,
    Minute,
    WeekDay,
    /// 1 during the first seven days of the month, 0 otherwise
    NfpWeek,
}

impl IndicatorKind {
    /// Fixed output range, for indicators that have one
    fn value_range(&self) -> Option<(f64, f64)> {
        match self {
            IndicatorKind::Rsi { .. } => Some((0.0, 100.0)),
            IndicatorKind::Hour => Some((0.0, 23.0)),
            IndicatorKind::Minute => Some((0.0, 59.0)),
            IndicatorKind::WeekDay => Some((0.0, 6.0)),
            IndicatorKind::NfpWeek => Some((0.0, 1.0)),
            _ => None,
        }
    }

    pub fn period(&self) -> Option<usize> {
        match self {
            IndicatorKind::Rsi { period, .. }
            | IndicatorKind::Ema { period, .. }
            | IndicatorKind::Sma { period, .. }
            | IndicatorKind::Atr { period } => Some(*period),
            _ => None,
        }
    }

    fn raw_values(&self, candles: &[Candle]) -> Result<Vec<f64>, DataError> {
        let values = match self {
            IndicatorKind::Rsi { period, source } => {
                let mut rsi = RelativeStrengthIndex::new(*period).map_err(indicator_error)?;
                source_values(candles, *source)
                    .into_iter()
                    .map(|v| rsi.next(v))
                    .collect()
            }
            IndicatorKind::Ema { period, source } => {
                let mut ema = ExponentialMovingAverage::new(*period).map_err(indicator_error)?;
                source_values(candles, *source)
                    .into_iter()
                    .map(|v| ema.next(v))
                    .collect()
            }
            IndicatorKind::Sma { period, source } => {
                let mut sma = SimpleMovingAverage::new(*period).map_err(indicator_error)?;
                source_values(candles, *source)
                    .into_iter()
                    .map(|v| sma.next(v))
                    .collect()
            }
            IndicatorKind::Atr { period } => {
                let mut atr = AverageTrueRange::new(*period).map_err(indicator_error)?;
                let mut values = Vec::with_capacity(candles.len());
                for candle in candles {
                    let item = data_item(candle)?;
                    values.push(atr.next(&item));
                }
                values
            }
            IndicatorKind::Candle { source } => source_values(candles, *source),
            IndicatorKind::Hour => candles
                .iter()
                .map(|c| c.date_time().hour() as f64)
                .collect(),
            IndicatorKind::Minute => candles
                .iter()
                .map(|c| c.date_time().minute() as f64)
                .collect(),
            IndicatorKind::WeekDay => candles
                .iter()
                .map(|c| c.date_time().weekday().num_days_from_sunday() as f64)
                .collect(),
            IndicatorKind::NfpWeek => candles
                .iter()
                .map(|c| if c.date_time().day() <= 7 { 1.0 } else { 0.0 })
                .collect(),
        };
        Ok(values)
    }
}

impl IndicatorProvider for IndicatorKind {
    fn id(&self) -> String {
        match self {
            IndicatorKind::Rsi { period, source } => format!("rsi-{}-{}", period, source.as_str()),
            IndicatorKind::Ema { period, source } => format!("ema-{}-{}", period, source.as_str()),
            IndicatorKind::Sma { period, source } => format!("sma-{}-{}", period, source.as_str()),
            IndicatorKind::Atr { period } => format!("atr-{}", period),
            IndicatorKind::Candle { source } => format!("candle-{}", source.as_str()),
            IndicatorKind::Hour => "hour".to_string(),
            IndicatorKind::Minute => "minute".to_string(),
            IndicatorKind::WeekDay => "week-day".to_string(),
            IndicatorKind::NfpWeek => "nfp-week".to_string(),
        }
    }

    fn calculate(&self, candles: &[Candle], normalize: bool) -> Result<Vec<f64>, DataError> {
        if candles.is_empty() {
            return Err(DataError::EmptyWindow { what: self.id() });
        }
        let values = self.raw_values(candles)?;
        if !normalize {
            return Ok(values);
        }
        Ok(match self.value_range() {
            Some((min, max)) => values.iter().map(|v| scale(*v, min, max)).collect(),
            None => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                values.iter().map(|v| scale(*v, min, max)).collect()
            }
        })
    }
}

fn scale(value: f64, min: f64, max: f64) -> f64 {
    if max - min <= f64::EPSILON {
        return 0.5;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

fn data_item(candle: &Candle) -> Result<DataItem, DataError> {
    DataItem::builder()
        .open(candle.open.to_f64().unwrap_or(0.0))
        .high(candle.high.to_f64().unwrap_or(0.0))
        .low(candle.low.to_f64().unwrap_or(0.0))
        .close(candle.close.to_f64().unwrap_or(0.0))
        .volume(candle.volume.to_f64().unwrap_or(0.0))
        .build()
        .map_err(indicator_error)
}

fn indicator_error(err: ta::errors::TaError) -> DataError {
    DataError::Indicator(format!("{:?}", err))
}
