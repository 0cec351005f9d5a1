use crate::domain::errors::DataError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::timeframe::Timeframe;

/// OHLCV sample for one time bucket. `date` is the bucket's close, in Unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub date: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub tick_volume: Decimal,
    #[serde(default)]
    pub volume: Decimal,
    #[serde(default)]
    pub spread: Decimal,
}

impl Candle {
    pub fn date_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.date, 0).unwrap_or_default()
    }

    /// Calendar day (UTC) of the candle close
    pub fn day(&self) -> NaiveDate {
        self.date_time().date_naive()
    }
}

/// Full candle series keyed by timeframe, oldest candle first.
pub type CandlesData = BTreeMap<Timeframe, Vec<Candle>>;

/// Borrowed candle windows keyed by timeframe; the last candle of each window is the latest closed one.
pub type CandleWindows<'a> = BTreeMap<Timeframe, &'a [Candle]>;

/// Latest value of every indicator, keyed by timeframe then indicator id.
pub type IndicatorsData = BTreeMap<Timeframe, BTreeMap<String, f64>>;

/// Price field (or derived price) an indicator reads from a candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CandleSource {
    Open,
    High,
    Low,
    Close,
    Volume,
    Hl2,
    Hlc3,
    Ohlc4,
    Hlcc4,
    BodyLow,
    BodyHigh,
}

impl CandleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleSource::Open => "open",
            CandleSource::High => "high",
            CandleSource::Low => "low",
            CandleSource::Close => "close",
            CandleSource::Volume => "volume",
            CandleSource::Hl2 => "hl2",
            CandleSource::Hlc3 => "hlc3",
            CandleSource::Ohlc4 => "ohlc4",
            CandleSource::Hlcc4 => "hlcc4",
            CandleSource::BodyLow => "body-low",
            CandleSource::BodyHigh => "body-high",
        }
    }

    pub fn value(&self, candle: &Candle) -> Decimal {
        let two = Decimal::TWO;
        match self {
            CandleSource::Open => candle.open,
            CandleSource::High => candle.high,
            CandleSource::Low => candle.low,
            CandleSource::Close => candle.close,
            CandleSource::Volume => candle.volume,
            CandleSource::Hl2 => (candle.high + candle.low) / two,
            CandleSource::Hlc3 => (candle.high + candle.low + candle.close) / Decimal::from(3),
            CandleSource::Ohlc4 => {
                (candle.open + candle.high + candle.low + candle.close) / Decimal::from(4)
            }
            CandleSource::Hlcc4 => {
                (candle.high + candle.low + candle.close + candle.close) / Decimal::from(4)
            }
            CandleSource::BodyLow => candle.open.min(candle.close),
            CandleSource::BodyHigh => candle.open.max(candle.close),
        }
    }
}

impl FromStr for CandleSource {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(CandleSource::Open),
            "high" => Ok(CandleSource::High),
            "low" => Ok(CandleSource::Low),
            "close" => Ok(CandleSource::Close),
            "volume" => Ok(CandleSource::Volume),
            "hl2" => Ok(CandleSource::Hl2),
            "hlc3" => Ok(CandleSource::Hlc3),
            "ohlc4" => Ok(CandleSource::Ohlc4),
            "hlcc4" => Ok(CandleSource::Hlcc4),
            "body-low" => Ok(CandleSource::BodyLow),
            "body-high" => Ok(CandleSource::BodyHigh),
            other => Err(DataError::UnknownSource(other.to_string())),
        }
    }
}

impl TryFrom<String> for CandleSource {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CandleSource::from_str(&value)
    }
}

impl From<CandleSource> for String {
    fn from(value: CandleSource) -> Self {
        value.as_str().to_string()
    }
}

/// Extract one price series from a candle window.
pub fn get_candles_with_source(candles: &[Candle], source: &str) -> Result<Vec<f64>, DataError> {
    let source = CandleSource::from_str(source)?;
    Ok(source_values(candles, source))
}

pub fn source_values(candles: &[Candle], source: CandleSource) -> Vec<f64> {
    candles
        .iter()
        .map(|c| source.value(c).to_f64().unwrap_or(0.0))
        .collect()
}
