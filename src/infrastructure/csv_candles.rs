//! CSV candle loader.
//!
//! Expected header: `date,open,high,low,close[,tick_volume,volume,spread]`,
//! where `date` is the candle close in Unix seconds.

use crate::domain::market::candle::Candle;
use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

pub fn load_candles(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open candles file {}", path.display()))?;
    let candles = read_candles(BufReader::new(file))
        .with_context(|| format!("Failed to read candles from {}", path.display()))?;
    info!("Loaded {} candles from {}", candles.len(), path.display());
    Ok(candles)
}

/// Parse candles, sorted by close date, rejecting duplicate dates
pub fn read_candles<R: Read>(reader: R) -> Result<Vec<Candle>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut candles = Vec::new();

    for (line, result) in rdr.deserialize().enumerate() {
        let candle: Candle = result.with_context(|| format!("Invalid candle on row {}", line + 1))?;
        if candle.low > candle.high {
            bail!("Candle at {} has low {} above high {}", candle.date, candle.low, candle.high);
        }
        candles.push(candle);
    }

    candles.sort_by_key(|c| c.date);
    if let Some(pair) = candles.windows(2).find(|w| w[0].date == w[1].date) {
        bail!("Duplicate candle date {}", pair[0].date);
    }
    Ok(candles)
}

/// Candles whose close date lies in `[start, end]`
pub fn slice_by_date(candles: &[Candle], start: i64, end: i64) -> Vec<Candle> {
    candles
        .iter()
        .filter(|c| c.date >= start && c.date <= end)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const DATA: &str = "date,open,high,low,close,tick_volume,volume,spread
1672578000,1.0700,1.0710,1.0695,1.0705,120,0,8
1672574400,1.0690,1.0702,1.0688,1.0700,100,0,9
";

    #[test]
    fn test_read_sorts_by_date() {
        let candles = read_candles(DATA.as_bytes()).unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].date, 1_672_574_400);
        assert_eq!(candles[0].close, dec!(1.0700));
        assert_eq!(candles[1].spread, dec!(8));
    }

    #[test]
    fn test_optional_columns_default_to_zero() {
        let data = "date,open,high,low,close\n1672578000,1,2,0.5,1.5\n";
        let candles = read_candles(data.as_bytes()).unwrap();
        assert_eq!(candles[0].volume, dec!(0));
        assert_eq!(candles[0].spread, dec!(0));
    }

    #[test]
    fn test_rejects_duplicates_and_inverted_ranges() {
        let duplicate = "date,open,high,low,close\n1,1,2,0.5,1\n1,1,2,0.5,1\n";
        assert!(read_candles(duplicate.as_bytes()).is_err());

        let inverted = "date,open,high,low,close\n1,1,0.5,2,1\n";
        assert!(read_candles(inverted.as_bytes()).is_err());
    }

    #[test]
    fn test_slice_by_date_is_inclusive() {
        let candles = read_candles(DATA.as_bytes()).unwrap();
        assert_eq!(slice_by_date(&candles, 1_672_574_400, 1_672_574_400).len(), 1);
        assert_eq!(slice_by_date(&candles, 0, i64::MAX).len(), 2);
    }
}
