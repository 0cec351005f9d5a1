use crate::domain::ports::ConversionRateProvider;
use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;

/// Same rate at every date. `FixedConversionRate::identity()` when the
/// instrument is quoted in the account currency.
#[derive(Debug, Clone, Copy)]
pub struct FixedConversionRate(pub Decimal);

impl FixedConversionRate {
    pub fn identity() -> Self {
        Self(Decimal::ONE)
    }
}

impl ConversionRateProvider for FixedConversionRate {
    fn rate_at(&self, _date: i64) -> Decimal {
        self.0
    }
}

#[derive(Debug, Deserialize)]
struct RateRecord {
    date: i64,
    rate: Decimal,
}

/// Step-wise historical rates: the rate at `date` is the last one published at or before it.
#[derive(Debug, Clone)]
pub struct HistoricalConversionRates {
    rates: BTreeMap<i64, Decimal>,
}

impl HistoricalConversionRates {
    pub fn new(rates: BTreeMap<i64, Decimal>) -> Result<Self> {
        if rates.is_empty() {
            bail!("Historical conversion rates require at least one rate");
        }
        if let Some((date, rate)) = rates.iter().find(|(_, r)| **r <= Decimal::ZERO) {
            bail!("Conversion rate at {} must be positive, got {}", date, rate);
        }
        Ok(Self { rates })
    }

    /// CSV with a `date,rate` header
    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut rates = BTreeMap::new();
        for result in rdr.deserialize() {
            let record: RateRecord = result.context("Invalid conversion rate row")?;
            rates.insert(record.date, record.rate);
        }
        Self::new(rates)
    }
}

impl ConversionRateProvider for HistoricalConversionRates {
    fn rate_at(&self, date: i64) -> Decimal {
        self.rates
            .range(..=date)
            .next_back()
            .or_else(|| self.rates.iter().next())
            .map(|(_, rate)| *rate)
            .unwrap_or(Decimal::ONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rate_is_last_known() {
        let rates = HistoricalConversionRates::from_csv("date,rate\n100,1.10\n200,1.20\n".as_bytes()).unwrap();

        assert_eq!(rates.rate_at(50), dec!(1.10));
        assert_eq!(rates.rate_at(100), dec!(1.10));
        assert_eq!(rates.rate_at(199), dec!(1.10));
        assert_eq!(rates.rate_at(500), dec!(1.20));
    }

    #[test]
    fn test_rejects_empty_or_non_positive() {
        assert!(HistoricalConversionRates::new(BTreeMap::new()).is_err());
        assert!(HistoricalConversionRates::from_csv("date,rate\n1,0\n".as_bytes()).is_err());
    }

    #[test]
    fn test_identity() {
        assert_eq!(FixedConversionRate::identity().rate_at(0), Decimal::ONE);
    }
}
