pub mod conversion_rates;
pub mod csv_candles;
pub mod indicators;
pub mod random_decisions;

pub use conversion_rates::{FixedConversionRate, HistoricalConversionRates};
pub use indicators::IndicatorKind;
pub use random_decisions::RandomDecisionSource;
