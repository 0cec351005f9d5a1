use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while loading or validating a configuration.
///
/// These are fatal to the construction of a trader: an evaluation with an
/// invalid configuration never starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Failed to read configuration file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing value for {field}")]
    MissingValue { field: String },
}

impl ConfigError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors related to market data lookups
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("Unknown candle source: {0}")]
    UnknownSource(String),

    #[error("Unknown indicator: {0}")]
    UnknownIndicator(String),

    #[error("Empty {what} window")]
    EmptyWindow { what: String },

    #[error("No candles for timeframe {0}")]
    MissingTimeframe(Timeframe),

    #[error("Indicator computation failed: {0}")]
    Indicator(String),
}

/// State-machine defects detected by the position ledger.
///
/// None of these can be caused by market conditions; they signal a bug in
/// the caller driving the ledger.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Cannot open a position while another one is open")]
    PositionAlreadyOpen,

    #[error("No open position")]
    NoOpenPosition,

    #[error("Invalid position size: {0}")]
    InvalidSize(Decimal),
}

/// Errors returned by a running simulation step
#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
