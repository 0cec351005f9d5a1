use crate::domain::errors::DataError;
use crate::domain::market::candle::Candle;
use rust_decimal::Decimal;

/// Maps a vision vector to a fixed-length decision vector `[long, short, close]`.
///
/// Implementations hold the agent's genome or any other policy. They are owned
/// by exactly one trader, so `decide` may update internal state.
pub trait DecisionSource: Send {
    fn decide(&mut self, vision: &[f64]) -> Vec<f64>;
}

impl<F> DecisionSource for F
where
    F: FnMut(&[f64]) -> Vec<f64> + Send,
{
    fn decide(&mut self, vision: &[f64]) -> Vec<f64> {
        self(vision)
    }
}

/// Pure function of a candle window to a series aligned 1:1 with it.
pub trait IndicatorProvider: Send + Sync {
    /// Stable identifier used as the key of the indicator snapshot
    fn id(&self) -> String;

    /// Values aligned with `candles`. Normalized values lie in `[0, 1]`.
    fn calculate(&self, candles: &[Candle], normalize: bool) -> Result<Vec<f64>, DataError>;
}

/// Quote-to-account currency rate in effect at a given date.
pub trait ConversionRateProvider: Send + Sync {
    fn rate_at(&self, date: i64) -> Decimal;
}
