//! Configuration module for neatrade.
//!
//! One TOML document per evaluation run, organized by section: general,
//! symbol, strategy, training, evaluation and neuroevolution. A `Config` is
//! immutable once validated and shared read-only by every trader of a run.

mod general_config;
mod neuroevolution_config;
mod strategy_config;
mod training_config;

pub use general_config::GeneralConfig;
pub use neuroevolution_config::NeuroevolutionConfig;
pub use strategy_config::StrategyConfig;
pub use training_config::{InputsConfig, TrainingConfig};

pub use crate::domain::performance::fitness::EvaluationConfig;
pub use crate::domain::trading::types::SymbolInfo;

use crate::domain::errors::ConfigError;
use crate::domain::market::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub symbol: SymbolInfo,
    pub strategy: StrategyConfig,
    pub training: TrainingConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub neuroevolution: NeuroevolutionConfig,
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.symbol.validate()?;
        self.strategy.validate()?;
        self.training.validate()?;
        self.evaluation.validate()?;
        self.neuroevolution.validate()?;
        Ok(())
    }

    /// Every timeframe the replay must supply: the primary one plus those read by the inputs.
    pub fn required_timeframes(&self) -> BTreeSet<Timeframe> {
        let mut timeframes: BTreeSet<Timeframe> =
            self.training.inputs.indicators.keys().copied().collect();
        timeframes.insert(self.strategy.timeframe);
        timeframes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::risk::take_profit_stop_loss::PriceOffset;
    use crate::domain::risk::trailing_stop::TrailingKind;
    use crate::domain::trading::types::PositionInfo;
    use crate::infrastructure::indicators::IndicatorKind;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = include_str!("../../config/eurusd_h1.toml");

    #[test]
    fn test_parse_sample_config() {
        let config = Config::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.general.initial_balance, dec!(10000));
        assert_eq!(config.general.leverage, dec!(30));
        assert_eq!(config.symbol.tick_size(), dec!(0.00001));
        assert_eq!(config.strategy.timeframe, Timeframe::OneHour);
        assert_eq!(config.strategy.maximum_trades_per_day, Some(2));
        assert_eq!(
            config.strategy.take_profit_stop_loss.stop_loss,
            PriceOffset::Extremum { period: 24 }
        );
        assert_eq!(
            config.strategy.trailing_stop_loss.as_ref().unwrap().kind,
            TrailingKind::Points
        );
        assert_eq!(config.training.decision_threshold(), 0.5);
        assert_eq!(
            config.training.inputs.position,
            vec![PositionInfo::Type, PositionInfo::Pnl, PositionInfo::Duration]
        );
        assert_eq!(
            config.training.inputs.indicators[&Timeframe::FourHour],
            vec![IndicatorKind::Atr { period: 14 }]
        );
        assert_eq!(config.training.inputs.vision_len(), 7);
        assert_eq!(config.neuroevolution.population_size, 64);
        assert_eq!(
            config.required_timeframes().into_iter().collect::<Vec<_>>(),
            vec![Timeframe::OneHour, Timeframe::FourHour]
        );
    }

    #[test]
    fn test_defaults_apply() {
        let content = SAMPLE
            .replace("stop_out_level = 0.5\n", "")
            .replace("[neuroevolution]\npopulation_size = 64\n", "");
        let config = Config::from_toml_str(&content).unwrap();

        assert_eq!(config.general.stop_out_level, dec!(0.5));
        assert_eq!(config.neuroevolution, NeuroevolutionConfig::default());
    }

    #[test]
    fn test_unknown_take_profit_type_is_a_parse_error() {
        let content = SAMPLE.replace("type = \"atr\"\nperiod = 14\nmultiplier = 3", "type = \"fibonacci\"");
        let err = Config::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_leverage_is_rejected() {
        let content = SAMPLE.replace("leverage = 30", "leverage = 0");
        let err = Config::from_toml_str(&content).unwrap_err();
        match err {
            ConfigError::InvalidValue { field, .. } => assert_eq!(field, "general.leverage"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_short_schedule_day_is_rejected() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        let mut schedule = crate::domain::market::trading_schedule::TradingSchedule::always();
        schedule.friday.truncate(20);
        config.strategy.trading_schedule = Some(schedule);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_training_window_is_rejected() {
        let content = SAMPLE.replace(
            "training_end_date = \"2023-06-30\"",
            "training_end_date = \"2022-06-30\"",
        );
        assert!(Config::from_toml_str(&content).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("does/not/exist.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
