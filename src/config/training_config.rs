use crate::domain::errors::ConfigError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::trading::types::PositionInfo;
use crate::infrastructure::indicators::IndicatorKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Agent inputs: indicators per timeframe, then position-state encodings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputsConfig {
    #[serde(default)]
    pub indicators: BTreeMap<Timeframe, Vec<IndicatorKind>>,
    #[serde(default)]
    pub position: Vec<PositionInfo>,
}

impl InputsConfig {
    pub fn vision_len(&self) -> usize {
        self.indicators.values().map(Vec::len).sum::<usize>() + self.position.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub generations: usize,
    /// Fraction of the initial balance below which the agent dies
    pub bad_trader_threshold: Option<f64>,
    /// Steps without any entry after which the agent dies
    pub inactive_trader_threshold: Option<u32>,
    pub training_start_date: NaiveDate,
    pub training_end_date: NaiveDate,
    pub test_start_date: Option<NaiveDate>,
    pub test_end_date: Option<NaiveDate>,
    /// Winning decision output must reach this value, otherwise the agent holds
    pub decision_threshold: Option<f64>,
    #[serde(default)]
    pub inputs: InputsConfig,
}

impl TrainingConfig {
    pub fn decision_threshold(&self) -> f64 {
        self.decision_threshold.unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generations == 0 {
            return Err(ConfigError::invalid("training.generations", "must be at least 1"));
        }
        if let Some(threshold) = self.bad_trader_threshold
            && !(0.0..=1.0).contains(&threshold)
        {
            return Err(ConfigError::invalid(
                "training.bad_trader_threshold",
                format!("must be within [0, 1], got {}", threshold),
            ));
        }
        if self.inactive_trader_threshold == Some(0) {
            return Err(ConfigError::invalid(
                "training.inactive_trader_threshold",
                "must be at least 1",
            ));
        }
        if self.training_start_date >= self.training_end_date {
            return Err(ConfigError::invalid(
                "training.training_end_date",
                format!(
                    "{} is not after training_start_date {}",
                    self.training_end_date, self.training_start_date
                ),
            ));
        }
        if let (Some(start), Some(end)) = (self.test_start_date, self.test_end_date)
            && start >= end
        {
            return Err(ConfigError::invalid(
                "training.test_end_date",
                format!("{} is not after test_start_date {}", end, start),
            ));
        }
        for indicators in self.inputs.indicators.values() {
            for indicator in indicators {
                if indicator.period() == Some(0) {
                    return Err(ConfigError::invalid(
                        "training.inputs.indicators",
                        format!("{:?} has a zero period", indicator),
                    ));
                }
            }
        }
        Ok(())
    }
}
