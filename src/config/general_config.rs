use crate::domain::errors::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

fn default_stop_out_level() -> Decimal {
    dec!(0.5)
}

/// Account settings from the `[general]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub symbol: String,
    pub initial_balance: Decimal,
    pub account_currency: String,
    pub leverage: Decimal,
    /// Margin level (equity / required margin) at or below which the open position is liquidated
    #[serde(default = "default_stop_out_level")]
    pub stop_out_level: Decimal,
}

impl GeneralConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::MissingValue {
                field: "general.symbol".to_string(),
            });
        }
        if self.initial_balance <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "general.initial_balance",
                format!("must be positive, got {}", self.initial_balance),
            ));
        }
        if self.leverage < Decimal::ONE {
            return Err(ConfigError::invalid(
                "general.leverage",
                format!("must be at least 1, got {}", self.leverage),
            ));
        }
        if self.stop_out_level < Decimal::ZERO || self.stop_out_level > Decimal::ONE {
            return Err(ConfigError::invalid(
                "general.stop_out_level",
                format!("must be within [0, 1], got {}", self.stop_out_level),
            ));
        }
        Ok(())
    }
}
