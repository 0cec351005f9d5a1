use crate::domain::trading::types::SymbolInfo;
use rust_decimal::Decimal;
use std::fmt::Debug;

pub trait FeeModel: Debug + Send + Sync {
    /// Fee charged, in account currency, for one fill of `size` lots
    fn fill_fee(&self, size: Decimal, conversion_rate: Decimal) -> Decimal;

    /// Get description of the fee model
    fn description(&self) -> String;
}

/// Flat commission per lot traded, charged once per fill.
#[derive(Debug, Clone)]
pub struct LotCommissionFeeModel {
    pub commission_per_lot: Decimal,
    /// Commission currency differs from the account currency
    pub needs_conversion: bool,
}

impl LotCommissionFeeModel {
    pub fn new(commission_per_lot: Decimal, needs_conversion: bool) -> Self {
        Self {
            commission_per_lot,
            needs_conversion,
        }
    }

    pub fn for_symbol(symbol: &SymbolInfo, account_currency: &str) -> Self {
        Self::new(
            symbol.commission_per_lot,
            symbol.commission_base != account_currency,
        )
    }
}

impl FeeModel for LotCommissionFeeModel {
    fn fill_fee(&self, size: Decimal, conversion_rate: Decimal) -> Decimal {
        let fee = size * self.commission_per_lot;
        if self.needs_conversion {
            fee * conversion_rate
        } else {
            fee
        }
    }

    fn description(&self) -> String {
        format!(
            "Lot Commission Fee Model (Com: {} per lot{})",
            self.commission_per_lot,
            if self.needs_conversion { ", converted" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fee_per_lot() {
        let model = LotCommissionFeeModel::new(dec!(7), false);
        assert_eq!(model.fill_fee(dec!(0.5), dec!(1.2)), dec!(3.5));
    }

    #[test]
    fn test_fee_converted_when_currencies_differ() {
        let model = LotCommissionFeeModel::new(dec!(7), true);
        assert_eq!(model.fill_fee(dec!(2), dec!(0.9)), dec!(12.6));
        assert!(model.description().contains("converted"));
    }
}
