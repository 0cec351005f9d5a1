pub mod fee_model;
pub mod ledger;
pub mod types;
