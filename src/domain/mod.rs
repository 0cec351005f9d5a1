pub mod errors;
pub mod market;
pub mod performance;
pub mod ports;
pub mod risk;
pub mod trading;
