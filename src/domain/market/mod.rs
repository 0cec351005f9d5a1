// Market data value objects
pub mod candle;
pub mod timeframe;
pub mod trading_schedule;
