// Risk management domain
pub mod position_sizing;
pub mod take_profit_stop_loss;
pub mod trailing_stop;
