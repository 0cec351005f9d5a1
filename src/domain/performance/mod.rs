pub mod fitness;
pub mod statistics;
