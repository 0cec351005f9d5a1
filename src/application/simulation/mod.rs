pub mod population;
pub mod replay;
pub mod trader;
pub mod vision;

pub use population::{AgentEvaluation, PopulationEvaluator};
pub use replay::{EvaluationResult, Replay};
pub use trader::{StepInput, StepResult, TradeOutcome, Trader};
