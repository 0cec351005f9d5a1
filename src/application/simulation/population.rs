use crate::application::simulation::replay::{EvaluationResult, Replay};
use crate::application::simulation::trader::Trader;
use crate::config::Config;
use crate::domain::ports::DecisionSource;
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one agent of a population
#[derive(Debug, Clone, Serialize)]
pub struct AgentEvaluation {
    pub index: usize,
    pub fitness: f64,
    pub score: f64,
    /// Failed evaluations keep their error and score as non-viable
    pub result: Result<EvaluationResult, String>,
}

/// Evaluates many agents in parallel over the same replay.
///
/// Every agent gets its own [`Trader`]; the replay and the configuration are
/// shared read-only, so evaluations never interfere with each other.
pub struct PopulationEvaluator {
    config: Arc<Config>,
    replay: Arc<Replay>,
}

impl PopulationEvaluator {
    pub fn new(config: Arc<Config>, replay: Arc<Replay>) -> Self {
        Self { config, replay }
    }

    /// Evaluate every decision source, in input order.
    ///
    /// Uses a dedicated pool when `neuroevolution.num_threads` is set, the
    /// global rayon pool otherwise.
    pub fn evaluate(&self, sources: Vec<Box<dyn DecisionSource>>) -> Result<Vec<AgentEvaluation>> {
        info!(
            "Evaluating {} agents over {} steps",
            sources.len(),
            self.replay.len()
        );

        let evaluations = match self.config.neuroevolution.num_threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .context("Failed to build evaluation thread pool")?
                .install(|| self.evaluate_all(sources)),
            None => self.evaluate_all(sources),
        };

        if let Some(best) = evaluations
            .iter()
            .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
        {
            info!(
                "Best agent #{}: fitness {:.4}, score {:.2}",
                best.index, best.fitness, best.score
            );
        }
        Ok(evaluations)
    }

    fn evaluate_all(&self, sources: Vec<Box<dyn DecisionSource>>) -> Vec<AgentEvaluation> {
        sources
            .into_par_iter()
            .enumerate()
            .map(|(index, source)| self.evaluate_one(index, source))
            .collect()
    }

    fn evaluate_one(&self, index: usize, source: Box<dyn DecisionSource>) -> AgentEvaluation {
        let result = Trader::new(self.config.clone(), source)
            .map_err(|e| e.to_string())
            .and_then(|mut trader| self.replay.run(&mut trader).map_err(|e| e.to_string()));

        match result {
            Ok(evaluation) => AgentEvaluation {
                index,
                fitness: evaluation.report.fitness,
                score: evaluation.report.score,
                result: Ok(evaluation),
            },
            Err(e) => {
                warn!("Agent #{} evaluation failed: {}", index, e);
                AgentEvaluation {
                    index,
                    fitness: 0.0,
                    score: 0.0,
                    result: Err(e),
                }
            }
        }
    }
}

/// Indices of `evaluations` from best to worst score
pub fn ranking(evaluations: &[AgentEvaluation]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..evaluations.len()).collect();
    order.sort_by(|a, b| evaluations[*b].score.total_cmp(&evaluations[*a].score));
    order
}
