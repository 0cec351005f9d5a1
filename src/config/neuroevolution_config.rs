use crate::domain::errors::ConfigError;
use serde::{Deserialize, Serialize};

fn default_population_size() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuroevolutionConfig {
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Worker threads for population evaluation; rayon's default when unset
    pub num_threads: Option<usize>,
}

impl Default for NeuroevolutionConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            num_threads: None,
        }
    }
}

impl NeuroevolutionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::invalid(
                "neuroevolution.population_size",
                "must be at least 1",
            ));
        }
        if self.num_threads == Some(0) {
            return Err(ConfigError::invalid(
                "neuroevolution.num_threads",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
