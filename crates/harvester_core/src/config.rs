use std::time::Duration;

use crate::RetryPolicy;

/// Tuning knobs for one pagination run.
///
/// The defaults are deployment parameters, not correctness requirements: a
/// feed that stalls longer than `patience_threshold * settle_delay` will be
/// judged converged early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Wait after each viewport advance so new entries can render.
    pub settle_delay: Duration,
    /// Hard ceiling on iterations, regardless of patience.
    pub max_iterations: u32,
    /// Consecutive no-progress iterations tolerated before converging.
    pub patience_threshold: u32,
    /// Every n-th iteration takes an extra cooldown pause; zero disables it.
    pub cooldown_every: u32,
    pub cooldown_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(5),
            max_iterations: 20,
            patience_threshold: 5,
            cooldown_every: 3,
            cooldown_delay: Duration::from_secs(8),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },
}

impl PaginationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_iterations", self.max_iterations),
            ("patience_threshold", self.patience_threshold),
            ("retry.max_attempts", self.retry.max_attempts),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::MustBePositive { field });
            }
        }
        Ok(())
    }
}
