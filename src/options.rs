//! Monitor configuration.

use serde::{Deserialize, Serialize};

use crate::analysis::CONVERGENCE_THRESHOLD;

/// Configuration for a [`ConvergenceMonitor`](crate::hooks::ConvergenceMonitor).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorOptions {
    /// Relative-residual threshold below which a sample counts as converged.
    pub convergence_threshold: f64,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            convergence_threshold: CONVERGENCE_THRESHOLD,
        }
    }
}

impl MonitorOptions {
    /// Overrides the convergence threshold while keeping other defaults.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_matches_analyzer() {
        let options = MonitorOptions::default();
        assert_eq!(options.convergence_threshold, CONVERGENCE_THRESHOLD);
    }

    #[test]
    fn with_threshold_overrides() {
        let options = MonitorOptions::default().with_threshold(1e-6);
        assert_eq!(options.convergence_threshold, 1e-6);
    }
}
