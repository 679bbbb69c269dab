use serde::{Deserialize, Serialize};

use super::SimulationConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Alpha dropped below `alpha_min`.
    Converged,
    /// `max_iterations` ticks elapsed first.
    IterationCap,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub alpha: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub velocity_decay: f64,
    pub iteration: u64,
    pub running: bool,
}

impl SimulationState {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            alpha: 1.0,
            alpha_min: config.alpha_min,
            alpha_decay: config.alpha_decay,
            velocity_decay: config.velocity_decay,
            iteration: 0,
            running: true,
        }
    }

    pub(crate) fn sync_config(&mut self, config: &SimulationConfig) {
        self.alpha_min = config.alpha_min;
        self.alpha_decay = config.alpha_decay;
        self.velocity_decay = config.velocity_decay;
    }

    pub fn restart(&mut self) {
        self.alpha = 1.0;
        self.iteration = 0;
        self.running = true;
    }

    /// Raises alpha to `target` (never lowers it) and resumes motion.
    /// Targets below `alpha_min` still buy at least one more tick.
    pub fn reheat(&mut self, target: f64) {
        let target = if target.is_finite() { target.clamp(0.0, 1.0) } else { 1.0 };
        let target = target.max(self.alpha_min);
        if target > self.alpha {
            self.alpha = target;
        }
        self.running = true;
    }

    /// Advances one tick of cooling; returns why the run ended, if it did.
    ///
    /// Alpha convergence is checked before the iteration cap, so when both
    /// trip on the same tick the run reports `Converged`.
    pub(crate) fn cool(&mut self, max_iterations: u64) -> Option<EndReason> {
        self.iteration += 1;
        self.alpha *= 1.0 - self.alpha_decay;

        let reason = if self.alpha < self.alpha_min {
            Some(EndReason::Converged)
        } else if self.iteration >= max_iterations {
            Some(EndReason::IterationCap)
        } else {
            None
        };

        if reason.is_some() {
            self.running = false;
        }
        reason
    }
}
