//! Fixed-cycle traffic signals
//!
//! A signal steps through a list of phases; each phase says which of the
//! signal's groups are green. Roads bound to a group only release their head
//! vehicle while that group is green.

use anyhow::{bail, Result};

/// A traffic signal with a fixed, time-indexed cycle
#[derive(Debug, Clone)]
pub struct TrafficSignal {
    /// One entry per phase, one flag per group
    pub cycle: Vec<Vec<bool>>,
    /// Seconds spent in each phase
    pub phase_duration: f64,
    current_phase: usize,
}

impl TrafficSignal {
    pub fn new(cycle: Vec<Vec<bool>>, phase_duration: f64) -> Result<Self> {
        if cycle.is_empty() {
            bail!("Signal cycle has no phases");
        }
        let groups = cycle[0].len();
        if cycle.iter().any(|phase| phase.len() != groups) {
            bail!("Signal phases disagree on the number of groups");
        }
        if !phase_duration.is_finite() || phase_duration <= 0.0 {
            bail!("Signal phase duration must be positive, got {}", phase_duration);
        }
        Ok(Self {
            cycle,
            phase_duration,
            current_phase: 0,
        })
    }

    pub fn group_count(&self) -> usize {
        self.cycle[0].len()
    }

    /// Select the phase for simulation time `t`
    pub fn update(&mut self, t: f64) {
        let elapsed_phases = (t / self.phase_duration).floor() as usize;
        self.current_phase = elapsed_phases % self.cycle.len();
    }

    pub fn is_green(&self, group: usize) -> bool {
        self.cycle[self.current_phase]
            .get(group)
            .copied()
            .unwrap_or(true)
    }
}
