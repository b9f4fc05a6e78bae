//! Route-choice learning across rounds
//!
//! Every vehicle keeps a utility per candidate route. Utilities combine the
//! mean travel time (shaped by the vehicle's own `gamma` and `eta`), a penalty
//! for the delay the vehicle caused others, and an upper-confidence bonus for
//! routes tried fewer than [`EXPLORATION_THRESHOLD`] times. A softmax over the
//! utilities gives next round's route probabilities.

use anyhow::{bail, Result};
use log::{debug, warn};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::records::TripHistory;
use super::types::{RoadId, VehicleLabel};

/// Routes taken at least this many times get no exploration bonus
pub const EXPLORATION_THRESHOLD: f64 = 5.0;

/// Stand-in visit count for untried routes; keeps the bonus finite but large
pub const UNEXPLORED_COUNT: f64 = 0.01;

/// Sampled `gamma` values are floored here so `ln(gamma * T)` stays defined
const MIN_GAMMA: f64 = 1e-3;

/// Learning parameters shared by all vehicles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Weight of the caused-delay penalty; 0 disables it
    pub alpha: f64,
    /// Confidence parameter of the exploration bonus
    pub delta: f64,
    pub gamma_mean: f64,
    pub gamma_std: f64,
    pub eta_mean: f64,
    pub eta_std: f64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.0,
            delta: 0.1,
            gamma_mean: 1.0,
            gamma_std: 0.5,
            eta_mean: 1.0,
            eta_std: 0.5,
        }
    }
}

/// Utility of one route for one vehicle.
///
/// * `explored` - times the route was taken ([`UNEXPLORED_COUNT`] if never)
/// * `mean_time` - mean total travel time on the route
/// * `mean_delay` - mean delay caused to followers on the route
pub fn compute_utility(
    explored: f64,
    mean_time: f64,
    mean_delay: f64,
    alpha: f64,
    gamma: f64,
    eta: f64,
    delta: f64,
) -> f64 {
    let mut utility = 0.0;

    if explored > 0.0 {
        let penalty = if alpha != 0.0 && mean_delay != 0.0 {
            -(mean_delay * alpha).ln()
        } else {
            0.0
        };

        let time = if mean_time == 0.0 {
            0.0
        } else if eta == 1.0 {
            -(gamma * mean_time).ln()
        } else {
            ((gamma * mean_time).powf(eta - 1.0) - 1.0) / (1.0 - eta)
        };

        utility = time + penalty;
    }

    if explored < EXPLORATION_THRESHOLD {
        utility += exploration_bonus(explored, delta);
    }

    utility
}

/// Upper-confidence bonus for a route taken `explored` times
pub fn exploration_bonus(explored: f64, delta: f64) -> f64 {
    if explored >= EXPLORATION_THRESHOLD {
        return 0.0;
    }
    let explored = explored.max(UNEXPLORED_COUNT);
    (2.0 * (1.0 / delta).ln() / explored).sqrt()
}

/// Softmax over utilities.
///
/// The maximum is subtracted first so large utilities cannot overflow; the
/// result is unchanged.
pub fn compute_probability(utilities: &[f64]) -> Vec<f64> {
    if utilities.is_empty() {
        return Vec::new();
    }
    let max = utilities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = utilities.iter().map(|u| (u - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Learning state of one vehicle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnerState {
    pub label: VehicleLabel,
    pub utilities: Vec<f64>,
    pub probabilities: Vec<f64>,
    /// Route index taken in each completed round
    pub routes_taken: Vec<usize>,
    pub gamma: f64,
    pub eta: f64,
}

/// Route-choice learner for a fixed population of vehicles
#[derive(Debug, Clone)]
pub struct RouteLearner {
    pub config: LearnerConfig,
    states: Vec<LearnerState>,
    route_count: usize,
}

impl RouteLearner {
    /// Vehicles `0..vehicle_count` start with zero utilities, uniform
    /// probabilities and their own sampled `gamma` and `eta`.
    pub fn new<R: Rng>(
        config: LearnerConfig,
        route_count: usize,
        vehicle_count: u32,
        rng: &mut R,
    ) -> Result<Self> {
        if route_count == 0 {
            bail!("Route learner needs at least one route");
        }
        if !(config.delta > 0.0 && config.delta < 1.0) {
            bail!("Learner delta must lie in (0, 1), got {}", config.delta);
        }
        let gamma_dist = Normal::new(config.gamma_mean, config.gamma_std)?;
        let eta_dist = Normal::new(config.eta_mean, config.eta_std)?;

        let uniform = 1.0 / route_count as f64;
        let states = (0..vehicle_count)
            .map(|label| LearnerState {
                label: VehicleLabel(label),
                utilities: vec![0.0; route_count],
                probabilities: vec![uniform; route_count],
                routes_taken: Vec::new(),
                gamma: gamma_dist.sample(&mut *rng).max(MIN_GAMMA),
                eta: eta_dist.sample(&mut *rng),
            })
            .collect();

        Ok(Self {
            config,
            states,
            route_count,
        })
    }

    /// Learner with explicit per-vehicle `(gamma, eta)` pairs
    pub fn with_parameters(config: LearnerConfig, route_count: usize, params: &[(f64, f64)]) -> Self {
        let uniform = 1.0 / route_count.max(1) as f64;
        let states = params
            .iter()
            .enumerate()
            .map(|(label, (gamma, eta))| LearnerState {
                label: VehicleLabel(label as u32),
                utilities: vec![0.0; route_count],
                probabilities: vec![uniform; route_count],
                routes_taken: Vec::new(),
                gamma: *gamma,
                eta: *eta,
            })
            .collect();
        Self {
            config,
            states,
            route_count,
        }
    }

    pub fn states(&self) -> &[LearnerState] {
        &self.states
    }

    pub fn state(&self, label: VehicleLabel) -> Option<&LearnerState> {
        self.states.get(label.0 as usize)
    }

    /// Route probabilities per vehicle, in label order, for the generator
    pub fn preferences(&self) -> Vec<Vec<f64>> {
        self.states.iter().map(|s| s.probabilities.clone()).collect()
    }

    /// Recompute utilities and probabilities from every round so far and
    /// append the route each vehicle took in `round`.
    pub fn update(&mut self, history: &TripHistory, round: u32, all_routes: &[Vec<RoadId>]) {
        if all_routes.len() != self.route_count {
            warn!(
                "Learner tracks {} routes but {} were given; update skipped",
                self.route_count,
                all_routes.len()
            );
            return;
        }
        let summaries = history.summarize(all_routes);
        let config = self.config;

        for state in &mut self.states {
            for (route, utility) in state.utilities.iter_mut().enumerate() {
                *utility = match summaries.get(&(state.label, route)) {
                    Some(summary) => compute_utility(
                        f64::from(summary.count),
                        summary.mean_total_time,
                        summary.mean_caused_delay,
                        config.alpha,
                        state.gamma,
                        state.eta,
                        config.delta,
                    ),
                    None => compute_utility(UNEXPLORED_COUNT, 0.0, 0.0, 0.0, 0.0, 0.0, config.delta),
                };
            }
            state.probabilities = compute_probability(&state.utilities);

            match history.route_taken(state.label, round, all_routes) {
                Some(route) => state.routes_taken.push(route),
                None => debug!(
                    "Vehicle {:?} has no record for round {}",
                    state.label, round
                ),
            }
        }
    }
}
