//! Multi-round experiment: simulate, record, learn, repeat

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use super::learner::{LearnerState, RouteLearner};
use super::records::{TripHistory, TripRecordRow};
use super::scenario::Scenario;
use super::stats::SimulationStats;
use super::types::{RoadId, DEFAULT_DT};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExperimentOptions {
    pub rounds: u32,
    /// Upper bound on ticks per round
    pub max_ticks: u64,
    pub dt: f64,
    pub seed: u64,
}

impl Default for ExperimentOptions {
    fn default() -> Self {
        Self {
            rounds: 10,
            max_ticks: 20_000,
            dt: DEFAULT_DT,
            seed: 42,
        }
    }
}

/// Outcome of a single round
#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round: u32,
    pub ticks: u64,
    pub finished: bool,
    pub mean_total_time: f64,
    pub stats: SimulationStats,
}

#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub routes: Vec<Vec<RoadId>>,
    pub rounds: Vec<RoundSummary>,
    pub learners: Vec<LearnerState>,
    pub history: TripHistory,
}

#[derive(Serialize)]
struct ReportJson<'a> {
    routes: Vec<Vec<usize>>,
    rounds: &'a [RoundSummary],
    learners: &'a [LearnerState],
    records: Vec<TripRecordRow>,
}

impl ExperimentReport {
    pub fn to_json(&self) -> Result<String> {
        let report = ReportJson {
            routes: self
                .routes
                .iter()
                .map(|route| route.iter().map(|r| r.0).collect())
                .collect(),
            rounds: &self.rounds,
            learners: &self.learners,
            records: self.history.rows(),
        };
        serde_json::to_string_pretty(&report).context("Failed to serialize report")
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))
    }
}

/// Repeated rounds over one scenario with route choices learned in between
pub struct Experiment {
    scenario: Scenario,
    options: ExperimentOptions,
    routes: Vec<Vec<RoadId>>,
    learner: RouteLearner,
    history: TripHistory,
}

impl Experiment {
    pub fn new(scenario: Scenario, options: ExperimentOptions) -> Result<Self> {
        let routes = scenario.routes().context("Failed to resolve scenario routes")?;
        let mut rng = StdRng::seed_from_u64(options.seed);
        let learner = RouteLearner::new(
            scenario.learner,
            routes.len(),
            scenario.generator.vehicle_limit,
            &mut rng,
        )?;
        Ok(Self {
            scenario,
            options,
            routes,
            learner,
            history: TripHistory::new(),
        })
    }

    pub fn routes(&self) -> &[Vec<RoadId>] {
        &self.routes
    }

    pub fn learner(&self) -> &RouteLearner {
        &self.learner
    }

    /// Play one round and feed its records to the learner
    pub fn run_round(&mut self, round: u32) -> Result<RoundSummary> {
        let seed = self.options.seed.wrapping_add(u64::from(round));
        let mut world = self
            .scenario
            .build_world(seed, self.learner.preferences())
            .with_context(|| format!("Failed to build world for round {}", round))?;

        let ticks = world.run(self.options.max_ticks, self.options.dt);
        let finished = world.is_finished();
        if !finished {
            warn!(
                "Round {} hit the tick limit with {} vehicles still on the road",
                round,
                world.vehicle_count()
            );
            world.log_summary();
        }

        let stats = world.stats();
        let records = world.take_records();
        let mean_total_time = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| r.total_time).sum::<f64>() / records.len() as f64
        };

        self.history.push_round(round, records);
        self.learner.update(&self.history, round, &self.routes);

        info!(
            "Round {}: {} ticks, {}/{} vehicles completed, mean trip time {:.2}s",
            round,
            ticks,
            stats.total_vehicles_completed,
            stats.total_vehicles_spawned,
            mean_total_time
        );

        Ok(RoundSummary {
            round,
            ticks,
            finished,
            mean_total_time,
            stats,
        })
    }

    pub fn run(mut self) -> Result<ExperimentReport> {
        info!(
            "Running {} rounds over {} routes (dt={}s, max {} ticks per round)",
            self.options.rounds,
            self.routes.len(),
            self.options.dt,
            self.options.max_ticks
        );

        let mut rounds = Vec::with_capacity(self.options.rounds as usize);
        for round in 0..self.options.rounds {
            rounds.push(self.run_round(round)?);
        }

        info!("=== SIMULATION COMPLETE ===");
        if let Some(last) = rounds.last() {
            last.stats.log_summary();
        }
        for state in self.learner.states() {
            info!(
                "Vehicle {}: probabilities {:.3?}",
                state.label.0, state.probabilities
            );
        }

        Ok(ExperimentReport {
            routes: self.routes,
            rounds,
            learners: self.learner.states().to_vec(),
            history: self.history,
        })
    }
}
