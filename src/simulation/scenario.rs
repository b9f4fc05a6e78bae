//! Scenario description: network, signals, generation and learning settings
//!
//! Scenarios load from JSON. [`Scenario::default`] is the two-origin,
//! two-destination merge network: two entry roads each feeding a slow and a
//! fast exit road.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::generator::{GeneratorConfig, VehicleGenerator};
use super::learner::LearnerConfig;
use super::road_network::SimRoadNetwork;
use super::signal::TrafficSignal;
use super::types::{Position, RoadId};
use super::vehicle::VehicleParams;
use super::world::SimWorld;

/// Longest route considered when enumerating routes
const DEFAULT_MAX_ROUTE_LEN: usize = 8;

/// One road segment of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadConfig {
    pub start: [f64; 2],
    pub end: [f64; 2],
    #[serde(default = "default_slow_factor")]
    pub slow_factor: f64,
    #[serde(default = "default_stop_distance")]
    pub stop_distance: f64,
    /// Cooldown between consecutive admissions onto this road
    #[serde(default = "default_wait_time")]
    pub wait_time: f64,
}

fn default_slow_factor() -> f64 {
    1.0
}

fn default_stop_distance() -> f64 {
    50.0
}

fn default_wait_time() -> f64 {
    2.0
}

fn default_max_route_len() -> usize {
    DEFAULT_MAX_ROUTE_LEN
}

/// A fixed-cycle signal and the roads each of its groups releases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub cycle: Vec<Vec<bool>>,
    pub phase_duration: f64,
    /// `groups[g]` lists road indices released by group `g`
    pub groups: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub roads: Vec<RoadConfig>,
    /// Permitted transitions as `(from, to)` road indices
    #[serde(default)]
    pub connections: Vec<(usize, usize)>,
    #[serde(default)]
    pub origins: Vec<usize>,
    #[serde(default)]
    pub destinations: Vec<usize>,
    /// Candidate routes; enumerated from origins to destinations when absent
    #[serde(default)]
    pub routes: Option<Vec<Vec<usize>>>,
    #[serde(default = "default_max_route_len")]
    pub max_route_len: usize,
    #[serde(default)]
    pub signals: Vec<SignalConfig>,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub learner: LearnerConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        let left = -100.0 * 3f64.sqrt();
        let right = 100.0 * 3f64.sqrt();
        let (bottom, top) = (-100.0, 100.0);
        let (fast, slow) = (1.0, 0.5);
        let stop_distance = 50.0;
        let wait_time = 1.0;

        let road = |start: [f64; 2], end: [f64; 2], slow_factor: f64| RoadConfig {
            start,
            end,
            slow_factor,
            stop_distance,
            wait_time,
        };

        Self {
            roads: vec![
                // Entry from the left towards the top, slow exit
                road([left + 2.0, 4.0], [-5.0, top - 2.0], slow),
                road([5.0, top - 2.0], [right - 2.0, 4.0], fast),
                // Entry from the left towards the bottom
                road([left + 2.0, -4.0], [-5.0, bottom + 2.0], fast),
                road([5.0, bottom + 2.0], [right - 2.0, -4.0], slow),
            ],
            connections: vec![(0, 3), (0, 1), (2, 3), (2, 1)],
            origins: vec![0, 2],
            destinations: vec![3, 1],
            routes: Some(vec![vec![0, 3], vec![0, 1], vec![2, 3], vec![2, 1]]),
            max_route_len: DEFAULT_MAX_ROUTE_LEN,
            signals: Vec::new(),
            generator: GeneratorConfig {
                vehicle_rate: 60.0,
                vehicle_limit: 10,
                vehicle: VehicleParams {
                    v_max: 15.0,
                    a_max: 1.0,
                    b_max: 3.0,
                    ..VehicleParams::default()
                },
            },
            learner: LearnerConfig::default(),
        }
    }
}

impl Scenario {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let scenario: Scenario = serde_json::from_str(text).context("Failed to parse scenario")?;
        if scenario.roads.is_empty() {
            bail!("Scenario has no roads");
        }
        Ok(scenario)
    }

    fn network(&self) -> Result<SimRoadNetwork> {
        let mut network = SimRoadNetwork::new();
        for idx in 0..self.roads.len() {
            network.add_road(RoadId(idx));
        }
        for (from, to) in &self.connections {
            network
                .connect(RoadId(*from), RoadId(*to))
                .with_context(|| format!("Invalid connection {} -> {}", from, to))?;
        }
        Ok(network)
    }

    /// Candidate routes: the explicit list, validated, or every simple path
    /// from an origin to a destination.
    pub fn routes(&self) -> Result<Vec<Vec<RoadId>>> {
        let network = self.network()?;
        let routes = match &self.routes {
            Some(routes) => {
                let routes: Vec<Vec<RoadId>> = routes
                    .iter()
                    .map(|route| route.iter().copied().map(RoadId).collect())
                    .collect();
                for (idx, route) in routes.iter().enumerate() {
                    network
                        .validate_path(route)
                        .with_context(|| format!("Invalid route #{}", idx))?;
                }
                routes
            }
            None => {
                let origins: Vec<RoadId> = self.origins.iter().copied().map(RoadId).collect();
                let destinations: Vec<RoadId> =
                    self.destinations.iter().copied().map(RoadId).collect();
                network.enumerate_routes(&origins, &destinations, self.max_route_len)?
            }
        };
        if routes.is_empty() {
            bail!("Scenario yields no routes");
        }
        Ok(routes)
    }

    /// Fresh world for one round, releasing vehicles by `preferences`
    pub fn build_world(&self, seed: u64, preferences: Vec<Vec<f64>>) -> Result<SimWorld> {
        let mut world = SimWorld::new_with_seed(seed);
        for (idx, road) in self.roads.iter().enumerate() {
            world
                .add_road(
                    Position::from(road.start),
                    Position::from(road.end),
                    road.slow_factor,
                    road.stop_distance,
                    road.wait_time,
                )
                .with_context(|| format!("Invalid road #{}", idx))?;
        }
        for (from, to) in &self.connections {
            world.connect(RoadId(*from), RoadId(*to))?;
        }
        for (idx, config) in self.signals.iter().enumerate() {
            let signal = TrafficSignal::new(config.cycle.clone(), config.phase_duration)
                .with_context(|| format!("Invalid signal #{}", idx))?;
            let groups: Vec<Vec<RoadId>> = config
                .groups
                .iter()
                .map(|roads| roads.iter().copied().map(RoadId).collect())
                .collect();
            world.add_signal(signal, &groups)?;
        }

        let generator = VehicleGenerator::new(self.generator, self.routes()?, preferences)?;
        world.set_generator(generator);
        Ok(world)
    }
}
