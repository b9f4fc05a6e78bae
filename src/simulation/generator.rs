//! Vehicle generation
//!
//! Releases vehicles at a fixed rate onto the first road of a route sampled
//! from each vehicle's route preferences.

use anyhow::{bail, Result};
use log::{debug, warn};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::records::TripRecordStore;
use super::road::SimRoad;
use super::types::{RoadId, VehicleLabel};
use super::vehicle::{SimVehicle, VehicleParams};

/// Generation settings for one round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Vehicles per minute
    pub vehicle_rate: f64,
    /// Total vehicles released per round
    pub vehicle_limit: u32,
    pub vehicle: VehicleParams,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            vehicle_rate: 20.0,
            vehicle_limit: 10,
            vehicle: VehicleParams::default(),
        }
    }
}

/// Rate-limited source of new vehicles
#[derive(Debug, Clone)]
pub struct VehicleGenerator {
    pub config: GeneratorConfig,
    routes: Vec<Vec<RoadId>>,
    /// Route probabilities per vehicle index
    preferences: Vec<Vec<f64>>,
    vehicle_cnt: u32,
    last_added_time: f64,
    upcoming: Option<SimVehicle>,
    exhausted: bool,
}

impl VehicleGenerator {
    pub fn new(
        config: GeneratorConfig,
        routes: Vec<Vec<RoadId>>,
        preferences: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if !config.vehicle_rate.is_finite() || config.vehicle_rate <= 0.0 {
            bail!("Vehicle rate must be positive, got {}", config.vehicle_rate);
        }
        if !config.vehicle.is_valid() {
            bail!("Invalid vehicle parameters: {:?}", config.vehicle);
        }
        if routes.is_empty() {
            bail!("Generator needs at least one route");
        }
        Ok(Self {
            config,
            routes,
            preferences,
            vehicle_cnt: 0,
            last_added_time: 0.0,
            upcoming: None,
            exhausted: false,
        })
    }

    /// Generator where every vehicle picks each route with equal probability
    pub fn uniform(config: GeneratorConfig, routes: Vec<Vec<RoadId>>) -> Result<Self> {
        let share = 1.0 / routes.len().max(1) as f64;
        let preferences = vec![vec![share; routes.len()]; config.vehicle_limit as usize];
        Self::new(config, routes, preferences)
    }

    /// Number of vehicles released so far
    pub fn vehicle_count(&self) -> u32 {
        self.vehicle_cnt
    }

    /// Whether more vehicles may still be released this round
    pub fn has_pending(&self) -> bool {
        !self.exhausted && self.vehicle_cnt < self.config.vehicle_limit
    }

    fn generate_vehicle<R: Rng>(&mut self, rng: &mut R) -> Option<SimVehicle> {
        let probs = self.preferences.get(self.vehicle_cnt as usize)?;
        let weights = match WeightedIndex::new(probs) {
            Ok(weights) => weights,
            Err(err) => {
                warn!(
                    "Unusable route preferences for vehicle {}: {}",
                    self.vehicle_cnt, err
                );
                return None;
            }
        };
        let route = self.routes.get(weights.sample(rng))?.clone();
        Some(SimVehicle::new(
            VehicleLabel(self.vehicle_cnt),
            self.config.vehicle,
            route,
        ))
    }

    /// Try to place the upcoming vehicle at the entry of its first road.
    ///
    /// Returns the label of the vehicle placed, if any.
    pub fn update<R: Rng>(
        &mut self,
        t: f64,
        roads: &mut [SimRoad],
        records: &mut TripRecordStore,
        rng: &mut R,
    ) -> Option<VehicleLabel> {
        if !self.has_pending() {
            return None;
        }
        if self.upcoming.is_none() {
            self.upcoming = self.generate_vehicle(rng);
            if self.upcoming.is_none() {
                self.exhausted = true;
                return None;
            }
        }
        if t - self.last_added_time < 60.0 / self.config.vehicle_rate {
            return None;
        }

        let vehicle = self.upcoming.as_ref()?;
        let first_road = vehicle.current_road()?;
        let road = roads.get_mut(first_road.0)?;
        let clearance = vehicle.params.min_gap + vehicle.params.length;
        let has_room = road.tail().map_or(true, |tail| tail.x > clearance);
        if !has_room {
            return None;
        }

        let vehicle = self.upcoming.take()?;
        let label = vehicle.label;
        debug!("Vehicle {:?} generated onto {:?} at t={:.2}", label, first_road, t);
        road.vehicles.push_back(vehicle);
        records.insert_new(label);
        self.last_added_time = t;
        self.vehicle_cnt += 1;
        Some(label)
    }
}
