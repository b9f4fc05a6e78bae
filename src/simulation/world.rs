//! Main simulation world that ties everything together
//!
//! Owns the roads, the admission priority table and the trip records, and
//! advances them one fixed time step at a time.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::generator::VehicleGenerator;
use super::intersection::PriorityTable;
use super::records::TripRecordStore;
use super::road::{SignalBinding, SimRoad};
use super::road_network::SimRoadNetwork;
use super::signal::TrafficSignal;
use super::stats::SimulationStats;
use super::types::{
    LeadSnapshot, Position, RoadId, VehicleLabel, CRAWL_FRACTION, SAFE_ENTRY_MULTIPLIER,
};
use super::vehicle::{SimVehicle, VehicleParams};

/// Labels handed out by `add_vehicle` start here, clear of generator labels
pub const MANUAL_LABEL_BASE: u32 = 1_000_000;

/// What the arbiter needs to know about a vehicle's next road
#[derive(Debug, Clone, Copy)]
struct Destination {
    id: RoadId,
    wait_time: f64,
    wait_buffer: f64,
    slow_factor: f64,
    driven: bool,
    appended: bool,
    tail: Option<LeadSnapshot>,
}

/// The main simulation world
pub struct SimWorld {
    /// Roads, indexed by `RoadId`
    pub roads: Vec<SimRoad>,

    /// Permitted road-to-road transitions
    pub road_network: SimRoadNetwork,

    pub signals: Vec<TrafficSignal>,

    pub generator: Option<VehicleGenerator>,

    /// Who gets to enter each contested road next; persists across ticks
    pub priority: PriorityTable,

    /// Trip records of the current round
    pub records: TripRecordStore,

    /// Simulation time
    pub time: f64,

    pub frame: u64,

    /// RNG behind the per-tick road shuffle and route sampling
    rng: StdRng,

    stats: SimulationStats,

    next_manual_label: u32,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    fn new_internal(rng: StdRng) -> Self {
        Self {
            roads: Vec::new(),
            road_network: SimRoadNetwork::new(),
            signals: Vec::new(),
            generator: None,
            priority: PriorityTable::new(),
            records: TripRecordStore::new(),
            time: 0.0,
            frame: 0,
            rng,
            stats: SimulationStats::default(),
            next_manual_label: MANUAL_LABEL_BASE,
        }
    }

    pub fn new() -> Self {
        Self::new_internal(StdRng::from_os_rng())
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_internal(StdRng::seed_from_u64(seed))
    }

    /// Add a road; its ID is its position in the road list
    pub fn add_road(
        &mut self,
        start: Position,
        end: Position,
        slow_factor: f64,
        stop_distance: f64,
        wait_time: f64,
    ) -> Result<RoadId> {
        let id = RoadId(self.roads.len());
        let road = SimRoad::new(id, start, end, slow_factor, stop_distance, wait_time)?;
        self.roads.push(road);
        self.road_network.add_road(id);
        Ok(id)
    }

    /// Allow vehicles to continue from the end of `from` onto `to`
    pub fn connect(&mut self, from: RoadId, to: RoadId) -> Result<()> {
        self.road_network.connect(from, to)
    }

    /// Add a signal; `groups[g]` lists the roads released by group `g`
    pub fn add_signal(&mut self, signal: TrafficSignal, groups: &[Vec<RoadId>]) -> Result<usize> {
        if groups.len() != signal.group_count() {
            bail!(
                "Signal has {} groups but {} road groups were given",
                signal.group_count(),
                groups.len()
            );
        }
        let index = self.signals.len();
        for (group, roads) in groups.iter().enumerate() {
            for road_id in roads {
                let road = self
                    .roads
                    .get_mut(road_id.0)
                    .with_context(|| format!("Signal road {:?} not found", road_id))?;
                road.signal = Some(SignalBinding {
                    signal: index,
                    group,
                });
            }
        }
        self.signals.push(signal);
        Ok(index)
    }

    pub fn set_generator(&mut self, generator: VehicleGenerator) {
        self.generator = Some(generator);
    }

    /// Place a vehicle at the entry of the first road of `path`
    pub fn add_vehicle(&mut self, params: VehicleParams, path: Vec<RoadId>) -> Result<VehicleLabel> {
        let label = VehicleLabel(self.next_manual_label);
        self.add_vehicle_with_label(label, params, path)?;
        self.next_manual_label += 1;
        Ok(label)
    }

    /// Place a vehicle with a caller-chosen label
    pub fn add_vehicle_with_label(
        &mut self,
        label: VehicleLabel,
        params: VehicleParams,
        path: Vec<RoadId>,
    ) -> Result<()> {
        if !params.is_valid() {
            bail!("Invalid vehicle parameters: {:?}", params);
        }
        self.road_network
            .validate_path(&path)
            .with_context(|| format!("Invalid path for vehicle {:?}", label))?;
        if self.vehicle(label).is_some() {
            bail!("Vehicle {:?} is already in the simulation", label);
        }

        let vehicle = SimVehicle::new(label, params, path);
        let first = vehicle.current_road().context("Path is empty")?;
        self.roads[first.0].vehicles.push_back(vehicle);
        self.records.insert_new(label);
        self.stats.total_vehicles_spawned += 1;
        self.refresh_stats();
        Ok(())
    }

    pub fn road(&self, id: RoadId) -> Option<&SimRoad> {
        self.roads.get(id.0)
    }

    /// Mutable access for scenario setup and tests
    pub fn road_mut(&mut self, id: RoadId) -> Option<&mut SimRoad> {
        self.roads.get_mut(id.0)
    }

    /// All vehicles currently on a road
    pub fn vehicles(&self) -> impl Iterator<Item = &SimVehicle> {
        self.roads.iter().flat_map(|road| road.vehicles.iter())
    }

    pub fn vehicle(&self, label: VehicleLabel) -> Option<&SimVehicle> {
        self.vehicles().find(|v| v.label == label)
    }

    pub fn vehicle_count(&self) -> usize {
        self.roads.iter().map(SimRoad::len).sum()
    }

    pub fn stats(&self) -> SimulationStats {
        self.stats
    }

    /// A vehicle was placed, every road is empty and nothing is left to release
    pub fn is_finished(&self) -> bool {
        let generator_done = self
            .generator
            .as_ref()
            .map_or(true, |generator| !generator.has_pending());
        self.stats.total_vehicles_spawned > 0
            && generator_done
            && self.roads.iter().all(SimRoad::is_empty)
    }

    /// Hand the round's records to the caller, leaving an empty store
    pub fn take_records(&mut self) -> TripRecordStore {
        std::mem::take(&mut self.records)
    }

    /// Tick up to `ticks` times, stopping early once finished.
    /// Returns the number of ticks run.
    pub fn run(&mut self, ticks: u64, dt: f64) -> u64 {
        for done in 0..ticks {
            if self.is_finished() {
                return done;
            }
            self.tick(dt);
        }
        ticks
    }

    /// Advance the simulation by one time step
    pub fn tick(&mut self, dt: f64) {
        self.refresh_priorities();

        // Fresh processing order every tick so no approach is favoured
        let mut order: Vec<usize> = (0..self.roads.len()).collect();
        order.shuffle(&mut self.rng);

        let mut decremented: HashSet<RoadId> = HashSet::new();
        for idx in order {
            if self.roads[idx].is_empty() {
                continue;
            }
            let front_lead = self.arbitrate_road(idx, dt, &mut decremented);
            self.roads[idx].update(dt, &mut self.records, front_lead.as_ref());
        }

        if let Some(generator) = self.generator.as_mut() {
            if generator
                .update(self.time, &mut self.roads, &mut self.records, &mut self.rng)
                .is_some()
            {
                self.stats.total_vehicles_spawned += 1;
            }
        }

        for signal in &mut self.signals {
            signal.update(self.time);
        }

        self.time += dt;
        self.frame += 1;
        self.refresh_stats();
    }

    /// Reset per-tick flags and rank every head vehicle for its next road
    fn refresh_priorities(&mut self) {
        for road in &mut self.roads {
            road.appended = false;
            let Some(head) = road.vehicles.front() else {
                road.driven = false;
                continue;
            };
            let Some(next) = head.next_road() else {
                continue;
            };
            let stopped = self
                .records
                .get(head.label)
                .and_then(|r| r.stopped_while_front.get(head.current_road_index))
                .copied()
                .unwrap_or(0.0);
            self.priority.update(next, head.label, stopped);
        }
    }

    fn is_green(&self, road_idx: usize) -> bool {
        match self.roads[road_idx].signal {
            Some(binding) => self
                .signals
                .get(binding.signal)
                .map_or(true, |signal| signal.is_green(binding.group)),
            None => true,
        }
    }

    fn destination(&self, id: RoadId) -> Destination {
        let road = &self.roads[id.0];
        Destination {
            id,
            wait_time: road.wait_time,
            wait_buffer: road.wait_buffer,
            slow_factor: road.slow_factor,
            driven: road.driven,
            appended: road.appended,
            tail: road.tail().map(SimVehicle::snapshot),
        }
    }

    /// Decide stops and admissions for every vehicle on one road.
    ///
    /// Returns the lead the road's head should follow this tick: a ghost of
    /// the last vehicle on the head's next road, or of the vehicle that just
    /// left this road.
    fn arbitrate_road(
        &mut self,
        idx: usize,
        dt: f64,
        decremented: &mut HashSet<RoadId>,
    ) -> Option<LeadSnapshot> {
        let length = self.roads[idx].length;
        let green = self.is_green(idx);
        let mut front_lead = None;

        let mut j = 0;
        while j < self.roads[idx].vehicles.len() {
            let Some(next) = self.roads[idx].vehicles[j].next_road() else {
                // Last road of the trip
                if self.roads[idx].vehicles[j].x >= length {
                    if let Some(vehicle) = self.roads[idx].vehicles.remove(j) {
                        debug!(
                            "Vehicle {:?} completed its trip in {:.2}s",
                            vehicle.label, vehicle.total_time
                        );
                        self.stats.total_vehicles_completed += 1;
                    }
                    continue;
                }
                j += 1;
                continue;
            };
            if next.0 >= self.roads.len() {
                warn!(
                    "Vehicle {:?} targets unknown road {:?}",
                    self.roads[idx].vehicles[j].label, next
                );
                j += 1;
                continue;
            }

            if decremented.insert(next) {
                self.roads[next.0].wait_time -= dt;
            }
            let dest = self.destination(next);

            let road = &mut self.roads[idx];
            let in_stop_zone = road.in_stop_zone(road.vehicles[j].x);
            let vehicle = &mut road.vehicles[j];
            if in_stop_zone {
                plan_approach(vehicle, j, length, green, &dest);
            }

            if j == 0 {
                vehicle.be_front = true;
                if dest.wait_time <= 0.0 && dest.driven && green {
                    vehicle.unstop();
                }
                if let Some(tail) = dest.tail {
                    front_lead = Some(closer_lead(front_lead, tail.ghost(length)));
                }

                if vehicle.x >= length {
                    let clearance =
                        SAFE_ENTRY_MULTIPLIER * vehicle.params.min_gap + vehicle.params.length;
                    let gap_ok = dest.tail.map_or(true, |tail| tail.x > clearance);
                    let has_priority = self.priority.holds_priority(next, vehicle.label);

                    if dest.wait_time <= 0.0 && !dest.appended && gap_ok && has_priority && green
                    {
                        front_lead = self.admit(idx, &dest).map(|lead| lead.ghost(length));
                        continue;
                    }

                    vehicle.slow(dest.slow_factor * vehicle.params.v_max);
                    vehicle.stop();
                }
            }
            j += 1;
        }

        front_lead
    }

    /// Move the head of road `idx` onto `dest`. Returns its snapshot at entry.
    fn admit(&mut self, idx: usize, dest: &Destination) -> Option<LeadSnapshot> {
        let mut vehicle = self.roads[idx].vehicles.pop_front()?;
        vehicle.enter_next_road();
        let snapshot = vehicle.snapshot();
        self.priority.remove(dest.id, vehicle.label);

        debug!(
            "Vehicle {:?} admitted from {:?} to {:?} at t={:.2}",
            vehicle.label,
            RoadId(idx),
            dest.id,
            self.time
        );

        let road = &mut self.roads[dest.id.0];
        road.vehicles.push_back(vehicle);
        road.driven = true;
        road.appended = true;
        road.wait_time = road.wait_buffer;
        self.stats.total_admissions += 1;
        Some(snapshot)
    }

    fn refresh_stats(&mut self) {
        self.stats.active_vehicles = self.vehicle_count() as u32;
        self.stats.total_roads = self.roads.len() as u32;
        self.stats.elapsed_time = self.time;
    }

    /// Log a summary of the world's current state
    pub fn log_summary(&self) {
        info!(
            "t={:.2}s frame={} vehicles={} records={}",
            self.time,
            self.frame,
            self.vehicle_count(),
            self.records.len()
        );
        for road in &self.roads {
            if road.is_empty() {
                continue;
            }
            let labels: Vec<u32> = road.vehicles.iter().map(|v| v.label.0).collect();
            info!("  Road {}: {:?}", road.id.0, labels);
        }
    }
}

/// Keep whichever lead is nearer, so a vehicle that just left stays visible
fn closer_lead(current: Option<LeadSnapshot>, candidate: LeadSnapshot) -> LeadSnapshot {
    match current {
        Some(current) if current.x <= candidate.x => current,
        _ => candidate,
    }
}

/// Stop-zone decision: brake now if the vehicle would reach the end of the
/// road before the next road's cooldown runs out.
///
/// Followers at queue position `j` must also wait for the `j` admissions
/// ahead of them.
fn plan_approach(vehicle: &mut SimVehicle, j: usize, length: f64, green: bool, dest: &Destination) {
    vehicle.slow(dest.slow_factor * vehicle.params.v_max);
    let remaining = length - vehicle.x;

    if j == 0 {
        vehicle.be_front = true;
        let crawling = vehicle.v < CRAWL_FRACTION * vehicle.v_max;
        let blended = (vehicle.v + vehicle.v_max) / 2.0;
        let arrives_late = if !green {
            false
        } else if dest.wait_time <= 0.0 {
            true
        } else if remaining / (vehicle.v_max * dest.wait_time) >= 1.0 {
            true
        } else {
            crawling && remaining / (blended * dest.wait_time) >= 1.0
        };
        if arrives_late {
            vehicle.unstop();
        } else {
            vehicle.stop();
        }
        return;
    }

    let horizon = j as f64 * dest.wait_buffer + dest.wait_time;
    if horizon > 0.0 {
        let blended = (vehicle.v + vehicle.v_max) / 2.0;
        if remaining / (blended * horizon) >= 1.0 {
            vehicle.unstop();
        } else {
            vehicle.stop();
        }
    } else {
        vehicle.unstop();
    }
}
