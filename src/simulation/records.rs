//! Trip record store
//!
//! One record per vehicle and round: the route driven, total travel time, who
//! was ahead on each road and how long the vehicle stood still there. The
//! learner reads these between rounds.

use std::collections::{BTreeMap, HashMap};

use log::warn;
use serde::Serialize;

use super::types::{RoadId, VehicleLabel, NO_LEADER_SENTINEL};

/// Accumulated trip data for one vehicle in one round
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TripRecord {
    pub label: VehicleLabel,
    /// Roads of the vehicle's path, in order
    pub road_order: Vec<RoadId>,
    /// Time spent after leaving the entry position of the first road
    pub total_time: f64,
    /// Leader on each visited road, recorded when the vehicle first updates there
    pub leading_vehicles: Vec<Option<VehicleLabel>>,
    /// Stopped time per road while following another vehicle
    pub stopped_time: Vec<f64>,
    /// Stopped time per road while at the head of the queue
    pub stopped_while_front: Vec<f64>,
}

impl TripRecord {
    pub fn new(label: VehicleLabel) -> Self {
        Self {
            label,
            ..Default::default()
        }
    }

    /// Size the per-road vectors from the vehicle's path on first use.
    pub fn ensure_initialized(&mut self, path: &[RoadId]) {
        if self.road_order.is_empty() {
            self.road_order = path.to_vec();
            self.stopped_time = vec![0.0; path.len()];
            self.stopped_while_front = vec![0.0; path.len()];
        }
    }

    /// Stopped-while-front time on `road`, or zero if the road is not on the route
    pub fn front_stop_time_on(&self, road: RoadId) -> f64 {
        self.road_order
            .iter()
            .position(|r| *r == road)
            .and_then(|idx| self.stopped_while_front.get(idx).copied())
            .unwrap_or(0.0)
    }
}

/// Explicit mapping from vehicle label to its record for the current round
#[derive(Debug, Clone, Default)]
pub struct TripRecordStore {
    records: BTreeMap<VehicleLabel, TripRecord>,
}

impl TripRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an empty record, replacing any previous one for the label
    pub fn insert_new(&mut self, label: VehicleLabel) {
        self.records.insert(label, TripRecord::new(label));
    }

    /// Record for `label`, created empty if the vehicle was placed without one
    pub fn entry(&mut self, label: VehicleLabel) -> &mut TripRecord {
        self.records
            .entry(label)
            .or_insert_with(|| TripRecord::new(label))
    }

    pub fn get(&self, label: VehicleLabel) -> Option<&TripRecord> {
        self.records.get(&label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TripRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Delay each vehicle caused by making followers stop behind it.
    pub fn caused_delays(&self) -> HashMap<VehicleLabel, f64> {
        caused_delays(self.records.values())
    }

    /// Flat export rows, leaders encoded with the `-999` sentinel
    pub fn rows(&self, round: u32) -> Vec<TripRecordRow> {
        self.records
            .values()
            .map(|record| TripRecordRow::from_record(record, round))
            .collect()
    }
}

fn caused_delays<'a>(records: impl Iterator<Item = &'a TripRecord>) -> HashMap<VehicleLabel, f64> {
    let mut delays: HashMap<VehicleLabel, f64> = HashMap::new();
    for record in records {
        delays.entry(record.label).or_insert(0.0);
        for (idx, stopped) in record.stopped_time.iter().enumerate() {
            if *stopped <= 0.0 {
                continue;
            }
            if let Some(Some(leader)) = record.leading_vehicles.get(idx) {
                *delays.entry(*leader).or_insert(0.0) += stopped;
            }
        }
    }
    delays
}

/// A trip record tagged with the round it was collected in
#[derive(Debug, Clone)]
pub struct RoundRecord {
    pub round: u32,
    pub record: TripRecord,
}

/// Averages for one vehicle on one candidate route over all rounds it took it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteSummary {
    pub count: u32,
    pub mean_total_time: f64,
    pub mean_caused_delay: f64,
}

/// All records collected across rounds
#[derive(Debug, Clone, Default)]
pub struct TripHistory {
    records: Vec<RoundRecord>,
}

impl TripHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a finished round's records into the history
    pub fn push_round(&mut self, round: u32, store: TripRecordStore) {
        self.records.extend(
            store
                .records
                .into_values()
                .map(|record| RoundRecord { round, record }),
        );
    }

    pub fn records(&self) -> &[RoundRecord] {
        &self.records
    }

    pub fn rounds(&self) -> impl Iterator<Item = u32> + '_ {
        let mut rounds: Vec<u32> = self.records.iter().map(|r| r.round).collect();
        rounds.dedup();
        rounds.into_iter()
    }

    /// Route taken by `label` in `round`, as an index into `all_routes`
    pub fn route_taken(
        &self,
        label: VehicleLabel,
        round: u32,
        all_routes: &[Vec<RoadId>],
    ) -> Option<usize> {
        self.records
            .iter()
            .find(|r| r.round == round && r.record.label == label)
            .and_then(|r| route_index(&r.record.road_order, all_routes))
    }

    /// Per (vehicle, route index) count and means of travel time and caused delay
    pub fn summarize(
        &self,
        all_routes: &[Vec<RoadId>],
    ) -> HashMap<(VehicleLabel, usize), RouteSummary> {
        let mut delays_by_round: HashMap<u32, HashMap<VehicleLabel, f64>> = HashMap::new();
        for round in self.rounds() {
            let round_records = self
                .records
                .iter()
                .filter(|r| r.round == round)
                .map(|r| &r.record);
            delays_by_round.insert(round, caused_delays(round_records));
        }

        // (count, time sum, delay sum)
        let mut sums: HashMap<(VehicleLabel, usize), (u32, f64, f64)> = HashMap::new();
        for entry in &self.records {
            let Some(route) = route_index(&entry.record.road_order, all_routes) else {
                warn!(
                    "Record for vehicle {:?} in round {} matches no candidate route; skipped",
                    entry.record.label, entry.round
                );
                continue;
            };
            let delay = delays_by_round
                .get(&entry.round)
                .and_then(|d| d.get(&entry.record.label))
                .copied()
                .unwrap_or(0.0);
            let sum = sums.entry((entry.record.label, route)).or_insert((0, 0.0, 0.0));
            sum.0 += 1;
            sum.1 += entry.record.total_time;
            sum.2 += delay;
        }

        sums.into_iter()
            .map(|(key, (count, time, delay))| {
                let n = f64::from(count);
                (
                    key,
                    RouteSummary {
                        count,
                        mean_total_time: time / n,
                        mean_caused_delay: delay / n,
                    },
                )
            })
            .collect()
    }

    pub fn rows(&self) -> Vec<TripRecordRow> {
        self.records
            .iter()
            .map(|r| TripRecordRow::from_record(&r.record, r.round))
            .collect()
    }
}

fn route_index(road_order: &[RoadId], all_routes: &[Vec<RoadId>]) -> Option<usize> {
    all_routes.iter().position(|route| route.as_slice() == road_order)
}

/// Flat, serializable form of a trip record
#[derive(Debug, Clone, Serialize)]
pub struct TripRecordRow {
    pub round: u32,
    pub vehicle_label: u32,
    pub road_order: Vec<usize>,
    pub total_time: f64,
    pub leading_vehicles: Vec<i64>,
    pub stopped_time: Vec<f64>,
    pub stopped_while_front: Vec<f64>,
}

impl TripRecordRow {
    fn from_record(record: &TripRecord, round: u32) -> Self {
        Self {
            round,
            vehicle_label: record.label.0,
            road_order: record.road_order.iter().map(|r| r.0).collect(),
            total_time: record.total_time,
            leading_vehicles: record
                .leading_vehicles
                .iter()
                .map(|lead| lead.map_or(NO_LEADER_SENTINEL, |l| i64::from(l.0)))
                .collect(),
            stopped_time: record.stopped_time.clone(),
            stopped_while_front: record.stopped_while_front.clone(),
        }
    }
}
