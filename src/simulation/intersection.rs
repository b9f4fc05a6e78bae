//! Admission priority at merge points
//!
//! Head vehicles that want to enter the same road compete for it. Each
//! contender is ranked by how long it has been standing at the front of its
//! own road; the longest waiter holds priority. The table persists across
//! ticks and is owned by the world.

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use sorted_vec::SortedVec;

use super::types::{RoadId, VehicleLabel};

/// (stopped time, first-seen sequence, label), ascending
type Contender = (OrderedFloat<f64>, u64, VehicleLabel);

/// Per-destination ranking of vehicles waiting to enter
#[derive(Debug, Clone, Default)]
pub struct PriorityTable {
    queues: HashMap<RoadId, SortedVec<Contender>>,
    next_seq: u64,
}

impl PriorityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a contender's stopped time for `destination`.
    ///
    /// A refreshed entry keeps the sequence number it was first seen with, so
    /// equal times rank by first appearance and the latest newcomer wins ties.
    pub fn update(&mut self, destination: RoadId, label: VehicleLabel, stopped_time: f64) {
        let queue = self.queues.entry(destination).or_insert_with(SortedVec::new);
        let seq = match queue.iter().position(|(_, _, l)| *l == label) {
            Some(idx) => queue.remove_index(idx).1,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        queue.insert((OrderedFloat(stopped_time), seq, label));
    }

    /// The contender currently holding priority for `destination`
    pub fn top(&self, destination: RoadId) -> Option<VehicleLabel> {
        self.queues
            .get(&destination)
            .and_then(|queue| queue.last())
            .map(|(_, _, label)| *label)
    }

    /// True when `label` may enter `destination` as far as priority goes
    pub fn holds_priority(&self, destination: RoadId, label: VehicleLabel) -> bool {
        match self.top(destination) {
            Some(top) => top == label,
            None => true,
        }
    }

    /// Drop a contender once it has entered `destination`
    pub fn remove(&mut self, destination: RoadId, label: VehicleLabel) {
        if let Some(queue) = self.queues.get_mut(&destination) {
            if let Some(idx) = queue.iter().position(|(_, _, l)| *l == label) {
                queue.remove_index(idx);
            }
            if queue.is_empty() {
                self.queues.remove(&destination);
            }
        }
    }

    /// Contenders for `destination`, lowest priority first
    pub fn contenders(&self, destination: RoadId) -> Vec<(VehicleLabel, f64)> {
        self.queues
            .get(&destination)
            .map(|queue| {
                queue
                    .iter()
                    .map(|(time, _, label)| (*label, time.into_inner()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
