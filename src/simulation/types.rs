//! Core types for the traffic simulation
//!
//! Identifiers, geometry scalars and the transient leader view shared by
//! vehicles and roads.

use serde::{Deserialize, Serialize};

/// A wrapper type for road IDs
///
/// The wrapped value is the road's index in the world's road list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoadId(pub usize);

/// Stable identity of a vehicle, shared by all of its round records
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct VehicleLabel(pub u32);

/// A 2D position in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[f64; 2]> for Position {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

/// Read-only view of a leading vehicle for one car-following step.
///
/// Either the predecessor in a road queue, or a ghost: a vehicle on the next
/// road projected back onto this road by adding this road's length to `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeadSnapshot {
    pub label: VehicleLabel,
    pub x: f64,
    pub v: f64,
    pub length: f64,
}

impl LeadSnapshot {
    /// Shift the snapshot forward by `offset`, usually the length of the road
    /// the follower is on.
    pub fn ghost(mut self, offset: f64) -> Self {
        self.x += offset;
        self
    }
}

/// Value written in exported records when a vehicle had no leader on a road
pub const NO_LEADER_SENTINEL: i64 = -999;

/// Destination tail must be further than this multiple of the minimum gap
/// (plus one vehicle length) before another vehicle may enter
pub const SAFE_ENTRY_MULTIPLIER: f64 = 1.5;

/// Below this fraction of its desired speed the head vehicle estimates its
/// arrival with the mean of current and desired speed
pub const CRAWL_FRACTION: f64 = 0.25;

/// Default simulation time step in seconds
pub const DEFAULT_DT: f64 = 1.0 / 20.0;
