//! Road segments and their vehicle queues

use std::collections::VecDeque;

use anyhow::{bail, Result};

use super::records::TripRecordStore;
use super::types::{LeadSnapshot, Position, RoadId};
use super::vehicle::SimVehicle;

/// A traffic signal group controlling admission out of a road
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalBinding {
    pub signal: usize,
    pub group: usize,
}

/// A directed road segment holding a FIFO queue of vehicles
///
/// The head of the queue is the vehicle furthest along the road. Vehicles
/// join at the tail at `x = 0` and only the head leaves.
#[derive(Debug, Clone)]
pub struct SimRoad {
    pub id: RoadId,
    pub start: Position,
    pub end: Position,
    pub length: f64,
    /// Speed-limit multiplier applied to vehicles about to enter this road
    pub slow_factor: f64,
    /// Length of the zone before the end where vehicles plan for the next road
    pub stop_distance: f64,
    /// Countdown until the next vehicle may enter
    pub wait_time: f64,
    /// Value `wait_time` is reset to on every admission
    pub wait_buffer: f64,
    pub vehicles: VecDeque<SimVehicle>,
    /// Whether any vehicle has entered the road since it was last empty
    pub driven: bool,
    /// Whether a vehicle was admitted during the current tick
    pub appended: bool,
    pub signal: Option<SignalBinding>,
}

impl SimRoad {
    pub fn new(
        id: RoadId,
        start: Position,
        end: Position,
        slow_factor: f64,
        stop_distance: f64,
        wait_time: f64,
    ) -> Result<Self> {
        let length = start.distance(&end);
        if !length.is_finite() || length <= 0.0 {
            bail!("Road {:?} has degenerate length {}", id, length);
        }
        if !slow_factor.is_finite() || slow_factor <= 0.0 {
            bail!("Road {:?} has invalid slow factor {}", id, slow_factor);
        }
        if !stop_distance.is_finite() || stop_distance < 0.0 {
            bail!("Road {:?} has invalid stop distance {}", id, stop_distance);
        }
        if !wait_time.is_finite() || wait_time < 0.0 {
            bail!("Road {:?} has invalid wait time {}", id, wait_time);
        }

        Ok(Self {
            id,
            start,
            end,
            length,
            slow_factor,
            stop_distance,
            wait_time: 0.0,
            wait_buffer: wait_time,
            vehicles: VecDeque::new(),
            driven: false,
            appended: false,
            signal: None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn head(&self) -> Option<&SimVehicle> {
        self.vehicles.front()
    }

    pub fn tail(&self) -> Option<&SimVehicle> {
        self.vehicles.back()
    }

    /// Whether position `x` lies inside the stop zone
    pub fn in_stop_zone(&self, x: f64) -> bool {
        x >= self.length - self.stop_distance && x < self.length
    }

    /// Update every vehicle head to tail against its leader.
    ///
    /// The head follows `front_lead`; everyone else follows the vehicle
    /// directly ahead, as already updated this tick.
    pub fn update(&mut self, dt: f64, records: &mut TripRecordStore, front_lead: Option<&LeadSnapshot>) {
        let mut lead = front_lead.copied();
        for vehicle in self.vehicles.iter_mut() {
            let record = records.entry(vehicle.label);
            vehicle.update(lead.as_ref(), dt, record);
            lead = Some(vehicle.snapshot());
        }
    }
}
