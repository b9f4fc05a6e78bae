//! Vehicle kinematics and car-following logic
//!
//! Intelligent-Driver-Model acceleration with an overriding brake when the
//! vehicle has been told to stop, plus per-tick trip telemetry.

use serde::{Deserialize, Serialize};

use super::records::TripRecord;
use super::types::{LeadSnapshot, RoadId, VehicleLabel};

/// Gaps at or below zero are clamped to this before dividing
const MIN_DELTA_X: f64 = 1e-6;

/// Physical and behavioural parameters of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    /// Vehicle length
    pub length: f64,
    /// Minimum bumper-to-bumper gap
    pub min_gap: f64,
    /// Desired time headway in seconds
    pub time_headway: f64,
    /// Nominal desired speed
    pub v_max: f64,
    /// Maximum acceleration
    pub a_max: f64,
    /// Comfortable deceleration
    pub b_max: f64,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            length: 5.0,
            min_gap: 4.0,
            time_headway: 1.0,
            v_max: 16.6,
            a_max: 1.44,
            b_max: 4.61,
        }
    }
}

impl VehicleParams {
    /// Gap and headway may be zero; everything else must be positive
    pub fn is_valid(&self) -> bool {
        let positive = [self.length, self.v_max, self.a_max, self.b_max];
        let non_negative = [self.min_gap, self.time_headway];
        positive.iter().all(|p| p.is_finite() && *p > 0.0)
            && non_negative.iter().all(|p| p.is_finite() && *p >= 0.0)
    }
}

/// A vehicle in the traffic simulation
#[derive(Debug, Clone)]
pub struct SimVehicle {
    pub label: VehicleLabel,
    pub params: VehicleParams,
    /// Effective desired speed, lowered by road speed limits
    pub v_max: f64,
    sqrt_ab: f64,
    /// Position along the current road, 0 at its entry
    pub x: f64,
    pub v: f64,
    pub a: f64,
    /// Roads to traverse, in order
    pub path: Vec<RoadId>,
    /// Index into `path` of the road currently occupied
    pub current_road_index: usize,
    /// Braking imposed from outside, e.g. while waiting for admission
    pub stopped: bool,
    /// Braking forced by a non-positive gap to the leader
    collision_hold: bool,
    /// Head of its road's queue inside the stop zone
    pub be_front: bool,
    pub total_time: f64,
}

impl SimVehicle {
    pub fn new(label: VehicleLabel, params: VehicleParams, path: Vec<RoadId>) -> Self {
        Self {
            label,
            params,
            v_max: params.v_max,
            sqrt_ab: 2.0 * (params.a_max * params.b_max).sqrt(),
            x: 0.0,
            v: 0.0,
            a: 0.0,
            path,
            current_road_index: 0,
            stopped: false,
            collision_hold: false,
            be_front: false,
            total_time: 0.0,
        }
    }

    /// Road currently occupied
    pub fn current_road(&self) -> Option<RoadId> {
        self.path.get(self.current_road_index).copied()
    }

    /// Next road on the path, if any
    pub fn next_road(&self) -> Option<RoadId> {
        self.path.get(self.current_road_index + 1).copied()
    }

    /// Whether the vehicle is braking, for either reason
    pub fn is_stopped(&self) -> bool {
        self.stopped || self.collision_hold
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn unstop(&mut self) {
        self.stopped = false;
    }

    pub fn slow(&mut self, v: f64) {
        self.v_max = v;
    }

    pub fn unslow(&mut self) {
        self.v_max = self.params.v_max;
    }

    /// Transient leader view of this vehicle
    pub fn snapshot(&self) -> LeadSnapshot {
        LeadSnapshot {
            label: self.label,
            x: self.x,
            v: self.v,
            length: self.params.length,
        }
    }

    /// Move onto the next road of the path at its entry point
    pub(crate) fn enter_next_road(&mut self) {
        self.current_road_index += 1;
        self.x = 0.0;
        self.be_front = false;
        self.unstop();
    }

    /// Advance one tick: integrate, pick a new acceleration, record telemetry
    pub fn update(&mut self, lead: Option<&LeadSnapshot>, dt: f64, record: &mut TripRecord) {
        self.integrate(dt);
        self.a = self.acceleration(lead);
        self.record_telemetry(lead, dt, record);
    }

    fn integrate(&mut self, dt: f64) {
        if self.v + self.a * dt < 0.0 {
            // Comes to rest within the tick
            self.x -= 0.5 * self.v * self.v / self.a;
            self.v = 0.0;
        } else {
            self.v += self.a * dt;
            // Hard braking near rest can make the step negative; never reverse
            self.x += (self.v * dt + self.a * dt * dt / 2.0).max(0.0);
        }
    }

    fn acceleration(&mut self, lead: Option<&LeadSnapshot>) -> f64 {
        let mut alpha = 0.0;
        match lead {
            Some(lead) => {
                let delta_x = lead.x - self.x - lead.length;
                let delta_v = self.v - lead.v;
                let desired_gap = self.params.min_gap
                    + (self.params.time_headway * self.v + delta_v * self.v / self.sqrt_ab)
                        .max(0.0);
                alpha = desired_gap / delta_x.max(MIN_DELTA_X);
                self.collision_hold = delta_x <= 0.0;
            }
            None => self.collision_hold = false,
        }

        let follow_acc = self.params.a_max * (1.0 - (self.v / self.v_max).powi(4) - alpha * alpha);
        let stop_acc = if self.is_stopped() {
            -self.params.b_max * self.v / self.v_max
        } else {
            follow_acc
        };

        let acc = follow_acc.min(stop_acc);
        if self.v > 0.0 {
            acc
        } else {
            acc.max(0.0)
        }
    }

    fn record_telemetry(&mut self, lead: Option<&LeadSnapshot>, dt: f64, record: &mut TripRecord) {
        record.ensure_initialized(&self.path);

        if self.x > 0.0 {
            record.total_time += dt;
            self.total_time += dt;
        }

        let idx = self.current_road_index;
        if idx + 1 > record.leading_vehicles.len() {
            record.leading_vehicles.push(lead.map(|l| l.label));
        }

        if self.v == 0.0 {
            let following = matches!(record.leading_vehicles.get(idx), Some(Some(_)));
            if following && self.x != 0.0 {
                if let Some(stopped) = record.stopped_time.get_mut(idx) {
                    *stopped += dt;
                }
            }
            if self.be_front {
                if let Some(stopped) = record.stopped_while_front.get_mut(idx) {
                    *stopped += dt;
                }
            }
        }
    }
}
