//! Standalone traffic simulation module
//!
//! Vehicles, roads and the admission arbiter that moves vehicles between
//! roads, plus the trip records and route learner that carry information
//! from one round to the next.

mod experiment;
mod generator;
mod intersection;
mod learner;
mod records;
mod road;
mod road_network;
mod scenario;
mod signal;
mod stats;
mod types;
mod vehicle;
mod world;

pub use experiment::{Experiment, ExperimentOptions, ExperimentReport, RoundSummary};
pub use generator::{GeneratorConfig, VehicleGenerator};
pub use intersection::PriorityTable;
pub use learner::{
    compute_probability, compute_utility, exploration_bonus, LearnerConfig, LearnerState,
    RouteLearner, EXPLORATION_THRESHOLD, UNEXPLORED_COUNT,
};
pub use records::{
    RoundRecord, RouteSummary, TripHistory, TripRecord, TripRecordRow, TripRecordStore,
};
pub use road::{SignalBinding, SimRoad};
pub use road_network::SimRoadNetwork;
pub use scenario::{RoadConfig, Scenario, SignalConfig};
pub use signal::TrafficSignal;
pub use stats::SimulationStats;
pub use types::{
    LeadSnapshot, Position, RoadId, VehicleLabel, CRAWL_FRACTION, DEFAULT_DT,
    NO_LEADER_SENTINEL, SAFE_ENTRY_MULTIPLIER,
};
pub use vehicle::{SimVehicle, VehicleParams};
pub use world::{SimWorld, MANUAL_LABEL_BASE};
