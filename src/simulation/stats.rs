//! Simulation statistics

use log::info;
use serde::Serialize;

/// Counters tracked by the world over one round
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SimulationStats {
    pub total_vehicles_spawned: u32,
    pub total_vehicles_completed: u32,
    pub active_vehicles: u32,
    pub total_roads: u32,
    pub total_admissions: u32,
    pub elapsed_time: f64,
}

impl SimulationStats {
    /// Vehicles on roads plus finished vehicles equals vehicles ever placed
    pub fn conservation_holds(&self) -> bool {
        self.active_vehicles + self.total_vehicles_completed == self.total_vehicles_spawned
    }

    pub fn completion_rate(&self) -> f64 {
        if self.total_vehicles_spawned > 0 {
            f64::from(self.total_vehicles_completed) / f64::from(self.total_vehicles_spawned)
                * 100.0
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        info!("Elapsed time: {:.2}s", self.elapsed_time);
        info!("Total vehicles spawned: {}", self.total_vehicles_spawned);
        info!("Total vehicles completed: {}", self.total_vehicles_completed);
        info!("Active vehicles: {}", self.active_vehicles);
        info!("Total roads: {}", self.total_roads);
        info!("Total admissions: {}", self.total_admissions);
        info!("Completion rate: {:.1}%", self.completion_rate());
    }
}
