//! Route Learning Traffic Simulation Library
//!
//! A fixed-timestep traffic simulator whose drivers learn, round by round,
//! which route to take.

pub mod simulation;
