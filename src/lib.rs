//! fleet-router
//!
//! Nearest-neighbor route planning for drivers, kept in step with their live
//! positions and open stops.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod haversine;
pub mod http;
pub mod memory;
pub mod model;
pub mod osrm;
pub mod planner;
pub mod service;
pub mod tracker;
pub mod traits;
