//! Test fixtures for fleet-router.
//!
//! Real Las Vegas / Henderson collection sites and scriptable collaborators
//! that can fail, stall or count calls on demand.

#![allow(dead_code)]

pub mod collection_sites;
pub mod feed;
pub mod scripted;
