//! Domain layer for the stale-issue reaper
//!
//! This module contains the policy logic, models and ports.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
