//! Domain layer for the marketplace bridge.
//!
//! This crate contains:
//! - Domain models (entitlement values, observations, customers)
//! - The entitlement reconciler and the storage contract it runs against
//! - Domain error types

pub mod models;
pub mod services;
