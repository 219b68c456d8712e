//! Persistence layer for the marketplace bridge.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations, including the Postgres-backed
//!   entitlement store used by the reconciler

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
