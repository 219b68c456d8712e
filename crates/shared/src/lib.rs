//! Shared utilities and common types for the marketplace bridge.
//!
//! This crate provides common functionality used across all other crates:
//! - Token fingerprinting for log-safe identifiers
//! - Form field validation
//! - Epoch timestamp conversion

pub mod crypto;
pub mod time;
pub mod validation;
