//! HTTP service bridging AWS Marketplace registrations to the customer registry.

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
