//! HTTP route handlers.

pub mod health;
pub mod marketplace;
pub mod onboarding;
