//! Repository implementations for database operations.

pub mod customer;
pub mod entitlement;

pub use customer::CustomerRepository;
pub use entitlement::{EntitlementRepository, PgEntitlementLedger, PgEntitlementStore};
