//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod customer;
pub mod entitlement;

pub use customer::{CustomerEntity, RegistrationCheckEntity};
pub use entitlement::{
    CurrentEntitlementEntity, EntitlementHistoryEntity, LatestEntitlementEntity,
    StoredValueError, ValueColumns, ValueTypeDb,
};
