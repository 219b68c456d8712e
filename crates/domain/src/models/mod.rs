//! Domain models for the marketplace bridge.

pub mod customer;
pub mod entitlement;

pub use customer::{
    Customer, CustomerDetailsRequest, CustomerProfile, RegistrationStatus, ResolvedCustomer,
};
pub use entitlement::{
    EntitlementKey, EntitlementObservation, EntitlementValue, NewEntitlement, ObservedValue,
    StoredEntitlement, ValueType,
};
