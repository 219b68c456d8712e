//! Domain services.

pub mod reconciler;

pub use reconciler::{
    Clock, EntitlementLedger, EntitlementStore, ReconcileDecision, ReconcileError,
    ReconcileOutcome, ReconciledEntitlement, Reconciler, SystemClock,
};
