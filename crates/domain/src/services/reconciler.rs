//! Entitlement reconciliation.
//!
//! The entitlement table is an append-only log keyed by
//! (customer, product, dimension). Reconciling a batch of observations
//! appends a new value and record for a key only when the observed value
//! differs from the key's latest record, so replaying a batch is a no-op.
//!
//! A batch is applied inside one storage transaction: either every decided
//! write commits or none does.

use async_trait::async_trait;
use std::collections::BTreeSet;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{
    EntitlementKey, EntitlementObservation, EntitlementValue, NewEntitlement, StoredEntitlement,
};
use shared::time::{epoch_seconds_to_utc, to_storage_precision};

/// Errors that abort a reconciliation batch.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Invalid entitlement value for {key}")]
    InvalidValue { key: EntitlementKey },

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] sqlx::Error),

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),
}

/// Source of creation timestamps for new records.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// An open storage transaction over the entitlement log.
///
/// Dropping a ledger without calling [`EntitlementLedger::commit`] must
/// discard every write made through it.
#[async_trait]
pub trait EntitlementLedger: Send {
    /// Serializes concurrent reconciliations of the same key until the
    /// transaction ends.
    async fn lock_triple(&mut self, key: &EntitlementKey) -> Result<(), sqlx::Error>;

    /// Most recent record for the key: highest `created_at`, ties broken by
    /// lowest id.
    async fn latest(&mut self, key: &EntitlementKey)
        -> Result<Option<StoredEntitlement>, sqlx::Error>;

    /// Inserts an immutable value row and returns its id.
    async fn insert_value(&mut self, value: &EntitlementValue) -> Result<i64, sqlx::Error>;

    /// Appends an entitlement record and returns its id.
    async fn insert_entitlement(&mut self, record: &NewEntitlement) -> Result<i64, sqlx::Error>;

    async fn commit(self) -> Result<(), sqlx::Error>;

    async fn rollback(self) -> Result<(), sqlx::Error>;
}

/// Storage provider able to open ledger transactions.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    type Ledger: EntitlementLedger;

    async fn begin(&self) -> Result<Self::Ledger, sqlx::Error>;
}

/// What reconciliation did with one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileDecision {
    /// No record existed for the key; one was created.
    Created,
    /// The latest record held a different value; a new record was appended.
    Changed,
    /// The latest record already held the observed value.
    Unchanged,
}

impl ReconcileDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileDecision::Created => "created",
            ReconcileDecision::Changed => "changed",
            ReconcileDecision::Unchanged => "unchanged",
        }
    }
}

/// Per-observation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledEntitlement {
    pub key: EntitlementKey,
    pub decision: ReconcileDecision,
    /// The appended record, or the latest record when unchanged.
    pub entitlement_id: i64,
}

/// Result of a committed batch, in observation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub entitlements: Vec<ReconciledEntitlement>,
}

impl ReconcileOutcome {
    fn count(&self, decision: ReconcileDecision) -> usize {
        self.entitlements
            .iter()
            .filter(|e| e.decision == decision)
            .count()
    }

    pub fn created(&self) -> usize {
        self.count(ReconcileDecision::Created)
    }

    pub fn changed(&self) -> usize {
        self.count(ReconcileDecision::Changed)
    }

    pub fn unchanged(&self) -> usize {
        self.count(ReconcileDecision::Unchanged)
    }

    /// Number of records appended to the log.
    pub fn appended(&self) -> usize {
        self.created() + self.changed()
    }
}

/// Applies batches of entitlement observations to the append-only log.
#[derive(Debug, Clone)]
pub struct Reconciler<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: EntitlementStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: SystemClock,
        }
    }
}

impl<S: EntitlementStore, C: Clock> Reconciler<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Reconciles a batch inside a single transaction.
    ///
    /// Any error rolls the transaction back and is returned unchanged.
    #[tracing::instrument(skip_all, fields(batch_size = batch.len()))]
    pub async fn reconcile(
        &self,
        batch: &[EntitlementObservation],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if batch.is_empty() {
            return Err(ReconcileError::PreconditionViolation(
                "entitlement batch must not be empty".to_string(),
            ));
        }

        let mut ledger = self.store.begin().await?;

        match self.apply(&mut ledger, batch).await {
            Ok(outcome) => {
                ledger.commit().await?;
                info!(
                    created = outcome.created(),
                    changed = outcome.changed(),
                    unchanged = outcome.unchanged(),
                    "Entitlement batch reconciled"
                );
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = ledger.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back entitlement batch");
                }
                warn!(error = %err, "Entitlement batch aborted");
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        ledger: &mut S::Ledger,
        batch: &[EntitlementObservation],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut outcome = ReconcileOutcome {
            entitlements: Vec::with_capacity(batch.len()),
        };

        let resolved = batch
            .iter()
            .map(|observation| {
                let key = observation.key();
                match observation.value.resolve() {
                    Some(value) => Ok((observation, key, value)),
                    None => Err(ReconcileError::InvalidValue { key }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        // All keys are locked before the first lookup, in key order.
        let keys: BTreeSet<&EntitlementKey> = resolved.iter().map(|(_, key, _)| key).collect();
        for key in keys {
            ledger.lock_triple(key).await?;
        }

        for (observation, key, value) in resolved {
            let latest = ledger.latest(&key).await?;

            let decision = match &latest {
                None => ReconcileDecision::Created,
                Some(existing) if existing.value == value => {
                    debug!(key = %key, entitlement_id = existing.entitlement_id, "Entitlement unchanged");
                    outcome.entitlements.push(ReconciledEntitlement {
                        key,
                        decision: ReconcileDecision::Unchanged,
                        entitlement_id: existing.entitlement_id,
                    });
                    continue;
                }
                Some(_) => ReconcileDecision::Changed,
            };

            let expiration_date = expiration_of(observation, &key)?;
            let created_at = self.next_created_at(latest.as_ref());

            let value_id = ledger.insert_value(&value).await?;
            let entitlement_id = ledger
                .insert_entitlement(&NewEntitlement {
                    key: key.clone(),
                    value_id,
                    expiration_date,
                    created_at,
                })
                .await?;

            debug!(
                key = %key,
                decision = decision.as_str(),
                entitlement_id,
                value_id,
                value_type = %value.value_type(),
                "Entitlement appended"
            );

            outcome.entitlements.push(ReconciledEntitlement {
                key,
                decision,
                entitlement_id,
            });
        }

        Ok(outcome)
    }

    /// Creation stamp for a new record: now, but strictly after the key's
    /// current latest record so the new record becomes the latest.
    fn next_created_at(&self, latest: Option<&StoredEntitlement>) -> DateTime<Utc> {
        let now = to_storage_precision(self.clock.now());
        match latest {
            Some(existing) if existing.created_at >= now => {
                existing.created_at + Duration::microseconds(1)
            }
            _ => now,
        }
    }
}

fn expiration_of(
    observation: &EntitlementObservation,
    key: &EntitlementKey,
) -> Result<DateTime<Utc>, ReconcileError> {
    let secs = observation.expiration_epoch_seconds.ok_or_else(|| {
        ReconcileError::PreconditionViolation(format!("missing expiration date for {}", key))
    })?;
    epoch_seconds_to_utc(secs).ok_or_else(|| {
        ReconcileError::PreconditionViolation(format!(
            "expiration date {} out of range for {}",
            secs, key
        ))
    })
}
