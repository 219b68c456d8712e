//! Entitlement repository and the Postgres-backed reconciliation store.

use async_trait::async_trait;
use domain::models::{EntitlementKey, EntitlementValue, NewEntitlement, StoredEntitlement};
use domain::services::{EntitlementLedger, EntitlementStore};
use sqlx::{PgPool, Postgres, Transaction};

use crate::entities::{
    CurrentEntitlementEntity, EntitlementHistoryEntity, LatestEntitlementEntity, ValueColumns,
};
use crate::metrics::QueryTimer;

/// Separator for the advisory lock key; cannot appear in marketplace ids.
const LOCK_KEY_SEPARATOR: char = '\u{1f}';

fn lock_key(key: &EntitlementKey) -> String {
    format!(
        "entitlement{sep}{}{sep}{}{sep}{}",
        key.customer_identifier,
        key.product_code,
        key.dimension,
        sep = LOCK_KEY_SEPARATOR
    )
}

/// Opens one database transaction per reconciliation batch.
#[derive(Clone)]
pub struct PgEntitlementStore {
    pool: PgPool,
}

impl PgEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntitlementStore for PgEntitlementStore {
    type Ledger = PgEntitlementLedger;

    async fn begin(&self) -> Result<PgEntitlementLedger, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(PgEntitlementLedger { tx })
    }
}

/// Entitlement log access inside an open transaction.
///
/// Dropping the ledger without committing rolls the transaction back.
pub struct PgEntitlementLedger {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl EntitlementLedger for PgEntitlementLedger {
    async fn lock_triple(&mut self, key: &EntitlementKey) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("entitlement_lock_triple");
        // Released automatically at commit or rollback.
        let result = sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(lock_key(key))
            .execute(&mut *self.tx)
            .await;
        timer.record();
        result.map(|_| ())
    }

    async fn latest(
        &mut self,
        key: &EntitlementKey,
    ) -> Result<Option<StoredEntitlement>, sqlx::Error> {
        let timer = QueryTimer::new("entitlement_latest");
        let result = sqlx::query_as::<_, LatestEntitlementEntity>(
            r#"
            SELECT e.entitlement_id, e.expiration_date, e.created_at,
                   v.value_id, v.value_type, v.boolean_value, v.double_value,
                   v.integer_value, v.string_value
            FROM entitlements e
            JOIN entitlement_values v ON v.value_id = e.value_id
            WHERE e.customer_identifier = $1 AND e.product_code = $2 AND e.dimension = $3
            ORDER BY e.created_at DESC, e.entitlement_id ASC
            LIMIT 1
            "#,
        )
        .bind(&key.customer_identifier)
        .bind(&key.product_code)
        .bind(&key.dimension)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();

        result?
            .map(|entity| {
                StoredEntitlement::try_from(entity).map_err(|e| sqlx::Error::Decode(Box::new(e)))
            })
            .transpose()
    }

    async fn insert_value(&mut self, value: &EntitlementValue) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("entitlement_value_insert");
        let columns = ValueColumns::for_insert(value);
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO entitlement_values
                (value_type, boolean_value, double_value, integer_value, string_value)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING value_id
            "#,
        )
        .bind(columns.value_type)
        .bind(columns.boolean_value)
        .bind(columns.double_value)
        .bind(columns.integer_value)
        .bind(&columns.string_value)
        .fetch_one(&mut *self.tx)
        .await;
        timer.record();
        result
    }

    async fn insert_entitlement(&mut self, record: &NewEntitlement) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("entitlement_insert");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO entitlements
                (customer_identifier, product_code, dimension, expiration_date, value_id,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING entitlement_id
            "#,
        )
        .bind(&record.key.customer_identifier)
        .bind(&record.key.product_code)
        .bind(&record.key.dimension)
        .bind(record.expiration_date)
        .bind(record.value_id)
        .bind(record.created_at)
        .fetch_one(&mut *self.tx)
        .await;
        timer.record();
        result
    }

    async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}

/// Read access to the entitlement log.
#[derive(Clone)]
pub struct EntitlementRepository {
    pool: PgPool,
}

impl EntitlementRepository {
    /// Creates a new EntitlementRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Current value of every (product, dimension) a customer holds.
    pub async fn current_for_customer(
        &self,
        customer_identifier: &str,
    ) -> Result<Vec<CurrentEntitlementEntity>, sqlx::Error> {
        let timer = QueryTimer::new("entitlement_current_for_customer");
        let result = sqlx::query_as::<_, CurrentEntitlementEntity>(
            r#"
            SELECT DISTINCT ON (e.product_code, e.dimension)
                   e.entitlement_id, e.customer_identifier, e.product_code,
                   p.product_name, e.dimension, e.expiration_date, e.created_at,
                   v.value_id, v.value_type, v.boolean_value, v.double_value,
                   v.integer_value, v.string_value
            FROM entitlements e
            JOIN entitlement_values v ON v.value_id = e.value_id
            JOIN products p ON p.product_code = e.product_code
            WHERE e.customer_identifier = $1
            ORDER BY e.product_code, e.dimension, e.created_at DESC, e.entitlement_id ASC
            "#,
        )
        .bind(customer_identifier)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Every record of a key, oldest first.
    pub async fn history(
        &self,
        key: &EntitlementKey,
    ) -> Result<Vec<EntitlementHistoryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("entitlement_history");
        let result = sqlx::query_as::<_, EntitlementHistoryEntity>(
            r#"
            SELECT e.entitlement_id, e.expiration_date, e.created_at, e.updated_at,
                   v.value_id, v.value_type, v.boolean_value, v.double_value,
                   v.integer_value, v.string_value
            FROM entitlements e
            JOIN entitlement_values v ON v.value_id = e.value_id
            WHERE e.customer_identifier = $1 AND e.product_code = $2 AND e.dimension = $3
            ORDER BY e.created_at ASC, e.entitlement_id ASC
            "#,
        )
        .bind(&key.customer_identifier)
        .bind(&key.product_code)
        .bind(&key.dimension)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Number of records stored for a key.
    pub async fn count_for_key(&self, key: &EntitlementKey) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("entitlement_count_for_key");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM entitlements
            WHERE customer_identifier = $1 AND product_code = $2 AND dimension = $3
            "#,
        )
        .bind(&key.customer_identifier)
        .bind(&key.product_code)
        .bind(&key.dimension)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}
