//! Customer repository for database operations.

use domain::models::{CustomerProfile, RegistrationStatus, ResolvedCustomer};
use sqlx::PgPool;

use crate::entities::{CustomerEntity, RegistrationCheckEntity};
use crate::metrics::QueryTimer;

/// Repository for customer and product database operations.
#[derive(Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert the customer and product named by a resolved registration token.
    ///
    /// Existing rows keep their profile fields; only the account linkage and
    /// (when given) the product display name are refreshed.
    pub async fn upsert_resolved(
        &self,
        resolved: &ResolvedCustomer,
        product_name: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("customer_upsert_resolved");
        let result = self.upsert_resolved_tx(resolved, product_name).await;
        timer.finish(result)
    }

    async fn upsert_resolved_tx(
        &self,
        resolved: &ResolvedCustomer,
        product_name: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO customers (customer_identifier, aws_account_id)
            VALUES ($1, $2)
            ON CONFLICT (customer_identifier) DO UPDATE SET
                aws_account_id = EXCLUDED.aws_account_id
            "#,
        )
        .bind(&resolved.customer_identifier)
        .bind(&resolved.aws_account_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO products (product_code, product_name)
            VALUES ($1, $2)
            ON CONFLICT (product_code) DO UPDATE SET
                product_name = COALESCE(EXCLUDED.product_name, products.product_name)
            "#,
        )
        .bind(&resolved.product_code)
        .bind(product_name)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    /// Find a customer by identifier.
    pub async fn find_by_id(
        &self,
        customer_identifier: &str,
    ) -> Result<Option<CustomerEntity>, sqlx::Error> {
        let timer = QueryTimer::new("customer_find_by_id");
        let result = sqlx::query_as::<_, CustomerEntity>(
            r#"
            SELECT customer_identifier, aws_account_id, name, email, phone, job_role,
                   company, country, created_at, updated_at
            FROM customers
            WHERE customer_identifier = $1
            "#,
        )
        .bind(customer_identifier)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Store the onboarding profile. Returns `false` when no such customer exists.
    pub async fn update_profile(
        &self,
        customer_identifier: &str,
        profile: &CustomerProfile,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("customer_update_profile");
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = $2,
                email = $3,
                phone = $4,
                job_role = $5,
                company = $6,
                country = $7,
                updated_at = NOW()
            WHERE customer_identifier = $1
            "#,
        )
        .bind(customer_identifier)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(&profile.job_role)
        .bind(&profile.company)
        .bind(&profile.country)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Registration state of a customer, with the display name of the product
    /// on its most recent entitlement.
    pub async fn registration_status(
        &self,
        customer_identifier: &str,
    ) -> Result<RegistrationStatus, sqlx::Error> {
        let timer = QueryTimer::new("customer_registration_status");
        let result = sqlx::query_as::<_, RegistrationCheckEntity>(
            r#"
            SELECT c.customer_identifier, c.aws_account_id, c.name, c.email, c.phone,
                   c.job_role, c.company, c.country, c.created_at, c.updated_at,
                   COALESCE(p.product_name, p.product_code) AS product_name
            FROM customers c
            LEFT JOIN LATERAL (
                SELECT e.product_code
                FROM entitlements e
                WHERE e.customer_identifier = c.customer_identifier
                ORDER BY e.created_at DESC, e.entitlement_id ASC
                LIMIT 1
            ) latest ON TRUE
            LEFT JOIN products p ON p.product_code = latest.product_code
            WHERE c.customer_identifier = $1
            "#,
        )
        .bind(customer_identifier)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        Ok(result?
            .map(RegistrationStatus::from)
            .unwrap_or(RegistrationStatus::NotFound))
    }
}
