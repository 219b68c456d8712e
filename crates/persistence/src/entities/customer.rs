//! Customer entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{Customer, RegistrationStatus};
use sqlx::FromRow;

/// Database row mapping for the customers table.
#[derive(Debug, Clone, FromRow)]
pub struct CustomerEntity {
    pub customer_identifier: String,
    pub aws_account_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub job_role: Option<String>,
    pub company: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CustomerEntity> for Customer {
    fn from(entity: CustomerEntity) -> Self {
        Customer {
            customer_identifier: entity.customer_identifier,
            aws_account_id: entity.aws_account_id,
            name: entity.name,
            email: entity.email,
            phone: entity.phone,
            job_role: entity.job_role,
            company: entity.company,
            country: entity.country,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Customer row joined with the product of its most recent entitlement.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationCheckEntity {
    #[sqlx(flatten)]
    pub customer: CustomerEntity,
    pub product_name: Option<String>,
}

impl From<RegistrationCheckEntity> for RegistrationStatus {
    fn from(entity: RegistrationCheckEntity) -> Self {
        let product_name = entity.product_name;
        if Customer::from(entity.customer).is_fully_registered() {
            RegistrationStatus::Registered { product_name }
        } else {
            RegistrationStatus::NeedsRegistration { product_name }
        }
    }
}
