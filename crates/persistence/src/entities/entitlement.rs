//! Entitlement entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{EntitlementValue, StoredEntitlement, ValueType};
use sqlx::FromRow;
use thiserror::Error;

/// Database enum for entitlement_value_type that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "entitlement_value_type", rename_all = "lowercase")]
pub enum ValueTypeDb {
    Boolean,
    Double,
    Integer,
    String,
}

impl From<ValueType> for ValueTypeDb {
    fn from(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Boolean => Self::Boolean,
            ValueType::Double => Self::Double,
            ValueType::Integer => Self::Integer,
            ValueType::String => Self::String,
        }
    }
}

/// A value row whose typed column does not match its `value_type`.
#[derive(Debug, Error)]
#[error("entitlement value {value_id} has no {value_type:?} payload")]
pub struct StoredValueError {
    pub value_id: i64,
    pub value_type: ValueTypeDb,
}

/// The typed columns of an entitlement_values row.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ValueColumns {
    pub value_id: i64,
    pub value_type: ValueTypeDb,
    pub boolean_value: Option<bool>,
    pub double_value: Option<f64>,
    pub integer_value: Option<i64>,
    pub string_value: Option<String>,
}

impl ValueColumns {
    /// Column values to bind when inserting `value`.
    pub fn for_insert(value: &EntitlementValue) -> Self {
        let mut columns = Self {
            value_id: 0,
            value_type: value.value_type().into(),
            boolean_value: None,
            double_value: None,
            integer_value: None,
            string_value: None,
        };
        match value {
            EntitlementValue::Boolean(v) => columns.boolean_value = Some(*v),
            EntitlementValue::Double(v) => columns.double_value = Some(*v),
            EntitlementValue::Integer(v) => columns.integer_value = Some(*v),
            EntitlementValue::String(v) => columns.string_value = Some(v.clone()),
        }
        columns
    }

    /// Reads the column selected by `value_type`.
    pub fn to_value(&self) -> Result<EntitlementValue, StoredValueError> {
        let value = match self.value_type {
            ValueTypeDb::Boolean => self.boolean_value.map(EntitlementValue::Boolean),
            ValueTypeDb::Double => self.double_value.map(EntitlementValue::Double),
            ValueTypeDb::Integer => self.integer_value.map(EntitlementValue::Integer),
            ValueTypeDb::String => self.string_value.clone().map(EntitlementValue::String),
        };
        value.ok_or(StoredValueError {
            value_id: self.value_id,
            value_type: self.value_type,
        })
    }
}

/// Latest entitlement row for a key joined with its value.
#[derive(Debug, Clone, FromRow)]
pub struct LatestEntitlementEntity {
    pub entitlement_id: i64,
    pub expiration_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub value: ValueColumns,
}

impl TryFrom<LatestEntitlementEntity> for StoredEntitlement {
    type Error = StoredValueError;

    fn try_from(entity: LatestEntitlementEntity) -> Result<Self, Self::Error> {
        Ok(StoredEntitlement {
            entitlement_id: entity.entitlement_id,
            value_id: entity.value.value_id,
            value: entity.value.to_value()?,
            expiration_date: entity.expiration_date,
            created_at: entity.created_at,
        })
    }
}

/// Current entitlement per (product, dimension) for a customer.
#[derive(Debug, Clone, FromRow)]
pub struct CurrentEntitlementEntity {
    pub entitlement_id: i64,
    pub customer_identifier: String,
    pub product_code: String,
    pub product_name: Option<String>,
    pub dimension: String,
    pub expiration_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub value: ValueColumns,
}

/// One row of a key's history.
#[derive(Debug, Clone, FromRow)]
pub struct EntitlementHistoryEntity {
    pub entitlement_id: i64,
    pub expiration_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub value: ValueColumns,
}
