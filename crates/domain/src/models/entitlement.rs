//! Entitlement domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of an [`EntitlementValue`], persisted as the `value_type` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Boolean,
    Double,
    Integer,
    String,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::Double => write!(f, "double"),
            ValueType::Integer => write!(f, "integer"),
            ValueType::String => write!(f, "string"),
        }
    }
}

/// The value granted by an entitlement.
///
/// Two values are equal only when their variants match and the payloads are
/// equal. Doubles compare with `f64::total_cmp`, so a stored value always
/// equals itself after a round trip, `NaN` included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EntitlementValue {
    Boolean(bool),
    Double(f64),
    Integer(i64),
    String(String),
}

impl EntitlementValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            EntitlementValue::Boolean(_) => ValueType::Boolean,
            EntitlementValue::Double(_) => ValueType::Double,
            EntitlementValue::Integer(_) => ValueType::Integer,
            EntitlementValue::String(_) => ValueType::String,
        }
    }
}

impl PartialEq for EntitlementValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EntitlementValue::Boolean(a), EntitlementValue::Boolean(b)) => a == b,
            (EntitlementValue::Double(a), EntitlementValue::Double(b)) => a.total_cmp(b).is_eq(),
            (EntitlementValue::Integer(a), EntitlementValue::Integer(b)) => a == b,
            (EntitlementValue::String(a), EntitlementValue::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for EntitlementValue {}

impl fmt::Display for EntitlementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntitlementValue::Boolean(v) => write!(f, "{}", v),
            EntitlementValue::Double(v) => write!(f, "{}", v),
            EntitlementValue::Integer(v) => write!(f, "{}", v),
            EntitlementValue::String(v) => write!(f, "{}", v),
        }
    }
}

/// Entitlement value as delivered by the marketplace: one optional field per
/// variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
}

impl ObservedValue {
    /// Resolves the observed fields into a typed value.
    ///
    /// The first populated field wins, in the order boolean, double, integer,
    /// string. Returns `None` when no field is populated.
    pub fn resolve(&self) -> Option<EntitlementValue> {
        if let Some(v) = self.boolean_value {
            Some(EntitlementValue::Boolean(v))
        } else if let Some(v) = self.double_value {
            Some(EntitlementValue::Double(v))
        } else if let Some(v) = self.integer_value {
            Some(EntitlementValue::Integer(v))
        } else {
            self.string_value.clone().map(EntitlementValue::String)
        }
    }
}

impl From<EntitlementValue> for ObservedValue {
    fn from(value: EntitlementValue) -> Self {
        let mut observed = ObservedValue::default();
        match value {
            EntitlementValue::Boolean(v) => observed.boolean_value = Some(v),
            EntitlementValue::Double(v) => observed.double_value = Some(v),
            EntitlementValue::Integer(v) => observed.integer_value = Some(v),
            EntitlementValue::String(v) => observed.string_value = Some(v),
        }
        observed
    }
}

/// The versioning key of the entitlement log: customer, product and dimension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementKey {
    pub customer_identifier: String,
    pub product_code: String,
    pub dimension: String,
}

impl EntitlementKey {
    pub fn new(
        customer_identifier: impl Into<String>,
        product_code: impl Into<String>,
        dimension: impl Into<String>,
    ) -> Self {
        Self {
            customer_identifier: customer_identifier.into(),
            product_code: product_code.into(),
            dimension: dimension.into(),
        }
    }
}

impl fmt::Display for EntitlementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.customer_identifier, self.product_code, self.dimension
        )
    }
}

/// One incoming entitlement fact to reconcile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementObservation {
    pub customer_identifier: String,
    pub product_code: String,
    pub dimension: String,
    pub value: ObservedValue,
    /// Seconds since the Unix epoch.
    #[serde(default, rename = "expirationDate", skip_serializing_if = "Option::is_none")]
    pub expiration_epoch_seconds: Option<i64>,
}

impl EntitlementObservation {
    pub fn key(&self) -> EntitlementKey {
        EntitlementKey::new(
            self.customer_identifier.clone(),
            self.product_code.clone(),
            self.dimension.clone(),
        )
    }
}

/// Latest persisted record for a key, together with its value.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntitlement {
    pub entitlement_id: i64,
    pub value_id: i64,
    pub value: EntitlementValue,
    pub expiration_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Entitlement record to append to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntitlement {
    pub key: EntitlementKey,
    pub value_id: i64,
    pub expiration_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
