//! Customer domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use shared::validation::{validate_customer_identifier, validate_not_blank, validate_phone};

/// Identity returned by the marketplace when a registration token is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCustomer {
    pub customer_identifier: String,
    pub aws_account_id: String,
    pub product_code: String,
}

/// A marketplace customer as stored in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Customer {
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

impl Customer {
    /// A customer is fully registered once every profile field is non-empty.
    pub fn is_fully_registered(&self) -> bool {
        [
            &self.name,
            &self.email,
            &self.phone,
            &self.job_role,
            &self.company,
            &self.country,
        ]
        .iter()
        .all(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// Profile fields collected by the onboarding form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub job_role: String,
    pub company: String,
    pub country: String,
}

/// Registration state of a customer, used to route the onboarding flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// No customer row exists for the identifier.
    NotFound,
    /// Customer exists but at least one profile field is missing.
    NeedsRegistration { product_name: Option<String> },
    /// Every profile field is filled in.
    Registered { product_name: Option<String> },
}

/// Onboarding form submission.
///
/// Absent form fields deserialize as empty strings and fail validation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CustomerDetailsRequest {
    #[validate(custom(function = "validate_customer_identifier"))]
    pub customer_identifier: String,

    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,

    #[validate(email(message = "Email address is invalid"))]
    #[validate(length(max = 255, message = "Email must be at most 255 characters"))]
    pub email: String,

    #[validate(custom(function = "validate_phone"))]
    pub phone: String,

    #[validate(length(min = 1, max = 100, message = "Job role must be between 1 and 100 characters"))]
    #[validate(custom(function = "validate_not_blank"))]
    pub job_role: String,

    #[validate(length(min = 1, max = 255, message = "Company must be between 1 and 255 characters"))]
    #[validate(custom(function = "validate_not_blank"))]
    pub company: String,

    #[validate(length(min = 1, max = 100, message = "Country must be between 1 and 100 characters"))]
    #[validate(custom(function = "validate_not_blank"))]
    pub country: String,
}

impl From<CustomerDetailsRequest> for CustomerProfile {
    fn from(req: CustomerDetailsRequest) -> Self {
        Self {
            name: req.name.trim().to_string(),
            email: req.email.trim().to_string(),
            phone: req.phone.trim().to_string(),
            job_role: req.job_role.trim().to_string(),
            company: req.company.trim().to_string(),
            country: req.country.trim().to_string(),
        }
    }
}
