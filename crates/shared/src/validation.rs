//! Common validation utilities for onboarding form fields.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    /// Digits with optional leading `+` and common separators.
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9][0-9 ().\-]{5,30}$").unwrap();
}

/// Maximum length accepted for a marketplace customer identifier.
pub const MAX_CUSTOMER_IDENTIFIER_LENGTH: usize = 255;

/// Validates that a string contains something other than whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Field must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Validates a phone number loosely: digits, spaces, dashes, dots, parentheses.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_REGEX.is_match(phone.trim()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone_format");
        err.message = Some("Phone number format is invalid".into());
        Err(err)
    }
}

/// Validates a customer identifier as handed out by the marketplace.
pub fn validate_customer_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_CUSTOMER_IDENTIFIER_LENGTH {
        let mut err = ValidationError::new("customer_identifier_length");
        err.message = Some("Customer identifier must be between 1 and 255 characters".into());
        return Err(err);
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        let mut err = ValidationError::new("customer_identifier_format");
        err.message = Some(
            "Customer identifier may only contain alphanumeric characters, hyphens, and underscores"
                .into(),
        );
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Acme").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank("   ").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+1 (555) 123-4567").is_ok());
        assert!(validate_phone("0044 20 7946 0958").is_ok());
        assert!(validate_phone("555.123.4567").is_ok());
        assert!(validate_phone("call me").is_err());
        assert!(validate_phone("123").is_err());
        assert!(validate_phone("").is_err());
    }

    #[test]
    fn test_validate_phone_error_message() {
        let err = validate_phone("nope").unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Phone number format is invalid"
        );
    }

    #[test]
    fn test_validate_customer_identifier() {
        assert!(validate_customer_identifier("AbCdEf12345").is_ok());
        assert!(validate_customer_identifier("cust_01-x").is_ok());
        assert!(validate_customer_identifier("").is_err());
        assert!(validate_customer_identifier("bad id").is_err());
        assert!(validate_customer_identifier("../etc").is_err());
        assert!(validate_customer_identifier(&"a".repeat(256)).is_err());
    }
}
