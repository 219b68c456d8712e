//! AWS Marketplace integration.
//!
//! Resolves registration tokens through the Metering service and pulls the
//! customer's entitlements from the Entitlement service. Both calls sit
//! behind traits so handlers can be driven without AWS.

use async_trait::async_trait;
use aws_sdk_marketplaceentitlement::types::{
    Entitlement, EntitlementValue as AwsEntitlementValue, GetEntitlementFilterName,
};
use aws_sdk_marketplacemetering::error::{DisplayErrorContext, ProvideErrorMetadata};
use axum::http::StatusCode;
use thiserror::Error;
use tracing::{debug, info};

use domain::models::{EntitlementObservation, ObservedValue, ResolvedCustomer};

use crate::config::{AwsConfig, MarketplaceConfig};

// ============================================================================
// Error Types
// ============================================================================

/// Errors returned by the marketplace services.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// The service answered with a modeled error code.
    #[error("AWS Marketplace error {code}: {message}")]
    Service { code: String, message: String },

    /// The request never produced a service response.
    #[error("AWS Marketplace request failed: {0}")]
    Transport(String),

    #[error("AWS Marketplace response is missing {0}")]
    MissingField(&'static str),
}

impl MarketplaceError {
    /// AWS error code, when the service returned one.
    pub fn code(&self) -> Option<&str> {
        match self {
            MarketplaceError::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    /// HTTP status to report for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            MarketplaceError::Service { code, .. } => status_for_error_code(code),
            MarketplaceError::Transport(_) | MarketplaceError::MissingField(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn from_sdk<E>(err: E) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error,
    {
        match err.code() {
            Some(code) => MarketplaceError::Service {
                code: code.to_string(),
                message: err.message().unwrap_or_default().to_string(),
            },
            None => MarketplaceError::Transport(DisplayErrorContext(&err).to_string()),
        }
    }
}

/// Maps an AWS Marketplace error code to the HTTP status shown to the caller.
pub fn status_for_error_code(code: &str) -> StatusCode {
    match code {
        "InvalidParameterException"
        | "InvalidProductCodeException"
        | "InvalidUsageRecordException"
        | "InvalidCustomerIdentifierException"
        | "TimestampOutOfBoundsException"
        | "InvalidTokenException"
        | "ExpiredTokenException" => StatusCode::BAD_REQUEST,
        "ThrottlingException" => StatusCode::TOO_MANY_REQUESTS,
        "InternalServiceException" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Exchanges a marketplace registration token for the customer's identity.
#[async_trait]
pub trait CustomerResolver: Send + Sync {
    async fn resolve_customer(&self, token: &str) -> Result<ResolvedCustomer, MarketplaceError>;
}

/// Lists the entitlements a customer holds for a product.
#[async_trait]
pub trait EntitlementSource: Send + Sync {
    /// Returns every entitlement across all result pages.
    async fn get_entitlements(
        &self,
        product_code: &str,
        customer_identifier: &str,
    ) -> Result<Vec<EntitlementObservation>, MarketplaceError>;
}

// ============================================================================
// AWS Client
// ============================================================================

/// Marketplace client backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct AwsMarketplaceClient {
    metering: aws_sdk_marketplacemetering::Client,
    entitlements: aws_sdk_marketplaceentitlement::Client,
    max_results: i32,
}

impl AwsMarketplaceClient {
    /// Builds both service clients from the default credential chain.
    pub async fn new(aws: &AwsConfig, marketplace: &MarketplaceConfig) -> Self {
        let mut loader = aws_config::from_env().region(aws_config::Region::new(aws.region.clone()));
        if let Some(endpoint_url) = &aws.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let sdk_config = loader.load().await;

        info!(
            region = %aws.region,
            custom_endpoint = aws.endpoint_url.is_some(),
            "AWS Marketplace clients initialized"
        );

        Self {
            metering: aws_sdk_marketplacemetering::Client::new(&sdk_config),
            entitlements: aws_sdk_marketplaceentitlement::Client::new(&sdk_config),
            max_results: marketplace.max_results,
        }
    }
}

#[async_trait]
impl CustomerResolver for AwsMarketplaceClient {
    async fn resolve_customer(&self, token: &str) -> Result<ResolvedCustomer, MarketplaceError> {
        let output = self
            .metering
            .resolve_customer()
            .registration_token(token)
            .send()
            .await
            .map_err(MarketplaceError::from_sdk)?;

        Ok(ResolvedCustomer {
            customer_identifier: output
                .customer_identifier()
                .ok_or(MarketplaceError::MissingField("CustomerIdentifier"))?
                .to_string(),
            aws_account_id: output
                .customer_aws_account_id()
                .ok_or(MarketplaceError::MissingField("CustomerAWSAccountId"))?
                .to_string(),
            product_code: output
                .product_code()
                .ok_or(MarketplaceError::MissingField("ProductCode"))?
                .to_string(),
        })
    }
}

#[async_trait]
impl EntitlementSource for AwsMarketplaceClient {
    async fn get_entitlements(
        &self,
        product_code: &str,
        customer_identifier: &str,
    ) -> Result<Vec<EntitlementObservation>, MarketplaceError> {
        let mut observations = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let output = self
                .entitlements
                .get_entitlements()
                .product_code(product_code)
                .filter(
                    GetEntitlementFilterName::CustomerIdentifier,
                    vec![customer_identifier.to_string()],
                )
                .max_results(self.max_results)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(MarketplaceError::from_sdk)?;

            pages += 1;
            observations.extend(
                output
                    .entitlements()
                    .iter()
                    .map(|e| observation_from_aws(e, product_code, customer_identifier)),
            );

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(
            customer_identifier = %customer_identifier,
            product_code = %product_code,
            pages,
            count = observations.len(),
            "Fetched entitlements"
        );
        Ok(observations)
    }
}

/// Converts an SDK entitlement into an observation.
///
/// Missing identifiers fall back to the query filter. Value variants this
/// client does not know leave the observed value empty, which the reconciler
/// rejects.
fn observation_from_aws(
    entitlement: &Entitlement,
    product_code: &str,
    customer_identifier: &str,
) -> EntitlementObservation {
    let value = match entitlement.value() {
        Some(AwsEntitlementValue::BooleanValue(v)) => ObservedValue {
            boolean_value: Some(*v),
            ..Default::default()
        },
        Some(AwsEntitlementValue::DoubleValue(v)) => ObservedValue {
            double_value: Some(*v),
            ..Default::default()
        },
        Some(AwsEntitlementValue::IntegerValue(v)) => ObservedValue {
            integer_value: Some(i64::from(*v)),
            ..Default::default()
        },
        Some(AwsEntitlementValue::StringValue(v)) => ObservedValue {
            string_value: Some(v.clone()),
            ..Default::default()
        },
        _ => ObservedValue::default(),
    };

    EntitlementObservation {
        customer_identifier: entitlement
            .customer_identifier()
            .unwrap_or(customer_identifier)
            .to_string(),
        product_code: entitlement
            .product_code()
            .unwrap_or(product_code)
            .to_string(),
        dimension: entitlement.dimension().unwrap_or_default().to_string(),
        value,
        expiration_epoch_seconds: entitlement.expiration_date().map(|d| d.secs()),
    }
}
