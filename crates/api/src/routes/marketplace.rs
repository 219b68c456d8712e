//! AWS Marketplace registration webhook.
//!
//! The marketplace posts the buyer's browser here with a short-lived
//! registration token. The handler resolves the token, records the customer,
//! reconciles the subscription's entitlements and sends the buyer on to the
//! onboarding form (or straight to the success page when already registered).

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use domain::models::RegistrationStatus;
use domain::services::Reconciler;
use persistence::repositories::{CustomerRepository, EntitlementRepository, PgEntitlementStore};
use serde::Deserialize;
use shared::crypto::token_fingerprint;
use tracing::{info, warn};

use crate::app::AppState;
use crate::error::{ApiError, PageError};
use crate::middleware::metrics::{record_reconciliation, record_webhook_failure};
use crate::services::pages;

/// Form field carrying the registration token.
pub const REGISTRATION_TOKEN_FIELD: &str = "x-amzn-marketplace-token";

#[derive(Debug, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(rename = "x-amzn-marketplace-token", default)]
    pub registration_token: Option<String>,
}

impl RegistrationForm {
    fn token(&self) -> Option<&str> {
        self.registration_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// 302 Found, as marketplace landing pages expect.
fn redirect_found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Handle a marketplace registration.
///
/// POST /aws-marketplace/webhook
pub async fn register_from_marketplace(
    State(state): State<AppState>,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, PageError> {
    let Some(token) = form.token() else {
        record_webhook_failure("token");
        return Err(ApiError::BadRequest("Missing marketplace registration token".into()).into());
    };
    let fingerprint = token_fingerprint(token);

    let resolved = state
        .customer_resolver
        .resolve_customer(token)
        .await
        .map_err(|e| {
            record_webhook_failure("resolve");
            warn!(token_fingerprint = %fingerprint, error = %e, "Failed to resolve marketplace customer");
            e
        })?;

    info!(
        token_fingerprint = %fingerprint,
        customer_identifier = %resolved.customer_identifier,
        product_code = %resolved.product_code,
        "Resolved marketplace customer"
    );

    let customers = CustomerRepository::new(state.pool.clone());
    customers
        .upsert_resolved(
            &resolved,
            state.config.marketplace.product_name(&resolved.product_code),
        )
        .await?;

    let observations = state
        .entitlement_source
        .get_entitlements(&resolved.product_code, &resolved.customer_identifier)
        .await
        .map_err(|e| {
            record_webhook_failure("fetch");
            warn!(
                customer_identifier = %resolved.customer_identifier,
                error = %e,
                "Failed to fetch entitlements"
            );
            e
        })?;

    if observations.is_empty() {
        record_webhook_failure("no_entitlements");
        return Err(ApiError::NotFound(
            "No active entitlements were found for this subscription".into(),
        )
        .into());
    }

    let reconciler = Reconciler::new(PgEntitlementStore::new(state.pool.clone()));
    let outcome = reconciler.reconcile(&observations).await.map_err(|e| {
        record_webhook_failure("reconcile");
        warn!(
            customer_identifier = %resolved.customer_identifier,
            error = %e,
            "Entitlement reconciliation failed"
        );
        e
    })?;
    record_reconciliation(&outcome);

    info!(
        customer_identifier = %resolved.customer_identifier,
        created = outcome.created(),
        changed = outcome.changed(),
        unchanged = outcome.unchanged(),
        "Entitlements reconciled"
    );

    match customers
        .registration_status(&resolved.customer_identifier)
        .await?
    {
        RegistrationStatus::Registered { product_name } => {
            let entitlements = EntitlementRepository::new(state.pool.clone())
                .current_for_customer(&resolved.customer_identifier)
                .await?;
            Ok(pages::success_page(product_name.as_deref(), &entitlements).into_response())
        }
        _ => Ok(redirect_found(
            &state
                .config
                .marketplace
                .onboarding_path(&resolved.customer_identifier),
        )),
    }
}
