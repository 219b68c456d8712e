//! Customer onboarding form.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form,
};
use domain::models::{CustomerDetailsRequest, CustomerProfile, RegistrationStatus};
use persistence::entities::CurrentEntitlementEntity;
use persistence::repositories::{CustomerRepository, EntitlementRepository};
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::{validation_details, ApiError, PageError};
use crate::services::pages;

fn unknown_customer() -> PageError {
    ApiError::NotFound("No marketplace subscription was found for this customer".into()).into()
}

async fn current_entitlements(
    state: &AppState,
    customer_identifier: &str,
) -> Result<Vec<CurrentEntitlementEntity>, sqlx::Error> {
    EntitlementRepository::new(state.pool.clone())
        .current_for_customer(customer_identifier)
        .await
}

/// Show the onboarding form, or the success page once registered.
///
/// GET /aws-marketplace/onboarding/:customer_identifier
pub async fn show_onboarding_form(
    State(state): State<AppState>,
    Path(customer_identifier): Path<String>,
) -> Result<Response, PageError> {
    let status = CustomerRepository::new(state.pool.clone())
        .registration_status(&customer_identifier)
        .await?;

    match status {
        RegistrationStatus::NotFound => Err(unknown_customer()),
        RegistrationStatus::Registered { product_name } => {
            let entitlements = current_entitlements(&state, &customer_identifier).await?;
            Ok(pages::success_page(product_name.as_deref(), &entitlements).into_response())
        }
        RegistrationStatus::NeedsRegistration { product_name } => {
            let entitlements = current_entitlements(&state, &customer_identifier).await?;
            Ok(pages::onboarding_form(
                &state.config.marketplace.onboarding_path(&customer_identifier),
                &customer_identifier,
                product_name.as_deref(),
                None,
                &[],
                &entitlements,
            )
            .into_response())
        }
    }
}

/// Store the submitted customer details.
///
/// POST /aws-marketplace/onboarding/:customer_identifier
pub async fn submit_onboarding_form(
    State(state): State<AppState>,
    Path(customer_identifier): Path<String>,
    Form(request): Form<CustomerDetailsRequest>,
) -> Result<Response, PageError> {
    if request.customer_identifier != customer_identifier {
        return Err(ApiError::BadRequest(
            "Customer identifier in the form does not match the URL".into(),
        )
        .into());
    }

    let customers = CustomerRepository::new(state.pool.clone());
    let product_name = match customers.registration_status(&customer_identifier).await? {
        RegistrationStatus::NotFound => return Err(unknown_customer()),
        RegistrationStatus::Registered { .. } => {
            return Err(ApiError::Conflict("This customer is already registered".into()).into())
        }
        RegistrationStatus::NeedsRegistration { product_name } => product_name,
    };

    if let Err(errors) = request.validate() {
        let messages: Vec<String> = validation_details(&errors)
            .into_iter()
            .map(|d| d.message)
            .collect();
        let entitlements = current_entitlements(&state, &customer_identifier).await?;
        let page = pages::onboarding_form(
            &state.config.marketplace.onboarding_path(&customer_identifier),
            &customer_identifier,
            product_name.as_deref(),
            Some(&request),
            &messages,
            &entitlements,
        );
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    }

    let profile = CustomerProfile::from(request);
    if !customers
        .update_profile(&customer_identifier, &profile)
        .await?
    {
        return Err(unknown_customer());
    }

    info!(customer_identifier = %customer_identifier, "Customer registration completed");

    let entitlements = current_entitlements(&state, &customer_identifier).await?;
    Ok(pages::success_page(product_name.as_deref(), &entitlements).into_response())
}
