use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, security_headers_middleware, trace_id,
};
use crate::routes::{health, marketplace, onboarding};
use crate::services::{CustomerResolver, EntitlementSource};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub customer_resolver: Arc<dyn CustomerResolver>,
    pub entitlement_source: Arc<dyn EntitlementSource>,
}

/// Marketplace service clients used by the webhook.
#[derive(Clone)]
pub struct MarketplaceClients {
    pub customer_resolver: Arc<dyn CustomerResolver>,
    pub entitlement_source: Arc<dyn EntitlementSource>,
}

impl MarketplaceClients {
    /// Uses one client for both services.
    pub fn shared<C>(client: C) -> Self
    where
        C: CustomerResolver + EntitlementSource + 'static,
    {
        let client = Arc::new(client);
        Self {
            customer_resolver: client.clone(),
            entitlement_source: client,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        // Development default
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn create_app(config: Config, pool: PgPool, clients: MarketplaceClients) -> Router {
    let config = Arc::new(config);

    let state = AppState {
        pool,
        config: config.clone(),
        customer_resolver: clients.customer_resolver,
        entitlement_source: clients.entitlement_source,
    };

    // Browser-facing marketplace routes
    let marketplace_routes = Router::new()
        .route(
            "/aws-marketplace/webhook",
            post(marketplace::register_from_marketplace),
        )
        .route(
            "/aws-marketplace/onboarding/:customer_identifier",
            get(onboarding::show_onboarding_form).post(onboarding::submit_onboarding_form),
        );

    // Probes and metrics
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(marketplace_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config.security.cors_origins))
        .with_state(state)
}
