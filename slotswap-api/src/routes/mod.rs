//! REST API Routes Module
//!
//! Route handlers grouped by resource, and the router assembly that puts
//! them behind authentication, rate limiting, observability and CORS.

pub mod health;
pub mod slot;
pub mod swap;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, request::Parts, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{
    auth_middleware, rate_limit_middleware, AuthMiddlewareState, RateLimitState,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;
pub use slot::create_router as slot_router;
pub use swap::create_router as swap_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// Validate API configuration for production use.
fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set SLOTSWAP_CORS_ORIGINS.",
        ));
    }
    if !config.rate_limit_enabled {
        tracing::warn!(
            "Rate limiting is disabled in production. \
             Set SLOTSWAP_RATE_LIMIT_ENABLED=true to enable it."
        );
    }
    Ok(())
}

// ============================================================================
// SECURE ROUTER BUILDER
// ============================================================================

/// Builder for the API router with auth and rate limiting on by default.
///
/// `/api/v1/*` requires a bearer token. Health, metrics and the OpenAPI
/// document are public but still rate limited per IP.
pub struct SecureRouterBuilder {
    state: AppState,
    api_config: ApiConfig,
    auth_state: AuthMiddlewareState,
    rate_limit_state: RateLimitState,
}

impl SecureRouterBuilder {
    /// In production this refuses insecure auth and CORS settings.
    pub fn new(state: AppState, api_config: ApiConfig, auth_config: AuthConfig) -> ApiResult<Self> {
        auth_config.validate_for_production(&api_config.environment)?;
        if api_config.is_production() {
            validate_api_config_for_production(&api_config)?;
        }

        Ok(Self::with_auth_state(
            state,
            api_config,
            AuthMiddlewareState::new(auth_config),
        ))
    }

    /// Use a prebuilt authentication state, e.g. a custom credential verifier.
    pub fn with_auth_state(
        state: AppState,
        api_config: ApiConfig,
        auth_state: AuthMiddlewareState,
    ) -> Self {
        let rate_limit_state = RateLimitState::new(api_config.clone());
        Self {
            state,
            api_config,
            auth_state,
            rate_limit_state,
        }
    }

    /// Build the entity routes (require authentication).
    fn build_entity_routes(&self) -> Router<AppState> {
        Router::new()
            .nest("/slots", slot::create_router())
            .route("/swappable-slots", get(swap::list_swappable))
            .nest("/swap-requests", swap::create_router())
    }

    /// Build the complete router with full security stack.
    ///
    /// # Middleware Order (outer to inner)
    /// 1. CORS - handles preflight requests
    /// 2. HTTP trace layer
    /// 3. Observability - span and metrics per request
    /// 4. Auth (only on /api/v1/*) - resolves the caller
    /// 5. Rate limiting - keyed by user on /api/v1/*, by IP elsewhere
    pub fn build(self) -> Router {
        let api_routes = self
            .build_entity_routes()
            .layer(from_fn_with_state(
                self.rate_limit_state.clone(),
                rate_limit_middleware,
            ))
            .layer(from_fn_with_state(self.auth_state.clone(), auth_middleware));

        let public_routes = Router::new()
            .nest("/health", health::create_router())
            .route("/metrics", get(metrics_handler))
            .route("/openapi.json", get(openapi_json))
            .layer(from_fn_with_state(
                self.rate_limit_state.clone(),
                rate_limit_middleware,
            ));

        let cors = build_cors_layer(&self.api_config);

        Router::new()
            .nest("/api/v1", api_routes)
            .merge(public_routes)
            .with_state(self.state)
            .layer(from_fn(observability_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// Origins are checked with [`ApiConfig::is_origin_allowed`], so wildcard
/// subdomain entries work and an empty list is permissive only outside
/// production.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("retry-after"),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: no origins configured");
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: restricting origins");
    }

    let policy = Arc::new(config.clone());
    let cors = cors.allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _parts: &Parts| {
            origin
                .to_str()
                .map(|o| policy.is_origin_allowed(o))
                .unwrap_or(false)
        },
    ));

    if config.cors_allow_credentials {
        cors.allow_credentials(true)
    } else {
        cors
    }
}

/// Create the complete API router.
///
/// - Slot CRUD under /api/v1/slots (auth)
/// - Swap marketplace under /api/v1/swappable-slots and /api/v1/swap-requests (auth)
/// - Health checks at /health/* (public)
/// - Metrics at /metrics (public, rate-limited)
/// - OpenAPI spec at /openapi.json
pub fn create_api_router(
    state: AppState,
    api_config: &ApiConfig,
    auth_config: AuthConfig,
) -> ApiResult<Router> {
    SecureRouterBuilder::new(state, api_config.clone(), auth_config).map(|builder| builder.build())
}
