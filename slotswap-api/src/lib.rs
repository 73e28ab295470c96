//! Slotswap API - REST Layer
//!
//! Exposes the swap engine over HTTP with Axum: owner CRUD for slots, the
//! swappable marketplace, swap proposals and responses. Every `/api/v1`
//! route requires a bearer JWT; health, metrics and the OpenAPI document
//! are public.
//!
//! Records live in PostgreSQL through [`PgStore`], or in memory for local
//! runs and tests.

#[macro_use]
mod macros;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use auth::{
    authenticate, generate_jwt_token, validate_jwt_token, AuthConfig, AuthContext, Claims,
    CredentialVerifier, JwtSecret, JwtVerifier,
};
pub use config::ApiConfig;
pub use db::{DbConfig, PgStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthExtractor, AuthMiddlewareState};
pub use openapi::ApiDoc;
pub use routes::{create_api_router, SecureRouterBuilder};
pub use state::{ApiEngine, AppState};
pub use types::*;
