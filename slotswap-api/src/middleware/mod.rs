//! Middleware modules for the Slotswap API
//!
//! - `auth`: bearer token authentication and the `AuthExtractor`
//! - `rate_limit`: per-user / per-IP request quotas
//!
//! # Middleware Order
//!
//! Rate limiting runs inside authentication so authenticated callers are
//! keyed by user id:
//!
//! ```ignore
//! Router::new()
//!     .route("/api/v1/slots", get(handler))
//!     .layer(middleware::from_fn_with_state(rate_limit_state, rate_limit_middleware))
//!     .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
//! ```

mod auth;
mod rate_limit;

pub use auth::{auth_middleware, AuthExtractor, AuthMiddlewareError, AuthMiddlewareState};
pub use rate_limit::{rate_limit_middleware, RateLimitError, RateLimitKey, RateLimitState};
