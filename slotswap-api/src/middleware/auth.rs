//! Axum Middleware for Authentication
//!
//! Authenticates `Authorization: Bearer` credentials through a
//! [`CredentialVerifier`], injects the resulting [`AuthContext`] into
//! request extensions and answers 401 when no valid credential is present.

use crate::auth::{authenticate, AuthConfig, AuthContext, CredentialVerifier, JwtVerifier};
use crate::error::{ApiError, ErrorCode};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self::with_verifier(Arc::new(JwtVerifier::new(auth_config)))
    }

    pub fn with_verifier(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { verifier }
    }
}

impl std::fmt::Debug for AuthMiddlewareState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMiddlewareState")
            .field("verifier", &"<CredentialVerifier>")
            .finish()
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Axum middleware for authentication.
///
/// ```ignore
/// let auth_state = AuthMiddlewareState::new(AuthConfig::from_env());
/// let app = Router::new()
///     .route("/api/v1/slots", axum::routing::get(|| async { "OK" }))
///     .layer(middleware::from_fn_with_state(auth_state, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    let auth_context =
        authenticate(state.verifier.as_ref(), auth_header).map_err(AuthMiddlewareError)?;

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware and extractor rejections.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        let api_error = self.0;

        let status = match api_error.code {
            ErrorCode::Unauthorized | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, axum::Json(api_error)).into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed extractor for the caller identity set by [`auth_middleware`].
///
/// Using it on a route without the middleware yields a 500.
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "AuthContext not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_jwt_token, JwtSecret};
    use crate::error::ApiResult;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use slotswap_core::{EntityIdType, UserId};
    use tower::ServiceExt;

    fn test_auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: JwtSecret::new("test_secret".to_string())
                .expect("test secret should be valid"),
            ..Default::default()
        }
    }

    async fn whoami(auth: AuthExtractor) -> String {
        format!("User: {}", auth.user_id)
    }

    fn test_app() -> Router {
        let auth_state = AuthMiddlewareState::new(test_auth_config());
        Router::new()
            .route("/protected", get(whoami))
            .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
    }

    async fn status_with_header(header: Option<String>) -> Result<StatusCode, String> {
        let mut builder = Request::builder().uri("/protected");
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        let request = builder.body(Body::empty()).map_err(|e| e.to_string())?;
        let response = test_app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        Ok(response.status())
    }

    #[tokio::test]
    async fn test_middleware_with_valid_jwt() -> Result<(), String> {
        let user_id = UserId::now_v7();
        let token =
            generate_jwt_token(&test_auth_config(), user_id, None).map_err(|e| e.message)?;

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = test_app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| format!("Failed to read body: {:?}", e))?;
        let body_str =
            String::from_utf8(body.to_vec()).map_err(|e| format!("Invalid UTF-8 body: {}", e))?;
        assert_eq!(body_str, format!("User: {}", user_id));
        Ok(())
    }

    #[tokio::test]
    async fn test_middleware_rejects_missing_and_bad_credentials() -> Result<(), String> {
        assert_eq!(status_with_header(None).await?, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_with_header(Some("Bearer invalid.jwt.token".to_string())).await?,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_with_header(Some("NotBearer token".to_string())).await?,
            StatusCode::UNAUTHORIZED
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_custom_verifier() -> Result<(), String> {
        struct Fixed(UserId);

        impl CredentialVerifier for Fixed {
            fn verify(&self, token: &str) -> ApiResult<AuthContext> {
                if token == "letmein" {
                    Ok(AuthContext::new(self.0))
                } else {
                    Err(ApiError::invalid_token("unknown token"))
                }
            }
        }

        let user_id = UserId::now_v7();
        let state = AuthMiddlewareState::with_verifier(Arc::new(Fixed(user_id)));
        let app = Router::new()
            .route("/protected", get(whoami))
            .layer(middleware::from_fn_with_state(state, auth_middleware));

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer letmein")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn test_auth_extractor_without_middleware() -> Result<(), String> {
        let app = Router::new().route("/unprotected", get(whoami));

        let request = Request::builder()
            .uri("/unprotected")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }
}
