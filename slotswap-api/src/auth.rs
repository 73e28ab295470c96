//! Authentication Module
//!
//! Resolves `Authorization: Bearer <jwt>` credentials to a caller identity.
//! Token issuance lives here for tooling and tests; there is no login
//! endpoint.

use crate::config::is_production_env;
use crate::error::{ApiError, ApiResult};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use slotswap_core::UserId;
use std::sync::Arc;

const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock used for JWT time validation.
///
/// Token times are checked against this clock instead of inside
/// `jsonwebtoken`, so tests can pin the current time.
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds. Negative before 1970.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}


// ============================================================================
// JWT SECRET
// ============================================================================

/// JWT signing secret that never prints its value.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    pub fn new(secret: String) -> ApiResult<Self> {
        if secret.is_empty() {
            return Err(ApiError::invalid_input("JWT secret must not be empty"));
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value for signing and verification only.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }

    fn insecure_default() -> Self {
        Self(SecretString::new(INSECURE_DEFAULT_SECRET.into()))
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: JwtSecret,

    /// JWT algorithm (default: HS256)
    pub jwt_algorithm: Algorithm,

    /// Lifetime of issued tokens in seconds (default: 1 hour)
    pub jwt_expiration_secs: i64,

    /// Tolerated clock drift in seconds when checking `exp` (default: 60)
    pub jwt_clock_skew_secs: i64,

    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: JwtSecret::insecure_default(),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: 3600,
            jwt_clock_skew_secs: 60,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Create authentication configuration from environment variables.
    ///
    /// - `SLOTSWAP_JWT_SECRET` (fallback `ACCESS_TOKEN_SECRET`): signing secret
    /// - `SLOTSWAP_JWT_EXPIRATION_SECS`: token lifetime (default: 3600)
    /// - `SLOTSWAP_JWT_CLOCK_SKEW_SECS`: skew tolerance (default: 60)
    pub fn from_env() -> Self {
        let secret = std::env::var("SLOTSWAP_JWT_SECRET")
            .or_else(|_| std::env::var("ACCESS_TOKEN_SECRET"))
            .ok()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| JwtSecret::new(s).ok())
            .unwrap_or_else(JwtSecret::insecure_default);

        let defaults = Self::default();
        Self {
            jwt_secret: secret,
            jwt_expiration_secs: std::env::var("SLOTSWAP_JWT_EXPIRATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jwt_expiration_secs),
            jwt_clock_skew_secs: std::env::var("SLOTSWAP_JWT_CLOCK_SKEW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jwt_clock_skew_secs),
            ..defaults
        }
    }

    /// Refuse the insecure default or a short secret in production.
    ///
    /// Outside production the same problems are logged as warnings.
    pub fn validate_for_production(&self, environment: &str) -> ApiResult<()> {
        let is_production = is_production_env(environment);

        if self.jwt_secret.is_insecure_default() {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "Cannot start server in production with insecure JWT secret. \
                     Set SLOTSWAP_JWT_SECRET to a secure value. \
                     SLOTSWAP_ENVIRONMENT={}",
                    environment
                )));
            }
            tracing::warn!(
                "Using insecure default JWT secret. Set SLOTSWAP_JWT_SECRET \
                 (minimum 32 characters) before deploying."
            );
        } else if self.jwt_secret.len() < 32 {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "JWT secret is too short for production use ({} chars). \
                     It must be at least 32 characters long.",
                    self.jwt_secret.len()
                )));
            }
            tracing::warn!(
                length = self.jwt_secret.len(),
                "JWT secret is short. Use at least 32 characters in production."
            );
        }

        Ok(())
    }
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(
        user_id: UserId,
        email: Option<String>,
        expiration_secs: i64,
        clock: &dyn JwtClock,
    ) -> Self {
        let now = clock.now_epoch_secs();
        Self {
            sub: user_id,
            email,
            iat: now,
            exp: now + expiration_secs,
        }
    }

    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        self.exp < clock.now_epoch_secs()
    }
}

// ============================================================================
// AUTHENTICATION CONTEXT
// ============================================================================

/// Caller identity, inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub email: Option<String>,
}

impl AuthContext {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            email: None,
        }
    }
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
        }
    }
}

// ============================================================================
// CREDENTIAL VERIFICATION
// ============================================================================

/// Resolves a bearer token to the caller it was issued for.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &str) -> ApiResult<AuthContext>;
}

/// HS256 JWT verifier.
#[derive(Debug, Clone)]
pub struct JwtVerifier {
    config: AuthConfig,
}

impl JwtVerifier {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

impl CredentialVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> ApiResult<AuthContext> {
        validate_jwt_token(&self.config, token).map(AuthContext::from)
    }
}

/// Check `exp` against `now`, allowing `leeway_secs` of drift.
fn validate_claim_times(now: i64, exp: i64, leeway_secs: i64) -> ApiResult<()> {
    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }
    Ok(())
}

/// Validate a JWT and extract its claims.
///
/// `jsonwebtoken` checks the signature and that `exp` is present; the
/// expiry itself is checked against the configured clock.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidToken => {
                ApiError::invalid_token("Token is invalid")
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    let claims = token_data.claims;
    let now = config.clock.now_epoch_secs();
    if now < 0 {
        tracing::error!(timestamp = now, "System clock returned pre-epoch time");
        return Err(ApiError::internal_error("Server time configuration error"));
    }

    validate_claim_times(now, claims.exp, config.jwt_clock_skew_secs)?;
    Ok(claims)
}

/// Issue a signed JWT for `user_id`.
pub fn generate_jwt_token(
    config: &AuthConfig,
    user_id: UserId,
    email: Option<String>,
) -> ApiResult<String> {
    let claims = Claims::new(user_id, email, config.jwt_expiration_secs, &*config.clock);
    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    let header = Header::new(config.jwt_algorithm);

    encode(&header, &claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Authenticate from the raw `Authorization` header value.
pub fn authenticate(
    verifier: &dyn CredentialVerifier,
    auth_header: Option<&str>,
) -> ApiResult<AuthContext> {
    let Some(auth_value) = auth_header else {
        return Err(ApiError::unauthorized(
            "Authentication required: provide an Authorization header",
        ));
    };
    match auth_value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => verifier.verify(token.trim()),
        Some(_) => Err(ApiError::invalid_token("Bearer token is empty")),
        None => Err(ApiError::invalid_token(
            "Authorization header must use Bearer scheme",
        )),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_env::{lock, EnvVarGuard};
    use crate::error::ErrorCode;
    use slotswap_core::EntityIdType;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: JwtSecret::new("test_secret".to_string())
                .expect("Test secret should be valid"),
            clock: Arc::new(test_clocks::valid()),
            ..Default::default()
        }
    }

    #[test]
    fn test_jwt_generation_and_validation() -> ApiResult<()> {
        let config = test_config();
        let user_id = UserId::now_v7();

        let token = generate_jwt_token(&config, user_id, Some("a@example.com".to_string()))?;
        let claims = validate_jwt_token(&config, &token)?;

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email.as_deref(), Some("a@example.com"));
        assert!(!claims.is_expired(&test_clocks::valid()));
        Ok(())
    }

    #[test]
    fn test_expired_token() -> ApiResult<()> {
        let mut config = test_config();
        let token = generate_jwt_token(&config, UserId::now_v7(), None)?;

        config.clock = Arc::new(test_clocks::future());
        let err = validate_jwt_token(&config, &token).unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenExpired);
        Ok(())
    }

    #[test]
    fn test_clock_skew_is_tolerated() -> ApiResult<()> {
        let mut config = test_config();
        let token = generate_jwt_token(&config, UserId::now_v7(), None)?;
        let issued = test_clocks::valid().0;

        config.clock = Arc::new(FixedClock(issued + config.jwt_expiration_secs + 30));
        assert!(validate_jwt_token(&config, &token).is_ok());

        config.clock = Arc::new(FixedClock(issued + config.jwt_expiration_secs + 61));
        assert!(validate_jwt_token(&config, &token).is_err());
        Ok(())
    }

    #[test]
    fn test_wrong_secret_is_invalid_token() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(&config, UserId::now_v7(), None)?;

        let other = AuthConfig {
            jwt_secret: JwtSecret::new("a_different_secret".to_string())?,
            ..test_config()
        };
        let err = validate_jwt_token(&other, &token).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);
        Ok(())
    }

    #[test]
    fn test_authenticate_header_forms() -> ApiResult<()> {
        let verifier = JwtVerifier::new(test_config());
        let user_id = UserId::now_v7();
        let token = generate_jwt_token(verifier.config(), user_id, None)?;

        let ctx = authenticate(&verifier, Some(&format!("Bearer {}", token)))?;
        assert_eq!(ctx, AuthContext::new(user_id));

        let err = authenticate(&verifier, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);

        let err = authenticate(&verifier, Some(&format!("Basic {}", token))).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);

        let err = authenticate(&verifier, Some("Bearer not.a.jwt")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);
        Ok(())
    }

    #[test]
    fn test_secret_is_redacted_in_debug() -> ApiResult<()> {
        let secret = JwtSecret::new("super-secret-value".to_string())?;
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("REDACTED"));
        assert!(JwtSecret::new(String::new()).is_err());
        Ok(())
    }

    #[test]
    fn test_production_validation() -> ApiResult<()> {
        assert!(AuthConfig::default()
            .validate_for_production("production")
            .is_err());
        assert!(AuthConfig::default()
            .validate_for_production("development")
            .is_ok());
        assert!(test_config().validate_for_production("production").is_err());

        let secure = AuthConfig {
            jwt_secret: JwtSecret::new(
                "this-is-a-very-secure-secret-that-is-at-least-32-characters-long".to_string(),
            )?,
            ..Default::default()
        };
        assert!(secure.validate_for_production("production").is_ok());
        Ok(())
    }

    #[test]
    fn test_from_env_secret_fallback() {
        let _lock = lock();
        let _primary = EnvVarGuard::unset("SLOTSWAP_JWT_SECRET");
        let _fallback = EnvVarGuard::set("ACCESS_TOKEN_SECRET", "fallback-secret");
        let _exp = EnvVarGuard::set("SLOTSWAP_JWT_EXPIRATION_SECS", "900");

        let config = AuthConfig::from_env();
        assert_eq!(config.jwt_secret.expose(), "fallback-secret");
        assert_eq!(config.jwt_expiration_secs, 900);
        assert_eq!(config.jwt_clock_skew_secs, 60);

        let _primary = EnvVarGuard::set("SLOTSWAP_JWT_SECRET", "primary-secret");
        assert_eq!(AuthConfig::from_env().jwt_secret.expose(), "primary-secret");

        let _primary = EnvVarGuard::set("SLOTSWAP_JWT_SECRET", "  ");
        let _fallback = EnvVarGuard::unset("ACCESS_TOKEN_SECRET");
        assert!(AuthConfig::from_env().jwt_secret.is_insecure_default());
    }
}
