//! API Configuration Module
//!
//! CORS, rate limiting, environment and bind address settings, loaded from
//! environment variables with development defaults.

use std::net::SocketAddr;
use std::time::Duration;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for CORS, rate limiting, and production hardening.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Deployment
    // ========================================================================
    /// Deployment environment name ("development", "staging", "production").
    pub environment: String,

    /// Address the server listens on.
    pub bind_addr: SocketAddr,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins outside production.
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Rate Limiting Configuration
    // ========================================================================
    pub rate_limit_enabled: bool,

    /// Requests per window for callers identified only by IP.
    pub rate_limit_unauthenticated: u32,

    /// Requests per window per authenticated user.
    pub rate_limit_authenticated: u32,

    /// Requests a fresh caller may send back to back before pacing applies.
    pub rate_limit_burst: u32,

    /// Period the per-caller limits are spread over.
    pub rate_limit_window: Duration,

    /// Key anonymous callers by `X-Forwarded-For` / `X-Real-IP`.
    /// Only safe behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

pub const DEFAULT_PORT: u16 = 8080;

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),

            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,

            rate_limit_enabled: true,
            rate_limit_unauthenticated: 100,
            rate_limit_authenticated: 600,
            rate_limit_burst: 10,
            rate_limit_window: Duration::from_secs(60),
            trust_proxy_headers: false,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// - `SLOTSWAP_ENVIRONMENT`: deployment name (default: development)
    /// - `SLOTSWAP_API_BIND`: full bind address, wins over the port variables
    /// - `PORT` / `SLOTSWAP_API_PORT`: port on 0.0.0.0 (default: 8080)
    /// - `SLOTSWAP_CORS_ORIGINS`: comma-separated allowed origins
    /// - `SLOTSWAP_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `SLOTSWAP_CORS_MAX_AGE_SECS`: preflight cache duration (default: 86400)
    /// - `SLOTSWAP_RATE_LIMIT_ENABLED`: "false" disables limiting
    /// - `SLOTSWAP_RATE_LIMIT_UNAUTHENTICATED`: per IP per window (default: 100)
    /// - `SLOTSWAP_RATE_LIMIT_AUTHENTICATED`: per user per window (default: 600)
    /// - `SLOTSWAP_RATE_LIMIT_BURST`: burst capacity (default: 10)
    /// - `SLOTSWAP_RATE_LIMIT_WINDOW_SECS`: window length (default: 60)
    /// - `SLOTSWAP_TRUST_PROXY_HEADERS`: "true" keys by forwarded client IP
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("SLOTSWAP_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            environment: std::env::var("SLOTSWAP_ENVIRONMENT")
                .unwrap_or(defaults.environment),
            bind_addr: resolve_bind_addr(),
            cors_origins,
            cors_allow_credentials: std::env::var("SLOTSWAP_CORS_ALLOW_CREDENTIALS")
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cors_max_age_secs: env_parse("SLOTSWAP_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
            rate_limit_enabled: std::env::var("SLOTSWAP_RATE_LIMIT_ENABLED")
                .map(|s| !s.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            rate_limit_unauthenticated: env_parse("SLOTSWAP_RATE_LIMIT_UNAUTHENTICATED")
                .unwrap_or(defaults.rate_limit_unauthenticated),
            rate_limit_authenticated: env_parse("SLOTSWAP_RATE_LIMIT_AUTHENTICATED")
                .unwrap_or(defaults.rate_limit_authenticated),
            rate_limit_burst: env_parse("SLOTSWAP_RATE_LIMIT_BURST")
                .unwrap_or(defaults.rate_limit_burst),
            rate_limit_window: env_parse("SLOTSWAP_RATE_LIMIT_WINDOW_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            trust_proxy_headers: std::env::var("SLOTSWAP_TRUST_PROXY_HEADERS")
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    pub fn is_production(&self) -> bool {
        is_production_env(&self.environment)
    }

    /// Check if a given origin is allowed.
    ///
    /// `*.example.com` admits any https subdomain of example.com and the
    /// bare domain itself.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return !self.is_production();
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            match (allowed.strip_prefix("*."), origin.strip_prefix("https://")) {
                (Some(domain), Some(host)) => {
                    host == domain
                        || host
                            .strip_suffix(domain)
                            .is_some_and(|sub| sub.ends_with('.'))
                }
                _ => false,
            }
        })
    }
}

/// Whether an environment name selects production hardening.
pub fn is_production_env(environment: &str) -> bool {
    environment.eq_ignore_ascii_case("production") || environment.eq_ignore_ascii_case("prod")
}

/// Resolve the listen address.
///
/// `SLOTSWAP_API_BIND` wins; otherwise `PORT` (set by most PaaS hosts) or
/// `SLOTSWAP_API_PORT` on all interfaces.
pub fn resolve_bind_addr() -> SocketAddr {
    if let Some(addr) = env_parse::<SocketAddr>("SLOTSWAP_API_BIND") {
        return addr;
    }
    let port = env_parse::<u16>("PORT")
        .or_else(|| env_parse("SLOTSWAP_API_PORT"))
        .unwrap_or(DEFAULT_PORT);
    SocketAddr::from(([0, 0, 0, 0], port))
}

// ============================================================================
// TEST SUPPORT
// ============================================================================


#[cfg(test)]
mod tests {
    use super::test_env::{lock, EnvVarGuard};
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert!(!config.cors_allow_credentials);
        assert!(config.rate_limit_enabled);
        assert_eq!(config.bind_addr.port(), 8080);
        assert!(!config.is_production());
    }

    #[test]
    fn test_origin_allowed_dev_mode() {
        let config = ApiConfig::default();
        assert!(config.is_origin_allowed("https://anything.com"));
        assert!(config.is_origin_allowed("http://localhost:3000"));
    }

    #[test]
    fn test_production_without_origins_denies_all() {
        let config = ApiConfig {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert!(!config.is_origin_allowed("https://anything.com"));
    }

    #[test]
    fn test_origin_allowed_exact_and_wildcard() {
        let config = ApiConfig {
            cors_origins: vec![
                "https://slotswap.app".to_string(),
                "*.shifts.example".to_string(),
            ],
            ..Default::default()
        };

        assert!(config.is_origin_allowed("https://slotswap.app"));
        assert!(!config.is_origin_allowed("https://evil.com"));
        assert!(config.is_origin_allowed("https://team.shifts.example"));
        assert!(config.is_origin_allowed("https://shifts.example"));
        assert!(!config.is_origin_allowed("https://badshifts.example"));
        assert!(!config.is_origin_allowed("http://team.shifts.example"));
    }

    #[test]
    fn test_bind_addr_precedence() {
        let _lock = lock();
        let _bind = EnvVarGuard::unset("SLOTSWAP_API_BIND");
        let _api_port = EnvVarGuard::set("SLOTSWAP_API_PORT", "9100");
        let _port = EnvVarGuard::unset("PORT");
        assert_eq!(resolve_bind_addr().port(), 9100);

        let _port = EnvVarGuard::set("PORT", "9200");
        assert_eq!(resolve_bind_addr().port(), 9200);

        let _bind = EnvVarGuard::set("SLOTSWAP_API_BIND", "127.0.0.1:7000");
        assert_eq!(
            resolve_bind_addr(),
            SocketAddr::from(([127, 0, 0, 1], 7000))
        );
    }

    #[test]
    fn test_from_env_reads_rate_limits() {
        let _lock = lock();
        let _enabled = EnvVarGuard::set("SLOTSWAP_RATE_LIMIT_ENABLED", "FALSE");
        let _burst = EnvVarGuard::set("SLOTSWAP_RATE_LIMIT_BURST", "3");
        let _window = EnvVarGuard::set("SLOTSWAP_RATE_LIMIT_WINDOW_SECS", "3600");
        let _trust = EnvVarGuard::set("SLOTSWAP_TRUST_PROXY_HEADERS", "true");
        let _origins = EnvVarGuard::set("SLOTSWAP_CORS_ORIGINS", " https://a.test , ,https://b.test");
        let config = ApiConfig::from_env();
        assert!(!config.rate_limit_enabled);
        assert_eq!(config.rate_limit_burst, 3);
        assert_eq!(config.rate_limit_window, Duration::from_secs(3600));
        assert!(config.trust_proxy_headers);
        assert_eq!(config.cors_origins, vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn test_proxy_headers_untrusted_by_default() {
        let _lock = lock();
        let _trust = EnvVarGuard::unset("SLOTSWAP_TRUST_PROXY_HEADERS");
        assert!(!ApiConfig::from_env().trust_proxy_headers);
        assert!(!ApiConfig::default().trust_proxy_headers);
    }

    #[test]
    fn test_production_aliases() {
        for name in ["production", "PRODUCTION", "prod", "Prod"] {
            assert!(is_production_env(name), "{} selects production", name);
            let config = ApiConfig {
                environment: name.to_string(),
                ..Default::default()
            };
            assert!(config.is_production());
        }
        for name in ["development", "staging", "preprod", ""] {
            assert!(!is_production_env(name), "{} is not production", name);
        }
    }
}
