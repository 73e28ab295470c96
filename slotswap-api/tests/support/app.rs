//! In-process API harness over an in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde::de::DeserializeOwned;
use slotswap_api::{
    create_api_router, generate_jwt_token, ApiConfig, AppState, AuthConfig, JwtSecret,
};
use slotswap_core::UserId;
use slotswap_storage::InMemoryStore;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub auth: AuthConfig,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

impl TestResponse {
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.body.clone())
            .unwrap_or_else(|e| panic!("unexpected body {}: {}", self.body, e))
    }

    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: JwtSecret::new("integration_test_secret_0123456789".to_string())
            .expect("test secret is non-empty"),
        ..Default::default()
    }
}

impl TestApp {
    pub fn new() -> Self {
        let api_config = ApiConfig {
            rate_limit_enabled: false,
            ..Default::default()
        };
        Self::with_config(api_config)
    }

    pub fn with_config(api_config: ApiConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let auth = test_auth_config();
        let router = create_api_router(AppState::new(store.clone()), &api_config, auth.clone())
            .expect("development config is accepted");
        Self {
            router,
            store,
            auth,
        }
    }

    pub fn token(&self, user: UserId) -> String {
        generate_jwt_token(&self.auth, user, None).expect("token is issued")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<UserId>,
        body: Option<serde_json::Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request is well formed");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, user: UserId) -> TestResponse {
        self.send(Method::GET, uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: UserId, body: serde_json::Value) -> TestResponse {
        self.send(Method::POST, uri, Some(user), Some(body)).await
    }
}
