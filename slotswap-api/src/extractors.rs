//! Request extractors that reject with structured [`ApiError`] bodies.
//!
//! Axum's stock `Path` and `Json` extractors answer with plain-text
//! rejections; these wrappers keep every error response in the same JSON
//! shape.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use slotswap_core::EntityIdType;
use uuid::Uuid;

use crate::error::ApiError;

/// Extractor for type-safe entity IDs from path parameters.
///
/// ```rust,ignore
/// async fn get_slot(PathId(slot_id): PathId<SlotId>) -> ApiResult<impl IntoResponse> {
///     // slot_id is SlotId, not Uuid
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PathId<T: EntityIdType>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathId<T>
where
    S: Send + Sync,
    T: EntityIdType,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(uuid): Path<Uuid> = Path::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                ApiError::invalid_format("id", "UUID").with_details(serde_json::json!({
                    "entity_type": T::ENTITY_TYPE.as_str(),
                    "path": parts.uri.path(),
                    "reason": e.body_text(),
                }))
            })?;

        Ok(PathId(T::new(uuid)))
    }
}

/// JSON body extractor whose rejection is a `VALIDATION_FAILED` error.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::invalid_input("Expected request with `Content-Type: application/json`")
        }
        other => ApiError::validation_failed(other.body_text()),
    }
}
