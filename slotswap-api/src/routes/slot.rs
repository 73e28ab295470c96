//! Slot REST API Routes
//!
//! Owner CRUD over the caller's own slots. Every handler delegates to the
//! swap engine, which enforces ownership and refuses edits to slots frozen
//! by a pending swap.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use slotswap_core::{NewSlot, SlotId, SlotPatch};

use crate::{
    error::{ApiError, ApiResult},
    extractors::{PathId, ValidJson},
    middleware::AuthExtractor,
    state::{ApiEngine, AppState},
    types::{CreateSlotRequest, ReplaceSlotRequest, SlotListResponse, UpdateSlotRequest},
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/slots - Create a slot owned by the caller
#[utoipa::path(
    post,
    path = "/api/v1/slots",
    tag = "Slots",
    request_body = CreateSlotRequest,
    responses(
        (status = 201, description = "Slot created", body = slotswap_core::Slot),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 409, description = "Status not settable by owners", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_slot(
    State(engine): State<ApiEngine>,
    AuthExtractor(auth): AuthExtractor,
    ValidJson(req): ValidJson<CreateSlotRequest>,
) -> ApiResult<impl IntoResponse> {
    let slot = engine.create_slot(auth.user_id, NewSlot::from(req)).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

/// GET /api/v1/slots - List the caller's slots
#[utoipa::path(
    get,
    path = "/api/v1/slots",
    tag = "Slots",
    responses(
        (status = 200, description = "The caller's slots, earliest first", body = SlotListResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_my_slots(
    State(engine): State<ApiEngine>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<impl IntoResponse> {
    let slots = engine.list_my_slots(auth.user_id).await?;
    Ok(Json(SlotListResponse::from(slots)))
}

/// GET /api/v1/slots/{id} - Get one of the caller's slots
#[utoipa::path(
    get,
    path = "/api/v1/slots/{id}",
    tag = "Slots",
    params(("id" = uuid::Uuid, Path, description = "Slot ID")),
    responses(
        (status = 200, description = "Slot details", body = slotswap_core::Slot),
        (status = 403, description = "Slot belongs to another user", body = ApiError),
        (status = 404, description = "Slot not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_slot(
    State(engine): State<ApiEngine>,
    AuthExtractor(auth): AuthExtractor,
    PathId(slot_id): PathId<SlotId>,
) -> ApiResult<impl IntoResponse> {
    let slot = engine.get_slot(auth.user_id, slot_id).await?;
    Ok(Json(slot))
}

/// PATCH /api/v1/slots/{id} - Partially update a slot
#[utoipa::path(
    patch,
    path = "/api/v1/slots/{id}",
    tag = "Slots",
    params(("id" = uuid::Uuid, Path, description = "Slot ID")),
    request_body = UpdateSlotRequest,
    responses(
        (status = 200, description = "Slot updated", body = slotswap_core::Slot),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Slot belongs to another user", body = ApiError),
        (status = 404, description = "Slot not found", body = ApiError),
        (status = 409, description = "Slot is frozen by a pending swap", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_slot(
    State(engine): State<ApiEngine>,
    AuthExtractor(auth): AuthExtractor,
    PathId(slot_id): PathId<SlotId>,
    ValidJson(req): ValidJson<UpdateSlotRequest>,
) -> ApiResult<impl IntoResponse> {
    let slot = engine
        .update_slot(auth.user_id, slot_id, SlotPatch::from(req))
        .await?;
    Ok(Json(slot))
}

/// PUT /api/v1/slots/{id} - Replace a slot's editable fields
#[utoipa::path(
    put,
    path = "/api/v1/slots/{id}",
    tag = "Slots",
    params(("id" = uuid::Uuid, Path, description = "Slot ID")),
    request_body = ReplaceSlotRequest,
    responses(
        (status = 200, description = "Slot replaced", body = slotswap_core::Slot),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Slot belongs to another user", body = ApiError),
        (status = 404, description = "Slot not found", body = ApiError),
        (status = 409, description = "Slot is frozen by a pending swap", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn replace_slot(
    State(engine): State<ApiEngine>,
    AuthExtractor(auth): AuthExtractor,
    PathId(slot_id): PathId<SlotId>,
    ValidJson(req): ValidJson<ReplaceSlotRequest>,
) -> ApiResult<impl IntoResponse> {
    let slot = engine
        .update_slot(auth.user_id, slot_id, SlotPatch::from(req))
        .await?;
    Ok(Json(slot))
}

/// DELETE /api/v1/slots/{id} - Delete a slot
#[utoipa::path(
    delete,
    path = "/api/v1/slots/{id}",
    tag = "Slots",
    params(("id" = uuid::Uuid, Path, description = "Slot ID")),
    responses(
        (status = 204, description = "Slot deleted"),
        (status = 403, description = "Slot belongs to another user", body = ApiError),
        (status = 404, description = "Slot not found", body = ApiError),
        (status = 409, description = "Slot is frozen by a pending swap", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_slot(
    State(engine): State<ApiEngine>,
    AuthExtractor(auth): AuthExtractor,
    PathId(slot_id): PathId<SlotId>,
) -> ApiResult<StatusCode> {
    engine.delete_slot(auth.user_id, slot_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_slots).post(create_slot))
        .route(
            "/:id",
            get(get_slot)
                .patch(update_slot)
                .put(replace_slot)
                .delete(delete_slot),
        )
}
