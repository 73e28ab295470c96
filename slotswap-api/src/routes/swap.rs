//! Swap Negotiation REST API Routes
//!
//! Browsing slots open for trade, proposing swaps and answering them.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use slotswap_core::{ProposalId, SlotSwapResult, StoredProposal, SwapStatus};

use crate::{
    error::{ApiError, ApiResult},
    extractors::{PathId, ValidJson},
    middleware::AuthExtractor,
    state::{ApiEngine, AppState},
    telemetry::metrics::{failure_outcome, record_swap_operation},
    types::{
        CreateSwapRequest, RespondSwapRequest, SlotListResponse, SwapProposalResponse,
        SwapRequestListResponse,
    },
};

/// Count a negotiation step by its outcome.
fn record_outcome(operation: &str, result: &SlotSwapResult<StoredProposal>) {
    let outcome = match result {
        Ok(p) => match p.status {
            SwapStatus::Pending => "proposed",
            SwapStatus::Accepted => "accepted",
            SwapStatus::Rejected => "rejected",
        },
        Err(e) => failure_outcome(e),
    };
    record_swap_operation(operation, outcome);
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/swappable-slots - Slots other users have opened for trade
#[utoipa::path(
    get,
    path = "/api/v1/swappable-slots",
    tag = "Swaps",
    responses(
        (status = 200, description = "Swappable slots owned by others", body = SlotListResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_swappable(
    State(engine): State<ApiEngine>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<impl IntoResponse> {
    let slots = engine.list_swappable(auth.user_id).await?;
    Ok(Json(SlotListResponse::from(slots)))
}

/// POST /api/v1/swap-requests - Propose a swap
#[utoipa::path(
    post,
    path = "/api/v1/swap-requests",
    tag = "Swaps",
    request_body = CreateSwapRequest,
    responses(
        (status = 201, description = "Swap proposed, both slots frozen", body = SwapProposalResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Offered slot is not the caller's", body = ApiError),
        (status = 404, description = "Slot not found", body = ApiError),
        (status = 409, description = "A slot is not open for trade", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_swap_request(
    State(engine): State<ApiEngine>,
    AuthExtractor(auth): AuthExtractor,
    ValidJson(req): ValidJson<CreateSwapRequest>,
) -> ApiResult<impl IntoResponse> {
    let result = engine
        .propose_swap(auth.user_id, req.my_slot_id, req.their_slot_id)
        .await;
    record_outcome("propose", &result);
    let proposal = result?;
    Ok((StatusCode::CREATED, Json(SwapProposalResponse::from(proposal))))
}

/// POST /api/v1/swap-requests/{id}/respond - Accept or reject a swap
#[utoipa::path(
    post,
    path = "/api/v1/swap-requests/{id}/respond",
    tag = "Swaps",
    params(("id" = uuid::Uuid, Path, description = "Swap request ID")),
    request_body = RespondSwapRequest,
    responses(
        (status = 200, description = "Swap resolved", body = SwapProposalResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Caller is not the responder", body = ApiError),
        (status = 404, description = "Swap request not found", body = ApiError),
        (status = 409, description = "Swap request already resolved", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn respond_to_swap_request(
    State(engine): State<ApiEngine>,
    AuthExtractor(auth): AuthExtractor,
    PathId(proposal_id): PathId<ProposalId>,
    ValidJson(req): ValidJson<RespondSwapRequest>,
) -> ApiResult<impl IntoResponse> {
    let result = engine
        .respond_to_swap(auth.user_id, proposal_id, req.accept)
        .await;
    record_outcome("respond", &result);
    Ok(Json(SwapProposalResponse::from(result?)))
}

/// GET /api/v1/swap-requests/incoming - Swap requests addressed to the caller
#[utoipa::path(
    get,
    path = "/api/v1/swap-requests/incoming",
    tag = "Swaps",
    responses(
        (status = 200, description = "Requests where the caller is responder, newest first", body = SwapRequestListResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_incoming(
    State(engine): State<ApiEngine>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<impl IntoResponse> {
    let requests = engine.list_incoming(auth.user_id).await?;
    Ok(Json(SwapRequestListResponse::from(requests)))
}

/// GET /api/v1/swap-requests/outgoing - Swap requests the caller sent
#[utoipa::path(
    get,
    path = "/api/v1/swap-requests/outgoing",
    tag = "Swaps",
    responses(
        (status = 200, description = "Requests where the caller is requester, newest first", body = SwapRequestListResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_outgoing(
    State(engine): State<ApiEngine>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<impl IntoResponse> {
    let requests = engine.list_outgoing(auth.user_id).await?;
    Ok(Json(SwapRequestListResponse::from(requests)))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Routes nested under `/swap-requests`. `list_swappable` is mounted
/// separately at `/swappable-slots`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_swap_request))
        .route("/incoming", get(list_incoming))
        .route("/outgoing", get(list_outgoing))
        .route("/:id/respond", post(respond_to_swap_request))
}
