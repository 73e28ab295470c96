//! End-to-end HTTP tests for the slot swap API
//!
//! Every request goes through the full router (auth, extractors, error
//! mapping) against an in-memory store.

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;
use slotswap_api::{
    ApiError, ErrorCode, SlotListResponse, SwapProposalResponse, SwapRequestListResponse,
};
use slotswap_core::{EntityIdType, Slot, SlotId, SlotStatus, SwapStatus, UserId};
use slotswap_test_utils::{assertions::assert_slot_invariant, fixtures, snapshot};
use uuid::Uuid;

#[path = "support/app.rs"]
mod test_app_support;
use test_app_support::{TestApp, TestResponse};

// ============================================================================
// HELPERS
// ============================================================================

fn slot_body(title: &str, offset_hours: i64, status: &str) -> serde_json::Value {
    let start = Utc::now() + Duration::hours(offset_hours);
    json!({
        "title": title,
        "start_time": start,
        "end_time": start + Duration::hours(1),
        "status": status,
    })
}

async fn create_slot(app: &TestApp, owner: UserId, title: &str, status: &str) -> Slot {
    let response = app
        .post("/api/v1/slots", owner, slot_body(title, 24, status))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    response.json()
}

async fn propose(app: &TestApp, requester: UserId, mine: SlotId, theirs: SlotId) -> TestResponse {
    app.post(
        "/api/v1/swap-requests",
        requester,
        json!({ "my_slot_id": mine, "their_slot_id": theirs }),
    )
    .await
}

async fn respond(app: &TestApp, responder: UserId, proposal: &str, accept: bool) -> TestResponse {
    app.post(
        &format!("/api/v1/swap-requests/{}/respond", proposal),
        responder,
        json!({ "accept": accept }),
    )
    .await
}

fn assert_error(response: &TestResponse, status: StatusCode, code: ErrorCode) {
    assert_eq!(response.status, status, "{}", response.body);
    let err: ApiError = response.json();
    assert_eq!(err.code, code, "{}", response.body);
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

#[tokio::test]
async fn test_api_routes_require_bearer_token() {
    let app = TestApp::new();
    for uri in [
        "/api/v1/slots",
        "/api/v1/swappable-slots",
        "/api/v1/swap-requests/incoming",
        "/api/v1/swap-requests/outgoing",
    ] {
        let response = app.send(Method::GET, uri, None, None).await;
        assert_error(&response, StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized);
    }
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let app = TestApp::new();
    let mut forged = app.auth.clone();
    forged.jwt_secret = slotswap_api::JwtSecret::new("a_completely_different_secret".to_string())
        .expect("non-empty secret");
    let token = slotswap_api::generate_jwt_token(&forged, fixtures::alice(), None)
        .expect("token is issued");

    let request = axum::http::Request::builder()
        .uri("/api/v1/slots")
        .header("authorization", format!("Bearer {}", token))
        .body(axum::body::Body::empty())
        .expect("request is well formed");
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .expect("router is infallible");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// SLOT CRUD
// ============================================================================

#[tokio::test]
async fn test_slot_crud_lifecycle() {
    let app = TestApp::new();
    let alice = fixtures::alice();

    let slot = create_slot(&app, alice, "Standup", "BUSY").await;
    assert_eq!(slot.owner_id, alice);
    assert_eq!(slot.status, SlotStatus::Busy);

    let listed: SlotListResponse = app.get("/api/v1/slots", alice).await.json();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.slots[0].slot_id, slot.slot_id);

    let uri = format!("/api/v1/slots/{}", slot.slot_id);
    let patched = app
        .send(
            Method::PATCH,
            &uri,
            Some(alice),
            Some(json!({ "status": "SWAPPABLE" })),
        )
        .await;
    assert_eq!(patched.status, StatusCode::OK, "{}", patched.body);
    let patched: Slot = patched.json();
    assert_eq!(patched.status, SlotStatus::Swappable);
    assert_eq!(patched.title, "Standup");

    let mut replacement = slot_body("Retro", 48, "BUSY");
    replacement["title"] = json!("Retro");
    let replaced = app.send(Method::PUT, &uri, Some(alice), Some(replacement)).await;
    assert_eq!(replaced.status, StatusCode::OK, "{}", replaced.body);
    let replaced: Slot = replaced.json();
    assert_eq!(replaced.title, "Retro");
    assert_eq!(replaced.status, SlotStatus::Busy);

    let deleted = app.send(Method::DELETE, &uri, Some(alice), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let missing = app.get(&uri, alice).await;
    assert_error(&missing, StatusCode::NOT_FOUND, ErrorCode::EntityNotFound);
}

#[tokio::test]
async fn test_new_slot_defaults_to_busy() {
    let app = TestApp::new();
    let start = Utc::now() + Duration::hours(3);
    let response = app
        .post(
            "/api/v1/slots",
            fixtures::alice(),
            json!({ "title": "Focus", "start_time": start, "end_time": start + Duration::hours(2) }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json::<Slot>().status, SlotStatus::Busy);
}

#[tokio::test]
async fn test_slot_validation_failures() {
    let app = TestApp::new();
    let alice = fixtures::alice();

    let start = Utc::now();
    let inverted = app
        .post(
            "/api/v1/slots",
            alice,
            json!({ "title": "Backwards", "start_time": start, "end_time": start - Duration::hours(1) }),
        )
        .await;
    assert_error(&inverted, StatusCode::BAD_REQUEST, ErrorCode::ValidationFailed);

    let pending = app
        .post("/api/v1/slots", alice, slot_body("Sneaky", 2, "SWAP_PENDING"))
        .await;
    assert_error(&pending, StatusCode::CONFLICT, ErrorCode::StateConflict);

    let malformed = app
        .post("/api/v1/slots", alice, json!({ "title": 42 }))
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    let bad_id = app.get("/api/v1/slots/not-a-uuid", alice).await;
    assert_error(&bad_id, StatusCode::BAD_REQUEST, ErrorCode::InvalidFormat);
}

#[tokio::test]
async fn test_slots_are_private_to_their_owner() {
    let app = TestApp::new();
    let slot = create_slot(&app, fixtures::alice(), "Private", "BUSY").await;
    let uri = format!("/api/v1/slots/{}", slot.slot_id);

    let read = app.get(&uri, fixtures::bob()).await;
    assert_error(&read, StatusCode::FORBIDDEN, ErrorCode::Forbidden);

    let delete = app
        .send(Method::DELETE, &uri, Some(fixtures::bob()), None)
        .await;
    assert_error(&delete, StatusCode::FORBIDDEN, ErrorCode::Forbidden);

    let bob_slots: SlotListResponse = app.get("/api/v1/slots", fixtures::bob()).await.json();
    assert_eq!(bob_slots.total, 0);
}

// ============================================================================
// SWAP NEGOTIATION
// ============================================================================

#[tokio::test]
async fn test_alice_and_bob_swap_over_http() {
    let app = TestApp::new();
    let (alice, bob) = (fixtures::alice(), fixtures::bob());

    let a = create_slot(&app, alice, "Alice Tuesday", "SWAPPABLE").await;
    let b = create_slot(&app, bob, "Bob Thursday", "SWAPPABLE").await;

    let market: SlotListResponse = app.get("/api/v1/swappable-slots", alice).await.json();
    assert_eq!(market.total, 1);
    assert_eq!(market.slots[0].slot_id, b.slot_id);

    let proposed = propose(&app, alice, a.slot_id, b.slot_id).await;
    assert_eq!(proposed.status, StatusCode::CREATED, "{}", proposed.body);
    let proposed: SwapProposalResponse = proposed.json();
    assert_eq!(proposed.proposal.status, SwapStatus::Pending);
    assert_eq!(proposed.proposal.data.responder_id, bob);

    // Both slots are frozen and leave the marketplace.
    let market: SlotListResponse = app.get("/api/v1/swappable-slots", bob).await.json();
    assert_eq!(market.total, 0);
    assert_slot_invariant(&snapshot(app.store.as_ref()).await.expect("snapshot"));

    let incoming: SwapRequestListResponse =
        app.get("/api/v1/swap-requests/incoming", bob).await.json();
    assert_eq!(incoming.total, 1);
    let request = &incoming.requests[0];
    assert_eq!(request.proposal.data.proposal_id, proposed.proposal_id);
    assert_eq!(
        request.requester_slot.as_ref().map(|s| s.status),
        Some(SlotStatus::SwapPending)
    );

    let outgoing: SwapRequestListResponse =
        app.get("/api/v1/swap-requests/outgoing", alice).await.json();
    assert_eq!(outgoing.total, 1);

    let accepted = respond(&app, bob, &proposed.proposal_id.to_string(), true).await;
    assert_eq!(accepted.status, StatusCode::OK, "{}", accepted.body);
    let accepted: SwapProposalResponse = accepted.json();
    assert_eq!(accepted.proposal.status, SwapStatus::Accepted);

    // Ownership exchanged, both slots busy.
    let alice_slots: SlotListResponse = app.get("/api/v1/slots", alice).await.json();
    assert_eq!(alice_slots.total, 1);
    assert_eq!(alice_slots.slots[0].slot_id, b.slot_id);
    assert_eq!(alice_slots.slots[0].status, SlotStatus::Busy);

    let bob_slots: SlotListResponse = app.get("/api/v1/slots", bob).await.json();
    assert_eq!(bob_slots.total, 1);
    assert_eq!(bob_slots.slots[0].slot_id, a.slot_id);
    assert_eq!(bob_slots.slots[0].status, SlotStatus::Busy);

    assert_slot_invariant(&snapshot(app.store.as_ref()).await.expect("snapshot"));
}

#[tokio::test]
async fn test_rejection_reopens_both_slots() {
    let app = TestApp::new();
    let (alice, bob) = (fixtures::alice(), fixtures::bob());
    let a = create_slot(&app, alice, "A", "SWAPPABLE").await;
    let b = create_slot(&app, bob, "B", "SWAPPABLE").await;

    let proposed: SwapProposalResponse = propose(&app, alice, a.slot_id, b.slot_id).await.json();
    let rejected = respond(&app, bob, &proposed.proposal_id.to_string(), false).await;
    assert_eq!(rejected.status, StatusCode::OK);
    assert_eq!(
        rejected.json::<SwapProposalResponse>().proposal.status,
        SwapStatus::Rejected
    );

    let alice_slots: SlotListResponse = app.get("/api/v1/slots", alice).await.json();
    assert_eq!(alice_slots.slots[0].slot_id, a.slot_id);
    assert_eq!(alice_slots.slots[0].status, SlotStatus::Swappable);

    let market: SlotListResponse = app.get("/api/v1/swappable-slots", alice).await.json();
    assert_eq!(market.total, 1);
    assert_eq!(market.slots[0].slot_id, b.slot_id);
}

#[tokio::test]
async fn test_swap_error_mapping() {
    let app = TestApp::new();
    let (alice, bob, carol) = (fixtures::alice(), fixtures::bob(), fixtures::carol());
    let a = create_slot(&app, alice, "A", "SWAPPABLE").await;
    let b = create_slot(&app, bob, "B", "SWAPPABLE").await;
    let busy = create_slot(&app, bob, "Busy", "BUSY").await;

    // Unknown slot
    let unknown = propose(&app, alice, a.slot_id, SlotId::now_v7()).await;
    assert_error(&unknown, StatusCode::NOT_FOUND, ErrorCode::EntityNotFound);

    // Offering a slot the caller does not own
    let stolen = propose(&app, carol, a.slot_id, b.slot_id).await;
    assert_error(&stolen, StatusCode::FORBIDDEN, ErrorCode::Forbidden);

    // Target not open for trade
    let closed = propose(&app, alice, a.slot_id, busy.slot_id).await;
    assert_error(&closed, StatusCode::CONFLICT, ErrorCode::StateConflict);

    let proposed: SwapProposalResponse = propose(&app, alice, a.slot_id, b.slot_id).await.json();
    let id = proposed.proposal_id.to_string();

    // Frozen slots accept no second proposal and no owner edits.
    let again = propose(&app, alice, a.slot_id, b.slot_id).await;
    assert_error(&again, StatusCode::CONFLICT, ErrorCode::StateConflict);
    let edit = app
        .send(
            Method::PATCH,
            &format!("/api/v1/slots/{}", a.slot_id),
            Some(alice),
            Some(json!({ "title": "Renamed" })),
        )
        .await;
    assert_error(&edit, StatusCode::CONFLICT, ErrorCode::StateConflict);

    // Only the responder may answer.
    let by_requester = respond(&app, alice, &id, true).await;
    assert_error(&by_requester, StatusCode::FORBIDDEN, ErrorCode::Forbidden);

    let missing = respond(&app, bob, &Uuid::now_v7().to_string(), true).await;
    assert_error(&missing, StatusCode::NOT_FOUND, ErrorCode::EntityNotFound);

    let malformed = respond(&app, bob, "nope", true).await;
    assert_error(&malformed, StatusCode::BAD_REQUEST, ErrorCode::InvalidFormat);

    assert_eq!(respond(&app, bob, &id, true).await.status, StatusCode::OK);
    let twice = respond(&app, bob, &id, false).await;
    assert_error(&twice, StatusCode::CONFLICT, ErrorCode::StateConflict);

    assert_slot_invariant(&snapshot(app.store.as_ref()).await.expect("snapshot"));
}

// ============================================================================
// PUBLIC ENDPOINTS
// ============================================================================

#[tokio::test]
async fn test_public_endpoints_need_no_token() {
    let app = TestApp::new();

    let ping = app.send(Method::GET, "/health/ping", None, None).await;
    assert_eq!(ping.status, StatusCode::OK);
    assert_eq!(ping.body, json!("pong"));

    let ready = app.send(Method::GET, "/health/ready", None, None).await;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.body["status"], "healthy");

    let openapi = app.send(Method::GET, "/openapi.json", None, None).await;
    assert_eq!(openapi.status, StatusCode::OK);
    assert!(openapi.body["paths"]["/api/v1/swap-requests"].is_object());
}

#[tokio::test]
async fn test_metrics_count_swap_outcomes() {
    let app = TestApp::new();
    let (alice, bob) = (fixtures::alice(), fixtures::bob());
    let a = create_slot(&app, alice, "A", "SWAPPABLE").await;
    let b = create_slot(&app, bob, "B", "SWAPPABLE").await;
    assert_eq!(
        propose(&app, alice, a.slot_id, b.slot_id).await.status,
        StatusCode::CREATED
    );

    let metrics = app.send(Method::GET, "/metrics", None, None).await;
    assert_eq!(metrics.status, StatusCode::OK);
    let text = metrics.body.as_str().unwrap_or_default().to_string();
    assert!(text.contains("slotswap_swap_operations_total"), "{}", text);
    assert!(text.contains("outcome=\"proposed\""), "{}", text);
    assert!(text.contains("slotswap_http_requests_total"), "{}", text);
}

#[tokio::test]
async fn test_request_metrics_label_route_templates() {
    let app = TestApp::new();
    let missing = uuid::Uuid::now_v7();

    let slot = app
        .get(&format!("/api/v1/slots/{}", missing), fixtures::alice())
        .await;
    assert_eq!(slot.status, StatusCode::NOT_FOUND);
    let stray = app
        .send(Method::GET, &format!("/not-a-route/{}", missing), None, None)
        .await;
    assert_eq!(stray.status, StatusCode::NOT_FOUND);

    let metrics = app.send(Method::GET, "/metrics", None, None).await;
    let text = metrics.body.as_str().unwrap_or_default().to_string();
    assert!(text.contains("path=\"/api/v1/slots/:id\""), "{}", text);
    assert!(text.contains("path=\"unmatched\""), "{}", text);
    assert!(!text.contains(&missing.to_string()), "{}", text);
}

#[tokio::test]
async fn test_public_routes_are_rate_limited_per_ip() {
    let app = TestApp::with_config(slotswap_api::ApiConfig {
        rate_limit_unauthenticated: 1,
        rate_limit_burst: 1,
        ..Default::default()
    });

    assert_eq!(
        app.send(Method::GET, "/health/ping", None, None).await.status,
        StatusCode::OK
    );
    let limited = app.send(Method::GET, "/health/ping", None, None).await;
    assert_error(&limited, StatusCode::TOO_MANY_REQUESTS, ErrorCode::TooManyRequests);
}
