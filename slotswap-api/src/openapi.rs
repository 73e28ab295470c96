//! OpenAPI Specification for the Slotswap API
//!
//! Generated by utoipa from the route annotations and schema derives, and
//! served at `/openapi.json`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::types::*;

use crate::routes::{health, slot, swap};
use crate::telemetry::metrics;

use slotswap_core::{ProposalData, Slot, SlotStatus, StoredProposal, SwapStatus};

/// OpenAPI document for the Slotswap API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Slotswap API",
        version = "0.1.0",
        description = "Peer-to-peer calendar slot swapping: publish slots, propose one-to-one swaps, accept or reject them",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    tags(
        (name = "Slots", description = "Owner management of calendar slots"),
        (name = "Swaps", description = "Swap marketplace and negotiation"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Slot Routes ===
        slot::create_slot,
        slot::list_my_slots,
        slot::get_slot,
        slot::update_slot,
        slot::replace_slot,
        slot::delete_slot,

        // === Swap Routes ===
        swap::list_swappable,
        swap::create_swap_request,
        swap::respond_to_swap_request,
        swap::list_incoming,
        swap::list_outgoing,

        // === Public Routes ===
        health::ping,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,

            CreateSlotRequest, UpdateSlotRequest, ReplaceSlotRequest, SlotListResponse,
            CreateSwapRequest, RespondSwapRequest, SwapRequestResponse,
            SwapRequestListResponse, SwapProposalResponse,

            HealthResponse, HealthStatus, HealthDetails, ComponentHealth,

            // === Core Domain Types ===
            Slot, SlotStatus, StoredProposal, ProposalData, SwapStatus
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme modifier for OpenAPI document.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
