//! API Request and Response Types

use serde::{Deserialize, Serialize};
use slotswap_core::{
    NewSlot, ProposalId, Slot, SlotId, SlotPatch, SlotStatus, StoredProposal, Timestamp,
};
use slotswap_engine::SwapRequestView;

// ============================================================================
// SLOTS
// ============================================================================

/// Request to create a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct CreateSlotRequest {
    pub title: String,
    #[schema(value_type = String, format = "date-time")]
    pub start_time: Timestamp,
    #[schema(value_type = String, format = "date-time")]
    pub end_time: Timestamp,
    /// BUSY or SWAPPABLE; defaults to BUSY
    #[serde(default)]
    pub status: Option<SlotStatus>,
}

impl From<CreateSlotRequest> for NewSlot {
    fn from(req: CreateSlotRequest) -> Self {
        NewSlot {
            title: req.title,
            start_time: req.start_time,
            end_time: req.end_time,
            status: req.status,
        }
    }
}

/// Partial slot update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct UpdateSlotRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub start_time: Option<Timestamp>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub end_time: Option<Timestamp>,
    #[serde(default)]
    pub status: Option<SlotStatus>,
}

impl From<UpdateSlotRequest> for SlotPatch {
    fn from(req: UpdateSlotRequest) -> Self {
        SlotPatch {
            title: req.title,
            start_time: req.start_time,
            end_time: req.end_time,
            status: req.status,
        }
    }
}

/// Full replacement of a slot's editable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct ReplaceSlotRequest {
    pub title: String,
    #[schema(value_type = String, format = "date-time")]
    pub start_time: Timestamp,
    #[schema(value_type = String, format = "date-time")]
    pub end_time: Timestamp,
    pub status: SlotStatus,
}

impl From<ReplaceSlotRequest> for SlotPatch {
    fn from(req: ReplaceSlotRequest) -> Self {
        SlotPatch {
            title: Some(req.title),
            start_time: Some(req.start_time),
            end_time: Some(req.end_time),
            status: Some(req.status),
        }
    }
}

/// Response containing a list of slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct SlotListResponse {
    pub slots: Vec<Slot>,
    pub total: usize,
}

impl From<Vec<Slot>> for SlotListResponse {
    fn from(slots: Vec<Slot>) -> Self {
        let total = slots.len();
        Self { slots, total }
    }
}

// ============================================================================
// SWAP REQUESTS
// ============================================================================

/// Request to propose a swap of the caller's slot for someone else's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct CreateSwapRequest {
    /// Slot the caller gives up
    #[schema(value_type = String, format = "uuid")]
    pub my_slot_id: SlotId,
    /// Slot the caller wants
    #[schema(value_type = String, format = "uuid")]
    pub their_slot_id: SlotId,
}

/// Responder's decision on a pending swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct RespondSwapRequest {
    pub accept: bool,
}

/// A swap request with both slots resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct SwapRequestResponse {
    pub proposal: StoredProposal,
    /// Absent when the slot was deleted after resolution
    pub requester_slot: Option<Slot>,
    pub responder_slot: Option<Slot>,
}

impl From<SwapRequestView> for SwapRequestResponse {
    fn from(view: SwapRequestView) -> Self {
        Self {
            proposal: view.proposal,
            requester_slot: view.requester_slot,
            responder_slot: view.responder_slot,
        }
    }
}

/// Response containing a list of swap requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct SwapRequestListResponse {
    pub requests: Vec<SwapRequestResponse>,
    pub total: usize,
}

impl From<Vec<SwapRequestView>> for SwapRequestListResponse {
    fn from(views: Vec<SwapRequestView>) -> Self {
        let requests: Vec<SwapRequestResponse> = views.into_iter().map(Into::into).collect();
        let total = requests.len();
        Self { requests, total }
    }
}

/// Returned after a swap is proposed or resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct SwapProposalResponse {
    #[schema(value_type = String, format = "uuid")]
    pub proposal_id: ProposalId,
    pub proposal: StoredProposal,
}

impl From<StoredProposal> for SwapProposalResponse {
    fn from(proposal: StoredProposal) -> Self {
        Self {
            proposal_id: proposal.data.proposal_id,
            proposal,
        }
    }
}
