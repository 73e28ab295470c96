//! Swap proposal typestate.
//!
//! # State Transition Diagram
//!
//! ```text
//! create() → Pending ──┬── accept() ──→ Accepted (terminal)
//!                      └── reject() ──→ Rejected (terminal)
//! ```
//!
//! Only a `SwapProposal<Pending>` can be resolved, and resolving consumes it.

use crate::{EntityIdType, ProposalId, SlotId, SlotSwapError, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

// ============================================================================
// SWAP STATUS ENUM
// ============================================================================

/// Lifecycle status of a swap proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapStatus {
    /// Awaiting the responder's decision
    Pending,
    /// Responder accepted; ownership was exchanged
    Accepted,
    /// Responder declined
    Rejected,
}

impl SwapStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SwapStatus::Pending => "PENDING",
            SwapStatus::Accepted => "ACCEPTED",
            SwapStatus::Rejected => "REJECTED",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, SwapStatusParseError> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SwapStatus::Pending),
            "accepted" => Ok(SwapStatus::Accepted),
            "rejected" => Ok(SwapStatus::Rejected),
            _ => Err(SwapStatusParseError(s.to_string())),
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapStatus::Accepted | SwapStatus::Rejected)
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for SwapStatus {
    type Err = SwapStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid swap status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapStatusParseError(pub String);

impl fmt::Display for SwapStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid swap status: {}", self.0)
    }
}

impl std::error::Error for SwapStatusParseError {}

// ============================================================================
// PROPOSAL DATA (internal storage, state-independent)
// ============================================================================

/// Persisted fields of a proposal, independent of typestate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProposalData {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub proposal_id: ProposalId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub requester_id: UserId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub responder_id: UserId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub requester_slot_id: SlotId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub responder_slot_id: SlotId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

// ============================================================================
// TYPESTATE MARKERS
// ============================================================================

/// Marker trait for proposal states.
pub trait ProposalState: private::Sealed + Send + Sync {
    const STATUS: SwapStatus;
}

/// Proposal awaits the responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending;
impl ProposalState for Pending {
    const STATUS: SwapStatus = SwapStatus::Pending;
}

/// Proposal was accepted (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted;
impl ProposalState for Accepted {
    const STATUS: SwapStatus = SwapStatus::Accepted;
}

/// Proposal was rejected (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected;
impl ProposalState for Rejected {
    const STATUS: SwapStatus = SwapStatus::Rejected;
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Pending {}
    impl Sealed for super::Accepted {}
    impl Sealed for super::Rejected {}
}

// ============================================================================
// PROPOSAL TYPESTATE WRAPPER
// ============================================================================

/// A swap proposal with compile-time state tracking.
#[derive(Debug, Clone)]
pub struct SwapProposal<S: ProposalState> {
    data: ProposalData,
    _state: PhantomData<S>,
}

impl<S: ProposalState> SwapProposal<S> {
    pub fn data(&self) -> &ProposalData {
        &self.data
    }

    pub fn proposal_id(&self) -> ProposalId {
        self.data.proposal_id
    }

    pub fn requester_id(&self) -> UserId {
        self.data.requester_id
    }

    pub fn responder_id(&self) -> UserId {
        self.data.responder_id
    }

    pub fn requester_slot_id(&self) -> SlotId {
        self.data.requester_slot_id
    }

    pub fn responder_slot_id(&self) -> SlotId {
        self.data.responder_slot_id
    }

    pub fn status(&self) -> SwapStatus {
        S::STATUS
    }

    /// Convert to the status-agnostic form for persistence.
    pub fn into_stored(self) -> StoredProposal {
        StoredProposal {
            data: self.data,
            status: S::STATUS,
        }
    }
}

impl SwapProposal<Pending> {
    /// Open a new proposal.
    ///
    /// `responder_id` must be the current owner of `responder_slot_id`; the
    /// engine looks it up rather than trusting the caller.
    pub fn open(
        requester_id: UserId,
        requester_slot_id: SlotId,
        responder_id: UserId,
        responder_slot_id: SlotId,
        now: Timestamp,
    ) -> Self {
        SwapProposal {
            data: ProposalData {
                proposal_id: ProposalId::now_v7(),
                requester_id,
                responder_id,
                requester_slot_id,
                responder_slot_id,
                created_at: now,
                updated_at: now,
            },
            _state: PhantomData,
        }
    }

    /// Accept the proposal.
    pub fn accept(mut self, at: Timestamp) -> SwapProposal<Accepted> {
        self.data.updated_at = at;
        SwapProposal {
            data: self.data,
            _state: PhantomData,
        }
    }

    /// Reject the proposal.
    pub fn reject(mut self, at: Timestamp) -> SwapProposal<Rejected> {
        self.data.updated_at = at;
        SwapProposal {
            data: self.data,
            _state: PhantomData,
        }
    }
}

// ============================================================================
// DATABASE BOUNDARY: STORED PROPOSAL
// ============================================================================

/// A proposal as stored (status known only at runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoredProposal {
    #[serde(flatten)]
    pub data: ProposalData,
    pub status: SwapStatus,
}

/// All possible runtime states of a loaded proposal.
#[derive(Debug, Clone)]
pub enum LoadedProposal {
    Pending(SwapProposal<Pending>),
    Accepted(SwapProposal<Accepted>),
    Rejected(SwapProposal<Rejected>),
}

impl StoredProposal {
    /// Convert to a typed proposal based on the stored status.
    pub fn into_typed(self) -> LoadedProposal {
        match self.status {
            SwapStatus::Pending => LoadedProposal::Pending(SwapProposal {
                data: self.data,
                _state: PhantomData,
            }),
            SwapStatus::Accepted => LoadedProposal::Accepted(SwapProposal {
                data: self.data,
                _state: PhantomData,
            }),
            SwapStatus::Rejected => LoadedProposal::Rejected(SwapProposal {
                data: self.data,
                _state: PhantomData,
            }),
        }
    }

    /// Try to convert to a pending proposal.
    pub fn into_pending(self) -> Result<SwapProposal<Pending>, ProposalStateError> {
        match self.into_typed() {
            LoadedProposal::Pending(p) => Ok(p),
            LoadedProposal::Accepted(p) => Err(ProposalStateError::AlreadyResolved {
                proposal_id: p.proposal_id(),
                actual: SwapStatus::Accepted,
            }),
            LoadedProposal::Rejected(p) => Err(ProposalStateError::AlreadyResolved {
                proposal_id: p.proposal_id(),
                actual: SwapStatus::Rejected,
            }),
        }
    }

    pub fn proposal_id(&self) -> ProposalId {
        self.data.proposal_id
    }

    pub fn is_open(&self) -> bool {
        self.status == SwapStatus::Pending
    }

    /// Whether `slot_id` is either side of this proposal.
    pub fn involves(&self, slot_id: SlotId) -> bool {
        self.data.requester_slot_id == slot_id || self.data.responder_slot_id == slot_id
    }
}

/// Errors when transitioning proposal states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalStateError {
    /// Proposal was already accepted or rejected.
    AlreadyResolved {
        proposal_id: ProposalId,
        actual: SwapStatus,
    },
}

impl fmt::Display for ProposalStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalStateError::AlreadyResolved {
                proposal_id,
                actual,
            } => write!(f, "proposal {} is already {}", proposal_id, actual),
        }
    }
}

impl std::error::Error for ProposalStateError {}

impl From<ProposalStateError> for SlotSwapError {
    fn from(err: ProposalStateError) -> Self {
        SlotSwapError::invalid_state(err.to_string())
    }
}
