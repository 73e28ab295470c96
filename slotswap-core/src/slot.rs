//! Slot entity, status vocabulary and the lifecycle guard.
//!
//! A slot is "frozen" while it is the subject of a pending swap: its owner
//! may neither edit nor delete it. Every owner-initiated mutation goes
//! through [`ensure_owner_may_mutate`] so direct edits and the swap engine
//! share one definition of that rule.

use crate::{
    EntityIdType, SlotId, SlotSwapError, SlotSwapResult, Timestamp, UserId, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// SLOT STATUS
// ============================================================================

/// Negotiation availability of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    /// Not open to negotiation
    #[default]
    Busy,
    /// Owner has opened the slot for trade
    Swappable,
    /// Subject of exactly one outstanding proposal
    SwapPending,
}

impl SlotStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SlotStatus::Busy => "BUSY",
            SlotStatus::Swappable => "SWAPPABLE",
            SlotStatus::SwapPending => "SWAP_PENDING",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, SlotStatusParseError> {
        match s.to_lowercase().as_str() {
            "busy" => Ok(SlotStatus::Busy),
            "swappable" => Ok(SlotStatus::Swappable),
            "swap_pending" | "swappending" | "swap-pending" => Ok(SlotStatus::SwapPending),
            _ => Err(SlotStatusParseError(s.to_string())),
        }
    }

    /// Whether an owner may put a slot into this status by a direct edit.
    pub fn is_owner_settable(&self) -> bool {
        !matches!(self, SlotStatus::SwapPending)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for SlotStatus {
    type Err = SlotStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid slot status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStatusParseError(pub String);

impl fmt::Display for SlotStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid slot status: {}", self.0)
    }
}

impl std::error::Error for SlotStatusParseError {}

// ============================================================================
// SLOT ENTITY
// ============================================================================

/// A bookable time interval owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Slot {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub slot_id: SlotId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub owner_id: UserId,
    pub title: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub start_time: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub end_time: Timestamp,
    pub status: SlotStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// Input for creating a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSlot {
    pub title: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// Defaults to BUSY when absent.
    #[serde(default)]
    pub status: Option<SlotStatus>,
}

/// Partial update of a slot's owner-editable fields.
///
/// `None` leaves the field unchanged. Ownership is not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPatch {
    pub title: Option<String>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub status: Option<SlotStatus>,
}

impl SlotPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.status.is_none()
    }
}

impl Slot {
    /// Build a new slot owned by `owner` from validated input.
    pub fn create(owner: UserId, input: NewSlot, now: Timestamp) -> SlotSwapResult<Self> {
        let title = validate_title(&input.title)?;
        validate_window(input.start_time, input.end_time)?;
        let status = input.status.unwrap_or_default();
        validate_owner_status(status)?;

        Ok(Self {
            slot_id: SlotId::now_v7(),
            owner_id: owner,
            title,
            start_time: input.start_time,
            end_time: input.end_time,
            status,
            created_at: now,
            updated_at: now,
        })
    }

    /// Produce the slot that results from applying `patch`.
    ///
    /// Does not consult the lifecycle guard; callers do that first.
    pub fn patched(&self, patch: &SlotPatch, now: Timestamp) -> SlotSwapResult<Self> {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = validate_title(title)?;
        }
        if let Some(start) = patch.start_time {
            next.start_time = start;
        }
        if let Some(end) = patch.end_time {
            next.end_time = end;
        }
        validate_window(next.start_time, next.end_time)?;
        if let Some(status) = patch.status {
            validate_owner_status(status)?;
            next.status = status;
        }
        next.updated_at = now;
        Ok(next)
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == user
    }

    /// Fail with `InvalidState` unless the slot is open for trade.
    pub fn ensure_swappable(&self) -> SlotSwapResult<()> {
        match self.status {
            SlotStatus::Swappable => Ok(()),
            SlotStatus::SwapPending => Err(SlotSwapError::invalid_state(format!(
                "slot {} is already under negotiation",
                self.slot_id
            ))),
            SlotStatus::Busy => Err(SlotSwapError::invalid_state(format!(
                "slot {} is not open for swapping",
                self.slot_id
            ))),
        }
    }
}

// ============================================================================
// LIFECYCLE GUARD
// ============================================================================

/// Owner-initiated slot mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAction {
    Update,
    Delete,
}

impl fmt::Display for SlotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotAction::Update => f.write_str("update"),
            SlotAction::Delete => f.write_str("delete"),
        }
    }
}

/// Check that `caller` may perform `action` on `slot` right now.
///
/// `Forbidden` when the caller does not own the slot, `InvalidState` while
/// the slot is SWAP_PENDING.
pub fn ensure_owner_may_mutate(
    slot: &Slot,
    caller: UserId,
    action: SlotAction,
) -> SlotSwapResult<()> {
    if !slot.is_owned_by(caller) {
        return Err(SlotSwapError::forbidden(format!(
            "only the owner may {} slot {}",
            action, slot.slot_id
        )));
    }
    if slot.status == SlotStatus::SwapPending {
        return Err(SlotSwapError::invalid_state(format!(
            "cannot {} slot {} while a swap is pending",
            action, slot.slot_id
        )));
    }
    Ok(())
}

// ============================================================================
// FIELD VALIDATION
// ============================================================================

fn validate_title(title: &str) -> SlotSwapResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "title".to_string(),
        }
        .into());
    }
    Ok(trimmed.to_string())
}

fn validate_window(start: Timestamp, end: Timestamp) -> SlotSwapResult<()> {
    if end <= start {
        return Err(ValidationError::InvalidValue {
            field: "end_time".to_string(),
            reason: "must be after start_time".to_string(),
        }
        .into());
    }
    Ok(())
}

/// SWAP_PENDING is reserved for the swap engine.
fn validate_owner_status(status: SlotStatus) -> SlotSwapResult<()> {
    if !status.is_owner_settable() {
        return Err(SlotSwapError::invalid_state(
            "SWAP_PENDING can only be set by proposing a swap",
        ));
    }
    Ok(())
}
