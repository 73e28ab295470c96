//! Slotswap Core - Entity Types
//!
//! Slots, swap proposals, their status vocabularies and the invariants that
//! can be checked without touching storage. All other crates depend on this.

pub mod error;
pub mod identity;
pub mod proposal;
pub mod slot;

pub use error::{
    ErrorKind, SlotSwapError, SlotSwapResult, StorageError, SwapError, ValidationError,
};
pub use identity::{EntityIdType, EntityType, ProposalId, SlotId, Timestamp, UserId};
pub use proposal::{
    Accepted, LoadedProposal, Pending, ProposalData, ProposalState, ProposalStateError, Rejected,
    StoredProposal, SwapProposal, SwapStatus, SwapStatusParseError,
};
pub use slot::{
    ensure_owner_may_mutate, NewSlot, Slot, SlotAction, SlotPatch, SlotStatus,
    SlotStatusParseError,
};
