//! Slotswap Storage
//!
//! The durable record store capability consumed by the swap engine: an
//! async trait over slots and proposals whose only write path is an atomic,
//! conditional [`SwapChangeset`], plus an in-memory implementation.

mod changeset;
mod memory;
mod store;

pub use changeset::{ProposalChange, SlotChange, SlotExpectation, SwapChangeset};
pub use memory::InMemoryStore;
pub use store::SwapStore;
