//! Slotswap Engine
//!
//! The swap engine is the only writer of slot ownership and of any state
//! that spans slots and proposals. Each operation reads current state,
//! validates it, and submits one conditional changeset to the store; the
//! store's atomic commit decides races between concurrent callers.
//!
//! - [`SwapEngine::propose_swap`] / [`SwapEngine::respond_to_swap`]
//! - [`SwapEngine::list_swappable`] and the request queries
//! - owner slot CRUD, routed through the lifecycle guard

mod negotiation;
mod query;
mod slots;

pub use query::{select_swappable, SwapRequestView};

use slotswap_core::{EntityType, ErrorKind, Slot, SlotId, SlotSwapError, SlotSwapResult};
use slotswap_storage::SwapStore;
use std::sync::Arc;

/// Entry point for all slot and swap operations.
pub struct SwapEngine<S: SwapStore + ?Sized> {
    store: Arc<S>,
}

impl<S: SwapStore + ?Sized> Clone for SwapEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SwapStore> SwapEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

impl<S: SwapStore + ?Sized> SwapEngine<S> {
    /// Build an engine over a store that is already shared.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn require_slot(&self, slot_id: SlotId) -> SlotSwapResult<Slot> {
        self.store
            .slot_get(slot_id)
            .await?
            .ok_or_else(|| SlotSwapError::not_found(EntityType::Slot, slot_id))
    }
}

/// Log a failed operation at a level that matches its cause.
fn trace_failure(operation: &'static str, err: &SlotSwapError) {
    match err.kind() {
        ErrorKind::StoreFailure => {
            tracing::error!(operation, error = %err, "Store failure");
        }
        kind => {
            tracing::debug!(operation, ?kind, error = %err, "Operation rejected");
        }
    }
}
