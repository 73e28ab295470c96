//! Owner slot CRUD.
//!
//! Direct edits share the store's conditional commit with negotiation, so
//! an update that raced a proposal fails instead of overwriting the freeze.

use crate::{trace_failure, SwapEngine};
use chrono::Utc;
use slotswap_core::{
    ensure_owner_may_mutate, NewSlot, Slot, SlotAction, SlotId, SlotPatch, SlotSwapError,
    SlotSwapResult, UserId,
};
use slotswap_storage::{SlotExpectation, SwapChangeset, SwapStore};

impl<S: SwapStore + ?Sized> SwapEngine<S> {
    #[tracing::instrument(name = "create_slot", skip_all, fields(owner = %owner))]
    pub async fn create_slot(&self, owner: UserId, input: NewSlot) -> SlotSwapResult<Slot> {
        self.create_slot_inner(owner, input)
            .await
            .inspect_err(|e| trace_failure("create_slot", e))
    }

    async fn create_slot_inner(&self, owner: UserId, input: NewSlot) -> SlotSwapResult<Slot> {
        let slot = Slot::create(owner, input, Utc::now())?;
        self.store
            .commit(SwapChangeset::new().insert_slot(slot.clone()))
            .await?;
        tracing::debug!(slot_id = %slot.slot_id, status = %slot.status, "Slot created");
        Ok(slot)
    }

    /// The owner's slots, earliest first.
    #[tracing::instrument(name = "list_my_slots", skip_all, fields(owner = %owner))]
    pub async fn list_my_slots(&self, owner: UserId) -> SlotSwapResult<Vec<Slot>> {
        let mut slots = self
            .store
            .slot_list_by_owner(owner)
            .await
            .inspect_err(|e| trace_failure("list_my_slots", e))?;
        slots.sort_by_key(|s| (s.start_time, s.slot_id));
        Ok(slots)
    }

    /// A single slot, visible to its owner only.
    #[tracing::instrument(name = "get_slot", skip_all, fields(caller = %caller, slot_id = %slot_id))]
    pub async fn get_slot(&self, caller: UserId, slot_id: SlotId) -> SlotSwapResult<Slot> {
        self.get_slot_inner(caller, slot_id)
            .await
            .inspect_err(|e| trace_failure("get_slot", e))
    }

    async fn get_slot_inner(&self, caller: UserId, slot_id: SlotId) -> SlotSwapResult<Slot> {
        let slot = self.require_slot(slot_id).await?;
        if !slot.is_owned_by(caller) {
            return Err(SlotSwapError::forbidden(format!(
                "slot {} belongs to another user",
                slot_id
            )));
        }
        Ok(slot)
    }

    /// Apply `patch` to a slot the caller owns.
    ///
    /// Frozen slots are refused. An empty patch returns the slot unchanged
    /// without writing.
    #[tracing::instrument(name = "update_slot", skip_all, fields(owner = %owner, slot_id = %slot_id))]
    pub async fn update_slot(
        &self,
        owner: UserId,
        slot_id: SlotId,
        patch: SlotPatch,
    ) -> SlotSwapResult<Slot> {
        self.update_slot_inner(owner, slot_id, patch)
            .await
            .inspect_err(|e| trace_failure("update_slot", e))
    }

    async fn update_slot_inner(
        &self,
        owner: UserId,
        slot_id: SlotId,
        patch: SlotPatch,
    ) -> SlotSwapResult<Slot> {
        let current = self.require_slot(slot_id).await?;
        ensure_owner_may_mutate(&current, owner, SlotAction::Update)?;
        if patch.is_empty() {
            return Ok(current);
        }

        let next = current.patched(&patch, Utc::now())?;
        self.store
            .commit(SwapChangeset::new().update_slot(SlotExpectation::of(&current), next.clone()))
            .await?;
        tracing::debug!(status = %next.status, "Slot updated");
        Ok(next)
    }

    #[tracing::instrument(name = "delete_slot", skip_all, fields(owner = %owner, slot_id = %slot_id))]
    pub async fn delete_slot(&self, owner: UserId, slot_id: SlotId) -> SlotSwapResult<()> {
        self.delete_slot_inner(owner, slot_id)
            .await
            .inspect_err(|e| trace_failure("delete_slot", e))
    }

    async fn delete_slot_inner(&self, owner: UserId, slot_id: SlotId) -> SlotSwapResult<()> {
        let current = self.require_slot(slot_id).await?;
        ensure_owner_may_mutate(&current, owner, SlotAction::Delete)?;
        self.store
            .commit(SwapChangeset::new().delete_slot(slot_id, SlotExpectation::of(&current)))
            .await?;
        tracing::debug!("Slot deleted");
        Ok(())
    }
}
