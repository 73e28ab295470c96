//! Async record store trait.

use crate::SwapChangeset;
use async_trait::async_trait;
use slotswap_core::{
    ProposalId, Slot, SlotId, SlotStatus, SlotSwapResult, StoredProposal, SwapStatus, UserId,
};

/// Durable record store for slots and swap proposals.
///
/// Reads are plain lookups. All writes go through [`SwapStore::commit`],
/// which must apply a changeset atomically and check every expectation in
/// it against current state under the same lock or transaction. That
/// commit is the serialization point for concurrent swap operations.
#[async_trait]
pub trait SwapStore: Send + Sync {
    // ========================================================================
    // SLOT READS
    // ========================================================================

    async fn slot_get(&self, id: SlotId) -> SlotSwapResult<Option<Slot>>;

    async fn slot_list_by_owner(&self, owner_id: UserId) -> SlotSwapResult<Vec<Slot>>;

    async fn slot_list_by_status(&self, status: SlotStatus) -> SlotSwapResult<Vec<Slot>>;

    // ========================================================================
    // PROPOSAL READS
    // ========================================================================

    async fn proposal_get(&self, id: ProposalId) -> SlotSwapResult<Option<StoredProposal>>;

    /// Proposals the user sent.
    async fn proposal_list_by_requester(
        &self,
        requester_id: UserId,
    ) -> SlotSwapResult<Vec<StoredProposal>>;

    /// Proposals addressed to the user.
    async fn proposal_list_by_responder(
        &self,
        responder_id: UserId,
    ) -> SlotSwapResult<Vec<StoredProposal>>;

    async fn proposal_list_by_status(
        &self,
        status: SwapStatus,
    ) -> SlotSwapResult<Vec<StoredProposal>>;

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Apply every change or none.
    ///
    /// Fails with `StorageError::PreconditionFailed` when an expectation
    /// does not hold, `StorageError::NotFound` when a targeted record is
    /// gone, and leaves state untouched in both cases.
    async fn commit(&self, changeset: SwapChangeset) -> SlotSwapResult<()>;

    /// Check that the store is reachable.
    async fn health_check(&self) -> SlotSwapResult<()> {
        Ok(())
    }
}
