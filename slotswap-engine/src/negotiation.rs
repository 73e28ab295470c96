//! ProposeSwap and RespondToSwap.

use crate::{trace_failure, SwapEngine};
use chrono::Utc;
use slotswap_core::{
    EntityType, ProposalId, Slot, SlotId, SlotStatus, SlotSwapError, SlotSwapResult,
    StoredProposal, SwapProposal, SwapStatus, Timestamp, UserId,
};
use slotswap_storage::{SlotExpectation, SwapChangeset, SwapStore};

impl<S: SwapStore + ?Sized> SwapEngine<S> {
    /// Propose exchanging `requester_slot_id` for `responder_slot_id`.
    ///
    /// The responder is whoever owns the responder slot right now. On
    /// success both slots are SWAP_PENDING and a PENDING proposal exists,
    /// all written in one commit.
    #[tracing::instrument(
        name = "propose_swap",
        skip_all,
        fields(
            requester = %requester_id,
            requester_slot = %requester_slot_id,
            responder_slot = %responder_slot_id
        )
    )]
    pub async fn propose_swap(
        &self,
        requester_id: UserId,
        requester_slot_id: SlotId,
        responder_slot_id: SlotId,
    ) -> SlotSwapResult<StoredProposal> {
        self.propose_swap_inner(requester_id, requester_slot_id, responder_slot_id)
            .await
            .inspect_err(|e| trace_failure("propose_swap", e))
    }

    async fn propose_swap_inner(
        &self,
        requester_id: UserId,
        requester_slot_id: SlotId,
        responder_slot_id: SlotId,
    ) -> SlotSwapResult<StoredProposal> {
        let requester_slot = self.require_slot(requester_slot_id).await?;
        let responder_slot = self.require_slot(responder_slot_id).await?;

        if !requester_slot.is_owned_by(requester_id) {
            return Err(SlotSwapError::forbidden(format!(
                "slot {} is not owned by the requester",
                requester_slot_id
            )));
        }
        if requester_slot_id == responder_slot_id {
            return Err(SlotSwapError::invalid_state(
                "a slot cannot be swapped with itself",
            ));
        }
        if responder_slot.is_owned_by(requester_id) {
            return Err(SlotSwapError::invalid_state(format!(
                "slot {} is already owned by the requester",
                responder_slot_id
            )));
        }
        requester_slot.ensure_swappable()?;
        responder_slot.ensure_swappable()?;

        let now = Utc::now();
        let proposal = SwapProposal::open(
            requester_id,
            requester_slot_id,
            responder_slot.owner_id,
            responder_slot_id,
            now,
        )
        .into_stored();

        let changeset = SwapChangeset::new()
            .update_slot(SlotExpectation::of(&requester_slot), freeze(&requester_slot, now))
            .update_slot(SlotExpectation::of(&responder_slot), freeze(&responder_slot, now))
            .insert_proposal(proposal.clone());
        self.store.commit(changeset).await?;

        tracing::info!(
            proposal_id = %proposal.proposal_id(),
            responder = %proposal.data.responder_id,
            "Swap proposed"
        );
        Ok(proposal)
    }

    /// Accept or reject a pending proposal addressed to `responder_id`.
    ///
    /// Accepting exchanges the owners of the two slots and leaves both BUSY.
    /// Rejecting reopens both slots for trade. A proposal resolves at most
    /// once; later calls fail with `InvalidState`.
    #[tracing::instrument(
        name = "respond_to_swap",
        skip_all,
        fields(responder = %responder_id, proposal_id = %proposal_id, accept = accept)
    )]
    pub async fn respond_to_swap(
        &self,
        responder_id: UserId,
        proposal_id: ProposalId,
        accept: bool,
    ) -> SlotSwapResult<StoredProposal> {
        self.respond_to_swap_inner(responder_id, proposal_id, accept)
            .await
            .inspect_err(|e| trace_failure("respond_to_swap", e))
    }

    async fn respond_to_swap_inner(
        &self,
        responder_id: UserId,
        proposal_id: ProposalId,
        accept: bool,
    ) -> SlotSwapResult<StoredProposal> {
        let stored = self
            .store
            .proposal_get(proposal_id)
            .await?
            .ok_or_else(|| SlotSwapError::not_found(EntityType::SwapProposal, proposal_id))?;

        if stored.data.responder_id != responder_id {
            return Err(SlotSwapError::forbidden(format!(
                "only the designated responder may answer proposal {}",
                proposal_id
            )));
        }
        let pending = stored.into_pending()?;

        let requester_slot = self.require_slot(pending.requester_slot_id()).await?;
        let responder_slot = self.require_slot(pending.responder_slot_id()).await?;

        // Both slots must still be frozen under their original owners.
        let requester_id = pending.requester_id();
        let requester_expected = SlotExpectation::new(SlotStatus::SwapPending, requester_id);
        let responder_expected = SlotExpectation::new(SlotStatus::SwapPending, responder_id);

        let now = Utc::now();
        let (requester_next, responder_next, resolved) = if accept {
            (
                transition(&requester_slot, responder_id, SlotStatus::Busy, now),
                transition(&responder_slot, requester_id, SlotStatus::Busy, now),
                pending.accept(now).into_stored(),
            )
        } else {
            (
                transition(&requester_slot, requester_id, SlotStatus::Swappable, now),
                transition(&responder_slot, responder_id, SlotStatus::Swappable, now),
                pending.reject(now).into_stored(),
            )
        };

        let changeset = SwapChangeset::new()
            .update_slot(requester_expected, requester_next)
            .update_slot(responder_expected, responder_next)
            .resolve_proposal(proposal_id, resolved.status, now);
        self.store.commit(changeset).await?;

        match resolved.status {
            SwapStatus::Accepted => tracing::info!("Swap accepted, ownership exchanged"),
            _ => tracing::info!("Swap rejected, slots reopened"),
        }
        Ok(resolved)
    }
}

fn freeze(slot: &Slot, at: Timestamp) -> Slot {
    transition(slot, slot.owner_id, SlotStatus::SwapPending, at)
}

/// The slot as it should look after a negotiation step.
fn transition(slot: &Slot, owner_id: UserId, status: SlotStatus, at: Timestamp) -> Slot {
    Slot {
        owner_id,
        status,
        updated_at: at,
        ..slot.clone()
    }
}
