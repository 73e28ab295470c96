//! Read-side queries: swappable slots and swap request inboxes.

use crate::{trace_failure, SwapEngine};
use serde::Serialize;
use slotswap_core::{
    Slot, SlotId, SlotStatus, SlotSwapResult, StoredProposal, SwapStatus, UserId,
};
use slotswap_storage::SwapStore;
use std::collections::HashSet;

/// A proposal together with the two slots it names.
///
/// The slots are looked up at read time; a slot deleted after the proposal
/// was resolved shows up as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapRequestView {
    pub proposal: StoredProposal,
    pub requester_slot: Option<Slot>,
    pub responder_slot: Option<Slot>,
}

/// Pick the slots `caller` may propose a swap against.
///
/// A slot qualifies when someone else owns it, it is SWAPPABLE, and no
/// PENDING proposal references it on either side, whatever its status
/// says. Ordered by start time, then id.
pub fn select_swappable(
    caller: UserId,
    candidates: Vec<Slot>,
    open_proposals: &[StoredProposal],
) -> Vec<Slot> {
    let tied_up: HashSet<SlotId> = open_proposals
        .iter()
        .filter(|p| p.is_open())
        .flat_map(|p| [p.data.requester_slot_id, p.data.responder_slot_id])
        .collect();

    let mut slots: Vec<Slot> = candidates
        .into_iter()
        .filter(|s| {
            !s.is_owned_by(caller)
                && s.status == SlotStatus::Swappable
                && !tied_up.contains(&s.slot_id)
        })
        .collect();
    slots.sort_by_key(|s| (s.start_time, s.slot_id));
    slots
}

impl<S: SwapStore + ?Sized> SwapEngine<S> {
    /// Slots other users have opened for trade.
    ///
    /// Every call re-reads the store, so the listing can be restarted at
    /// any time.
    #[tracing::instrument(name = "list_swappable", skip_all, fields(caller = %caller))]
    pub async fn list_swappable(&self, caller: UserId) -> SlotSwapResult<Vec<Slot>> {
        self.list_swappable_inner(caller)
            .await
            .inspect_err(|e| trace_failure("list_swappable", e))
    }

    async fn list_swappable_inner(&self, caller: UserId) -> SlotSwapResult<Vec<Slot>> {
        let candidates = self.store.slot_list_by_status(SlotStatus::Swappable).await?;
        let open = self.store.proposal_list_by_status(SwapStatus::Pending).await?;
        Ok(select_swappable(caller, candidates, &open))
    }

    /// Proposals addressed to `user`, newest first.
    #[tracing::instrument(name = "list_incoming", skip_all, fields(user = %user))]
    pub async fn list_incoming(&self, user: UserId) -> SlotSwapResult<Vec<SwapRequestView>> {
        let proposals = self.store.proposal_list_by_responder(user).await;
        self.expand(proposals)
            .await
            .inspect_err(|e| trace_failure("list_incoming", e))
    }

    /// Proposals `user` has sent, newest first.
    #[tracing::instrument(name = "list_outgoing", skip_all, fields(user = %user))]
    pub async fn list_outgoing(&self, user: UserId) -> SlotSwapResult<Vec<SwapRequestView>> {
        let proposals = self.store.proposal_list_by_requester(user).await;
        self.expand(proposals)
            .await
            .inspect_err(|e| trace_failure("list_outgoing", e))
    }

    async fn expand(
        &self,
        proposals: SlotSwapResult<Vec<StoredProposal>>,
    ) -> SlotSwapResult<Vec<SwapRequestView>> {
        let mut proposals = proposals?;
        proposals.sort_by(|a, b| {
            b.data
                .created_at
                .cmp(&a.data.created_at)
                .then_with(|| b.proposal_id().cmp(&a.proposal_id()))
        });

        let mut views = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            let requester_slot = self.store.slot_get(proposal.data.requester_slot_id).await?;
            let responder_slot = self.store.slot_get(proposal.data.responder_slot_id).await?;
            views.push(SwapRequestView {
                proposal,
                requester_slot,
                responder_slot,
            });
        }
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use slotswap_core::{EntityIdType, SwapProposal};

    fn slot_at(owner: UserId, status: SlotStatus, offset_mins: i64) -> Slot {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(offset_mins);
        Slot {
            slot_id: SlotId::now_v7(),
            owner_id: owner,
            title: "slot".to_string(),
            start_time: start,
            end_time: start + Duration::minutes(30),
            status,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_select_excludes_own_busy_and_tied_up_slots() {
        let me = UserId::now_v7();
        let other = UserId::now_v7();
        let mine = slot_at(me, SlotStatus::Swappable, 0);
        let busy = slot_at(other, SlotStatus::Busy, 0);
        let tied = slot_at(other, SlotStatus::Swappable, 10);
        let open = slot_at(other, SlotStatus::Swappable, 20);

        // A stale row: status says SWAPPABLE but an open proposal names it.
        let proposal = SwapProposal::open(
            other,
            tied.slot_id,
            UserId::now_v7(),
            SlotId::now_v7(),
            Utc::now(),
        )
        .into_stored();

        let picked = select_swappable(me, vec![mine, busy, tied, open.clone()], &[proposal]);
        assert_eq!(picked, vec![open]);
    }

    #[test]
    fn test_select_ignores_resolved_proposals() {
        let me = UserId::now_v7();
        let other = UserId::now_v7();
        let reopened = slot_at(other, SlotStatus::Swappable, 0);
        let rejected = SwapProposal::open(other, reopened.slot_id, me, SlotId::now_v7(), Utc::now())
            .reject(Utc::now())
            .into_stored();

        let picked = select_swappable(me, vec![reopened.clone()], &[rejected]);
        assert_eq!(picked, vec![reopened]);
    }

    #[test]
    fn test_select_orders_by_start_time() {
        let me = UserId::now_v7();
        let other = UserId::now_v7();
        let late = slot_at(other, SlotStatus::Swappable, 90);
        let early = slot_at(other, SlotStatus::Swappable, 15);
        let picked = select_swappable(me, vec![late.clone(), early.clone()], &[]);
        assert_eq!(picked, vec![early, late]);
    }
}
