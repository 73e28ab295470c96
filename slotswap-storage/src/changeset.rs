//! Atomic, conditional write sets.
//!
//! Every write to the record store is expressed as a [`SwapChangeset`]. Each
//! slot update or delete names the status and owner it expects to find, and
//! each proposal resolution names the status it expects. A store applies
//! the whole changeset or none of it.

use slotswap_core::{
    ProposalId, Slot, SlotId, SlotStatus, StoredProposal, SwapStatus, Timestamp, UserId,
};

/// The state a slot must be in for a conditional write to apply.
///
/// `revision` pins the slot's `updated_at` as well, so any other write in
/// between fails the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotExpectation {
    pub status: SlotStatus,
    pub owner_id: UserId,
    pub revision: Option<Timestamp>,
}

impl SlotExpectation {
    pub fn new(status: SlotStatus, owner_id: UserId) -> Self {
        Self {
            status,
            owner_id,
            revision: None,
        }
    }

    /// Expect the slot to still look exactly like `slot` does.
    pub fn of(slot: &Slot) -> Self {
        Self {
            revision: Some(slot.updated_at),
            ..Self::new(slot.status, slot.owner_id)
        }
    }

    pub fn matches(&self, slot: &Slot) -> bool {
        slot.status == self.status
            && slot.owner_id == self.owner_id
            && self.revision.map_or(true, |at| slot.updated_at == at)
    }

    /// Why `slot` fails this expectation, for error messages.
    pub fn describe_mismatch(&self, slot: &Slot) -> String {
        if slot.status != self.status || slot.owner_id != self.owner_id {
            format!(
                "expected {} owned by {}, found {} owned by {}",
                self.status, self.owner_id, slot.status, slot.owner_id
            )
        } else {
            "slot was modified concurrently".to_string()
        }
    }
}

/// A single slot write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotChange {
    Insert(Slot),
    /// Replace the stored row with `next` if it matches `expected`.
    Update {
        expected: SlotExpectation,
        next: Slot,
    },
    Delete {
        slot_id: SlotId,
        expected: SlotExpectation,
    },
}

impl SlotChange {
    pub fn slot_id(&self) -> SlotId {
        match self {
            SlotChange::Insert(slot) => slot.slot_id,
            SlotChange::Update { next, .. } => next.slot_id,
            SlotChange::Delete { slot_id, .. } => *slot_id,
        }
    }
}

/// A single proposal write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalChange {
    Insert(StoredProposal),
    /// Move the proposal from `expected` to `next`.
    Resolve {
        proposal_id: ProposalId,
        expected: SwapStatus,
        next: SwapStatus,
        at: Timestamp,
    },
}

/// An all-or-nothing group of writes.
///
/// Slot changes are applied before proposal changes, each group in the
/// order it was added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapChangeset {
    slot_changes: Vec<SlotChange>,
    proposal_changes: Vec<ProposalChange>,
}

impl SwapChangeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_slot(mut self, slot: Slot) -> Self {
        self.slot_changes.push(SlotChange::Insert(slot));
        self
    }

    pub fn update_slot(mut self, expected: SlotExpectation, next: Slot) -> Self {
        self.slot_changes.push(SlotChange::Update { expected, next });
        self
    }

    pub fn delete_slot(mut self, slot_id: SlotId, expected: SlotExpectation) -> Self {
        self.slot_changes.push(SlotChange::Delete { slot_id, expected });
        self
    }

    pub fn insert_proposal(mut self, proposal: StoredProposal) -> Self {
        self.proposal_changes.push(ProposalChange::Insert(proposal));
        self
    }

    /// Resolve a PENDING proposal into `next`.
    pub fn resolve_proposal(
        mut self,
        proposal_id: ProposalId,
        next: SwapStatus,
        at: Timestamp,
    ) -> Self {
        self.proposal_changes.push(ProposalChange::Resolve {
            proposal_id,
            expected: SwapStatus::Pending,
            next,
            at,
        });
        self
    }

    pub fn slot_changes(&self) -> &[SlotChange] {
        &self.slot_changes
    }

    pub fn proposal_changes(&self) -> &[ProposalChange] {
        &self.proposal_changes
    }

    /// Take the slot and proposal writes, in application order.
    pub fn into_changes(self) -> (Vec<SlotChange>, Vec<ProposalChange>) {
        (self.slot_changes, self.proposal_changes)
    }

    pub fn is_empty(&self) -> bool {
        self.slot_changes.is_empty() && self.proposal_changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slot_changes.len() + self.proposal_changes.len()
    }
}
