//! In-memory record store.

use crate::{ProposalChange, SlotChange, SlotExpectation, SwapChangeset, SwapStore};
use async_trait::async_trait;
use slotswap_core::{
    EntityType, ProposalId, Slot, SlotId, SlotStatus, SlotSwapResult, StorageError,
    StoredProposal, SwapStatus, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Default)]
struct Tables {
    slots: HashMap<SlotId, Slot>,
    proposals: HashMap<ProposalId, StoredProposal>,
}

/// Record store held in process memory.
///
/// One lock guards both tables, so a commit is a single writer over slots
/// and proposals together. A commit checks every write before applying any,
/// then applies them in place.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> SlotSwapResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    fn write(&self) -> SlotSwapResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    /// Remove every record.
    pub fn clear(&self) -> SlotSwapResult<()> {
        let mut tables = self.write()?;
        tables.slots.clear();
        tables.proposals.clear();
        Ok(())
    }

    pub fn slot_count(&self) -> SlotSwapResult<usize> {
        Ok(self.read()?.slots.len())
    }

    pub fn proposal_count(&self) -> SlotSwapResult<usize> {
        Ok(self.read()?.proposals.len())
    }

    fn select_slots(&self, pred: impl Fn(&Slot) -> bool) -> SlotSwapResult<Vec<Slot>> {
        Ok(self
            .read()?
            .slots
            .values()
            .filter(|s| pred(s))
            .cloned()
            .collect())
    }

    fn select_proposals(
        &self,
        pred: impl Fn(&StoredProposal) -> bool,
    ) -> SlotSwapResult<Vec<StoredProposal>> {
        Ok(self
            .read()?
            .proposals
            .values()
            .filter(|p| pred(p))
            .cloned()
            .collect())
    }
}

fn slot_not_found(id: SlotId) -> StorageError {
    StorageError::NotFound {
        entity_type: EntityType::Slot,
        id: id.into(),
    }
}

fn check_slot(expected: &SlotExpectation, current: &Slot) -> Result<(), StorageError> {
    if expected.matches(current) {
        return Ok(());
    }
    Err(StorageError::PreconditionFailed {
        entity_type: EntityType::Slot,
        id: current.slot_id.into(),
        reason: expected.describe_mismatch(current),
    })
}

/// Check every write against the tables as the earlier writes of the same
/// changeset leave them. Only touched rows are tracked.
fn validate(tables: &Tables, changeset: &SwapChangeset) -> Result<(), StorageError> {
    let mut staged_slots: HashMap<SlotId, Option<&Slot>> = HashMap::new();
    for change in changeset.slot_changes() {
        let id = change.slot_id();
        let current = match staged_slots.get(&id) {
            Some(staged) => *staged,
            None => tables.slots.get(&id),
        };
        match change {
            SlotChange::Insert(slot) => {
                if current.is_some() {
                    return Err(StorageError::InsertFailed {
                        entity_type: EntityType::Slot,
                        reason: format!("slot {} already exists", id),
                    });
                }
                staged_slots.insert(id, Some(slot));
            }
            SlotChange::Update { expected, next } => {
                check_slot(expected, current.ok_or_else(|| slot_not_found(id))?)?;
                staged_slots.insert(id, Some(next));
            }
            SlotChange::Delete { expected, .. } => {
                check_slot(expected, current.ok_or_else(|| slot_not_found(id))?)?;
                staged_slots.insert(id, None);
            }
        }
    }

    let mut staged_status: HashMap<ProposalId, SwapStatus> = HashMap::new();
    for change in changeset.proposal_changes() {
        match change {
            ProposalChange::Insert(proposal) => {
                let id = proposal.proposal_id();
                if staged_status.contains_key(&id) || tables.proposals.contains_key(&id) {
                    return Err(StorageError::InsertFailed {
                        entity_type: EntityType::SwapProposal,
                        reason: format!("proposal {} already exists", id),
                    });
                }
                staged_status.insert(id, proposal.status);
            }
            ProposalChange::Resolve {
                proposal_id,
                expected,
                next,
                ..
            } => {
                let current = staged_status
                    .get(proposal_id)
                    .copied()
                    .or_else(|| tables.proposals.get(proposal_id).map(|p| p.status))
                    .ok_or(StorageError::NotFound {
                        entity_type: EntityType::SwapProposal,
                        id: (*proposal_id).into(),
                    })?;
                if current != *expected {
                    return Err(StorageError::PreconditionFailed {
                        entity_type: EntityType::SwapProposal,
                        id: (*proposal_id).into(),
                        reason: format!("expected {}, found {}", expected, current),
                    });
                }
                staged_status.insert(*proposal_id, *next);
            }
        }
    }
    Ok(())
}

/// Apply a changeset that [`validate`] accepted.
fn apply(tables: &mut Tables, changeset: SwapChangeset) {
    let (slot_changes, proposal_changes) = changeset.into_changes();
    for change in slot_changes {
        match change {
            SlotChange::Insert(slot) | SlotChange::Update { next: slot, .. } => {
                tables.slots.insert(slot.slot_id, slot);
            }
            SlotChange::Delete { slot_id, .. } => {
                tables.slots.remove(&slot_id);
            }
        }
    }
    for change in proposal_changes {
        match change {
            ProposalChange::Insert(proposal) => {
                tables.proposals.insert(proposal.proposal_id(), proposal);
            }
            ProposalChange::Resolve {
                proposal_id,
                next,
                at,
                ..
            } => {
                if let Some(current) = tables.proposals.get_mut(&proposal_id) {
                    current.status = next;
                    current.data.updated_at = at;
                }
            }
        }
    }
}

#[async_trait]
impl SwapStore for InMemoryStore {
    async fn slot_get(&self, id: SlotId) -> SlotSwapResult<Option<Slot>> {
        Ok(self.read()?.slots.get(&id).cloned())
    }

    async fn slot_list_by_owner(&self, owner_id: UserId) -> SlotSwapResult<Vec<Slot>> {
        self.select_slots(|s| s.owner_id == owner_id)
    }

    async fn slot_list_by_status(&self, status: SlotStatus) -> SlotSwapResult<Vec<Slot>> {
        self.select_slots(|s| s.status == status)
    }

    async fn proposal_get(&self, id: ProposalId) -> SlotSwapResult<Option<StoredProposal>> {
        Ok(self.read()?.proposals.get(&id).cloned())
    }

    async fn proposal_list_by_requester(
        &self,
        requester_id: UserId,
    ) -> SlotSwapResult<Vec<StoredProposal>> {
        self.select_proposals(|p| p.data.requester_id == requester_id)
    }

    async fn proposal_list_by_responder(
        &self,
        responder_id: UserId,
    ) -> SlotSwapResult<Vec<StoredProposal>> {
        self.select_proposals(|p| p.data.responder_id == responder_id)
    }

    async fn proposal_list_by_status(
        &self,
        status: SwapStatus,
    ) -> SlotSwapResult<Vec<StoredProposal>> {
        self.select_proposals(|p| p.status == status)
    }

    async fn commit(&self, changeset: SwapChangeset) -> SlotSwapResult<()> {
        let mut tables = self.write()?;
        validate(&tables, &changeset)?;

        let changes = changeset.len();
        apply(&mut tables, changeset);
        tracing::trace!(changes, "In-memory changeset committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use slotswap_core::{EntityIdType, ErrorKind, NewSlot, SwapProposal};

    fn swappable_slot(owner: UserId) -> Slot {
        let start = Utc::now();
        Slot::create(
            owner,
            NewSlot {
                title: "Office hours".to_string(),
                start_time: start,
                end_time: start + Duration::minutes(30),
                status: Some(SlotStatus::Swappable),
            },
            start,
        )
        .unwrap()
    }

    async fn seeded() -> (InMemoryStore, Slot, Slot) {
        let store = InMemoryStore::new();
        let a = swappable_slot(UserId::now_v7());
        let b = swappable_slot(UserId::now_v7());
        store
            .commit(SwapChangeset::new().insert_slot(a.clone()).insert_slot(b.clone()))
            .await
            .unwrap();
        (store, a, b)
    }

    fn pending(slot: &Slot) -> Slot {
        let mut next = slot.clone();
        next.status = SlotStatus::SwapPending;
        next
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let (store, a, b) = seeded().await;
        assert_eq!(store.slot_count().unwrap(), 2);
        assert_eq!(store.slot_get(a.slot_id).await.unwrap(), Some(a.clone()));
        let owned = store.slot_list_by_owner(b.owner_id).await.unwrap();
        assert_eq!(owned, vec![b]);
        assert!(store.slot_get(SlotId::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let (store, a, _) = seeded().await;
        let err = store
            .commit(SwapChangeset::new().insert_slot(a))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreFailure);
    }

    #[tokio::test]
    async fn test_conditional_update_applies_when_expectation_holds() {
        let (store, a, _) = seeded().await;
        store
            .commit(SwapChangeset::new().update_slot(SlotExpectation::of(&a), pending(&a)))
            .await
            .unwrap();
        let stored = store.slot_get(a.slot_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SlotStatus::SwapPending);
    }

    #[tokio::test]
    async fn test_failed_expectation_rolls_back_whole_changeset() {
        let (store, a, b) = seeded().await;
        let proposal = SwapProposal::open(a.owner_id, a.slot_id, b.owner_id, b.slot_id, Utc::now())
            .into_stored();
        let stale = SlotExpectation::new(SlotStatus::Busy, b.owner_id);

        let err = store
            .commit(
                SwapChangeset::new()
                    .update_slot(SlotExpectation::of(&a), pending(&a))
                    .update_slot(stale, pending(&b))
                    .insert_proposal(proposal),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(store.slot_get(a.slot_id).await.unwrap(), Some(a));
        assert_eq!(store.slot_get(b.slot_id).await.unwrap(), Some(b));
        assert_eq!(store.proposal_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_late_proposal_failure_leaves_slots_untouched() {
        let (store, a, b) = seeded().await;
        let missing = ProposalId::now_v7();

        let err = store
            .commit(
                SwapChangeset::new()
                    .update_slot(SlotExpectation::of(&a), pending(&a))
                    .update_slot(SlotExpectation::of(&b), pending(&b))
                    .resolve_proposal(missing, SwapStatus::Accepted, Utc::now()),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.slot_get(a.slot_id).await.unwrap(), Some(a));
        assert_eq!(store.slot_get(b.slot_id).await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn test_writes_see_earlier_writes_of_same_changeset() {
        let store = InMemoryStore::new();
        let fresh = swappable_slot(UserId::now_v7());
        let proposal = SwapProposal::open(
            fresh.owner_id,
            fresh.slot_id,
            UserId::now_v7(),
            SlotId::now_v7(),
            Utc::now(),
        )
        .into_stored();
        let id = proposal.proposal_id();

        store
            .commit(
                SwapChangeset::new()
                    .insert_slot(fresh.clone())
                    .update_slot(SlotExpectation::of(&fresh), pending(&fresh))
                    .insert_proposal(proposal)
                    .resolve_proposal(id, SwapStatus::Rejected, Utc::now()),
            )
            .await
            .unwrap();
        let stored = store.slot_get(fresh.slot_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SlotStatus::SwapPending);
        let resolved = store.proposal_get(id).await.unwrap().unwrap();
        assert_eq!(resolved.status, SwapStatus::Rejected);

        // A second update expecting the original state is stale once the first lands.
        let again = swappable_slot(UserId::now_v7());
        let err = store
            .commit(
                SwapChangeset::new()
                    .insert_slot(again.clone())
                    .update_slot(SlotExpectation::of(&again), pending(&again))
                    .update_slot(SlotExpectation::of(&again), pending(&again)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(store.slot_get(again.slot_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_happens_once() {
        let (store, a, b) = seeded().await;
        let proposal = SwapProposal::open(a.owner_id, a.slot_id, b.owner_id, b.slot_id, Utc::now())
            .into_stored();
        let id = proposal.proposal_id();
        store
            .commit(SwapChangeset::new().insert_proposal(proposal))
            .await
            .unwrap();

        let resolve = SwapChangeset::new().resolve_proposal(id, SwapStatus::Rejected, Utc::now());
        store.commit(resolve.clone()).await.unwrap();
        let err = store.commit(resolve).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let stored = store.proposal_get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, SwapStatus::Rejected);
        assert_eq!(
            store
                .proposal_list_by_status(SwapStatus::Pending)
                .await
                .unwrap()
                .len(),
            0
        );
    }

    #[tokio::test]
    async fn test_delete_missing_slot_is_not_found() {
        let store = InMemoryStore::new();
        let ghost = swappable_slot(UserId::now_v7());
        let err = store
            .commit(SwapChangeset::new().delete_slot(ghost.slot_id, SlotExpectation::of(&ghost)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_conditional_updates_have_one_winner() {
        let (store, a, _) = seeded().await;
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let a = a.clone();
            handles.push(tokio::spawn(async move {
                store
                    .commit(SwapChangeset::new().update_slot(SlotExpectation::of(&a), pending(&a)))
                    .await
                    .is_ok()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
