//! Slotswap Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Proptest generators for slots, windows and user populations
//! - Fixtures for the common two-user scenario
//! - Assertions over a whole store snapshot

pub use slotswap_storage::InMemoryStore;

pub use slotswap_core::{
    EntityIdType, ErrorKind, NewSlot, ProposalId, Slot, SlotId, SlotStatus, SlotSwapError,
    SlotSwapResult, StoredProposal, SwapStatus, Timestamp, UserId,
};

use slotswap_storage::{SwapChangeset, SwapStore};
use std::collections::HashMap;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for slot swap entities.

    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;

    /// Generate any slot status.
    pub fn arb_slot_status() -> impl Strategy<Value = SlotStatus> {
        prop_oneof![
            Just(SlotStatus::Busy),
            Just(SlotStatus::Swappable),
            Just(SlotStatus::SwapPending),
        ]
    }

    /// Generate a status an owner may set directly.
    pub fn arb_owner_status() -> impl Strategy<Value = SlotStatus> {
        prop_oneof![Just(SlotStatus::Busy), Just(SlotStatus::Swappable)]
    }

    /// Generate a valid `(start, end)` window with `end > start`.
    pub fn arb_time_window() -> impl Strategy<Value = (Timestamp, Timestamp)> {
        // 2024-01-01 .. 2030-01-01, 15 minutes to 12 hours long
        (1_704_067_200i64..1_893_456_000i64, 15i64..=720).prop_map(|(secs, minutes)| {
            let start = DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now);
            (start, start + Duration::minutes(minutes))
        })
    }

    /// Generate valid slot creation input.
    pub fn arb_new_slot() -> impl Strategy<Value = NewSlot> {
        (
            "[A-Za-z][A-Za-z0-9 ]{0,40}",
            arb_time_window(),
            prop::option::of(arb_owner_status()),
        )
            .prop_map(|(title, (start_time, end_time), status)| NewSlot {
                title,
                start_time,
                end_time,
                status,
            })
    }

    /// A set of users and the slots they own, none of them frozen.
    #[derive(Debug, Clone)]
    pub struct Population {
        pub users: Vec<UserId>,
        pub slots: Vec<Slot>,
    }

    /// Generate between two and `max_users` users owning up to `max_slots`
    /// slots in BUSY or SWAPPABLE.
    pub fn arb_population(
        max_users: usize,
        max_slots: usize,
    ) -> impl Strategy<Value = Population> {
        let max_users = max_users.max(2);
        (2..=max_users).prop_flat_map(move |user_count| {
            prop::collection::vec(
                (0..user_count, arb_time_window(), arb_owner_status()),
                1..=max_slots.max(1),
            )
            .prop_map(move |specs| {
                let users: Vec<UserId> = (0..user_count).map(|_| UserId::now_v7()).collect();
                let slots = specs
                    .into_iter()
                    .enumerate()
                    .map(|(i, (owner, (start_time, end_time), status))| Slot {
                        slot_id: SlotId::now_v7(),
                        owner_id: users[owner],
                        title: format!("slot-{}", i),
                        start_time,
                        end_time,
                        status,
                        created_at: start_time,
                        updated_at: start_time,
                    })
                    .collect();
                Population { users, slots }
            })
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    pub fn alice() -> UserId {
        UserId::new(Uuid::from_u128(0xa11ce))
    }

    pub fn bob() -> UserId {
        UserId::new(Uuid::from_u128(0xb0b))
    }

    pub fn carol() -> UserId {
        UserId::new(Uuid::from_u128(0xca201))
    }

    /// A one hour slot starting tomorrow.
    pub fn slot(owner: UserId, status: SlotStatus) -> Slot {
        let now = Utc::now();
        let start = now + Duration::days(1);
        Slot {
            slot_id: SlotId::now_v7(),
            owner_id: owner,
            title: "Shift".to_string(),
            start_time: start,
            end_time: start + Duration::hours(1),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Insert a slot straight into the store, bypassing owner validation so
    /// any status can be seeded.
    pub async fn seed_slot<S: SwapStore + ?Sized>(
        store: &S,
        owner: UserId,
        status: SlotStatus,
    ) -> SlotSwapResult<Slot> {
        let slot = slot(owner, status);
        store
            .commit(SwapChangeset::new().insert_slot(slot.clone()))
            .await?;
        Ok(slot)
    }

    /// Insert every slot in one commit.
    pub async fn seed_slots<S: SwapStore + ?Sized>(store: &S, slots: &[Slot]) -> SlotSwapResult<()> {
        let changeset = slots
            .iter()
            .cloned()
            .fold(SwapChangeset::new(), SwapChangeset::insert_slot);
        store.commit(changeset).await
    }
}

// ============================================================================
// STORE SNAPSHOTS
// ============================================================================

/// Every slot and proposal in a store at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub slots: Vec<Slot>,
    pub proposals: Vec<StoredProposal>,
}

impl Snapshot {
    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.iter().find(|s| s.slot_id == id)
    }

    pub fn pending(&self) -> impl Iterator<Item = &StoredProposal> {
        self.proposals.iter().filter(|p| p.is_open())
    }
}

/// Read the whole store through its status indexes.
pub async fn snapshot<S: SwapStore + ?Sized>(store: &S) -> SlotSwapResult<Snapshot> {
    let mut out = Snapshot::default();
    for status in [SlotStatus::Busy, SlotStatus::Swappable, SlotStatus::SwapPending] {
        out.slots.extend(store.slot_list_by_status(status).await?);
    }
    for status in [SwapStatus::Pending, SwapStatus::Accepted, SwapStatus::Rejected] {
        out.proposals.extend(store.proposal_list_by_status(status).await?);
    }
    out.slots.sort_by_key(|s| s.slot_id);
    out.proposals.sort_by_key(|p| p.proposal_id());
    Ok(out)
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for slot swap state.

    use super::*;

    /// Assert the result failed with the given kind.
    #[track_caller]
    pub fn assert_kind<T: std::fmt::Debug>(result: &SlotSwapResult<T>, kind: ErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), kind, "wrong error kind for {:?}", e),
            Ok(v) => panic!("Expected {:?} error, got Ok({:?})", kind, v),
        }
    }

    /// Assert the cross-record slot invariant:
    ///
    /// - a slot is SWAP_PENDING exactly when one PENDING proposal names it
    /// - no slot is named by two PENDING proposals
    /// - both slots of a PENDING proposal still belong to its two parties
    #[track_caller]
    pub fn assert_slot_invariant(snapshot: &Snapshot) {
        let mut references: HashMap<SlotId, usize> = HashMap::new();
        for proposal in snapshot.pending() {
            let data = &proposal.data;
            assert_ne!(
                data.requester_id, data.responder_id,
                "proposal {} has the same user on both sides",
                data.proposal_id
            );
            for (slot_id, party) in [
                (data.requester_slot_id, data.requester_id),
                (data.responder_slot_id, data.responder_id),
            ] {
                let slot = snapshot.slot(slot_id).unwrap_or_else(|| {
                    panic!(
                        "pending proposal {} names missing slot {}",
                        data.proposal_id, slot_id
                    )
                });
                assert_eq!(
                    slot.status,
                    SlotStatus::SwapPending,
                    "slot {} of pending proposal {} is not frozen",
                    slot_id,
                    data.proposal_id
                );
                assert_eq!(
                    slot.owner_id, party,
                    "slot {} changed hands while proposal {} is pending",
                    slot_id, data.proposal_id
                );
                *references.entry(slot_id).or_default() += 1;
            }
        }

        for (slot_id, count) in &references {
            assert_eq!(*count, 1, "slot {} is in {} pending proposals", slot_id, count);
        }
        for slot in &snapshot.slots {
            if slot.status == SlotStatus::SwapPending {
                assert!(
                    references.contains_key(&slot.slot_id),
                    "slot {} is SWAP_PENDING without a pending proposal",
                    slot.slot_id
                );
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
