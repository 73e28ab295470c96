//! Identity types for slot swap entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Entity type discriminator used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EntityType {
    User,
    Slot,
    SwapProposal,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::User => "User",
            EntityType::Slot => "Slot",
            EntityType::SwapProposal => "SwapProposal",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common behaviour for typed entity identifiers.
///
/// Every identifier wraps a UUID. Generated identifiers are UUIDv7 so they
/// sort by creation time.
pub trait EntityIdType: Copy + Eq + fmt::Display + Send + Sync + 'static {
    const ENTITY_TYPE: EntityType;

    fn new(uuid: Uuid) -> Self;

    fn as_uuid(&self) -> Uuid;

    /// Generate a fresh timestamp-sortable identifier.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    fn entity_type(&self) -> EntityType {
        Self::ENTITY_TYPE
    }
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident, $entity:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_TYPE: EntityType = EntityType::$entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_entity_id!(
    /// Identifier of a user (slot owner, requester or responder).
    UserId,
    User
);

define_entity_id!(
    /// Identifier of a bookable time slot.
    SlotId,
    Slot
);

define_entity_id!(
    /// Identifier of a swap proposal.
    ProposalId,
    SwapProposal
);
