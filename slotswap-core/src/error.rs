//! Error types for slot swap operations

use crate::EntityType;
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Insert failed for {entity_type}: {reason}")]
    InsertFailed {
        entity_type: EntityType,
        reason: String,
    },

    /// A conditional write observed a state other than the one it expected.
    #[error("Precondition failed for {entity_type} with id {id}: {reason}")]
    PreconditionFailed {
        entity_type: EntityType,
        id: Uuid,
        reason: String,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage backend error: {reason}")]
    Backend { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors for caller-supplied input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Swap negotiation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwapError {
    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },
}

/// Master error type for all slot swap errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlotSwapError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Swap(#[from] SwapError),
}

/// Caller-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidState,
    InvalidInput,
    StoreFailure,
}

impl SlotSwapError {
    pub fn not_found(entity_type: EntityType, id: impl Into<Uuid>) -> Self {
        SwapError::NotFound {
            entity_type,
            id: id.into(),
        }
        .into()
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        SwapError::Forbidden {
            reason: reason.into(),
        }
        .into()
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        SwapError::InvalidState {
            reason: reason.into(),
        }
        .into()
    }

    /// Classify the error into the outcome a caller should see.
    ///
    /// A lost conditional write means the record moved on underneath the
    /// caller, which is an invalid state rather than a store outage.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SlotSwapError::Swap(SwapError::NotFound { .. }) => ErrorKind::NotFound,
            SlotSwapError::Swap(SwapError::Forbidden { .. }) => ErrorKind::Forbidden,
            SlotSwapError::Swap(SwapError::InvalidState { .. }) => ErrorKind::InvalidState,
            SlotSwapError::Validation(_) => ErrorKind::InvalidInput,
            SlotSwapError::Storage(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            SlotSwapError::Storage(StorageError::PreconditionFailed { .. }) => {
                ErrorKind::InvalidState
            }
            SlotSwapError::Storage(_) => ErrorKind::StoreFailure,
        }
    }
}

/// Result type for all slot swap operations.
pub type SlotSwapResult<T> = Result<T, SlotSwapError>;
