//! Domain error model.

use thiserror::Error;

use crate::address::Address;
use crate::amount::Amount;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a deterministic precondition failure: the operation is
/// rejected as a whole and no state changes. Infrastructure concerns belong
/// elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The debited account holds less than the requested amount.
    #[error("insufficient balance: {account} holds {available}, requested {requested}")]
    InsufficientBalance {
        account: Address,
        available: Amount,
        requested: Amount,
    },

    /// The spender's allowance over the owner's balance is too small.
    #[error(
        "insufficient allowance: {spender} may spend {available} of {owner}'s tokens, requested {requested}"
    )]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        available: Amount,
        requested: Amount,
    },

    /// The caller is not the privileged identity required by the operation.
    #[error("unauthorized: {caller} is not the ledger owner")]
    Unauthorized { caller: Address },

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant would be violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The ledger does not exist (not yet created).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version, ledger already created).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn unauthorized(caller: Address) -> Self {
        Self::Unauthorized { caller }
    }
}
