//! Token ledger (fungible token accounting, event-sourced).
//!
//! Pure domain logic only: no IO, no CLI, no persistence concerns.

pub mod ledger;
pub mod metadata;

pub use ledger::{
    AGGREGATE_TYPE, Approve, Approved, Burn, CreateLedger, Ledger, LedgerCommand, LedgerCreated,
    Mint, TokenEvent, Transfer, TransferFrom, Transferred,
};
pub use metadata::TokenMetadata;
