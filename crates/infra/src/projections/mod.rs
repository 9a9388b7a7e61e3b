//! Read models built from published ledger envelopes.

pub mod holder_balances;

pub use holder_balances::{HolderBalancesProjection, HolderBook, HolderProjectionError};
