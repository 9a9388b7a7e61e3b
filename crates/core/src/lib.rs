//! `tonytoken-core`: ledger foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! account addresses, token amounts, identifiers, aggregate traits and the
//! domain error model.

pub mod address;
pub mod aggregate;
pub mod amount;
pub mod error;
pub mod id;
pub mod value_object;

pub use address::Address;
pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use amount::Amount;
pub use error::{DomainError, DomainResult};
pub use id::LedgerId;
pub use value_object::ValueObject;
