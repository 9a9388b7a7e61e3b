use serde::{Deserialize, Serialize};

use tonytoken_core::amount::MAX_DECIMALS;
use tonytoken_core::{DomainError, DomainResult, ValueObject};

pub const DEFAULT_NAME: &str = "TonyToken";
pub const DEFAULT_SYMBOL: &str = "TT";
pub const DEFAULT_DECIMALS: u8 = 18;

/// Descriptive token metadata, fixed when the ledger is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenMetadata {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("token name must not be empty"));
        }
        if self.symbol.trim().is_empty() {
            return Err(DomainError::validation("token symbol must not be empty"));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(DomainError::validation(format!(
                "decimals must be at most {MAX_DECIMALS}"
            )));
        }
        Ok(())
    }
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self::new(DEFAULT_NAME, DEFAULT_SYMBOL, DEFAULT_DECIMALS)
    }
}

impl ValueObject for TokenMetadata {}
