use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use thiserror::Error;

use tonytoken_core::{Address, Amount, LedgerId};
use tonytoken_events::{EventEnvelope, Projection};
use tonytoken_ledger::{AGGREGATE_TYPE, TokenEvent};

#[derive(Debug, Error)]
pub enum HolderProjectionError {
    #[error("failed to deserialize ledger event at sequence {sequence_number}: {reason}")]
    Deserialize { sequence_number: u64, reason: String },

    #[error("envelope ledger {envelope} does not match event ledger {event}")]
    LedgerMismatch { envelope: LedgerId, event: LedgerId },
}

/// Read model of one ledger: who holds what.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolderBook {
    balances: BTreeMap<Address, Amount>,
    total_supply: Amount,
    last_sequence_number: u64,
}

impl HolderBook {
    pub fn balance(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn last_sequence_number(&self) -> u64 {
        self.last_sequence_number
    }

    /// Non-zero holders, ordered by address.
    pub fn holders(&self) -> Vec<(Address, Amount)> {
        self.balances.iter().map(|(a, b)| (*a, *b)).collect()
    }

    pub fn sum_of_balances(&self) -> u128 {
        self.balances.values().map(|b| b.get()).sum()
    }

    fn record(&mut self, event: &TokenEvent) {
        let TokenEvent::Transfer(t) = event else {
            return;
        };

        if t.is_mint() {
            self.total_supply = self.total_supply.saturating_add(t.amount);
        } else {
            let left = self.balance(&t.from).saturating_sub(t.amount);
            self.set_balance(t.from, left);
        }

        if t.is_burn() {
            self.total_supply = self.total_supply.saturating_sub(t.amount);
        } else {
            let credited = self.balance(&t.to).saturating_add(t.amount);
            self.set_balance(t.to, credited);
        }
    }

    fn set_balance(&mut self, account: Address, amount: Amount) {
        if amount.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, amount);
        }
    }
}

/// Projection: Transfer records → per-ledger holder balances and supply.
///
/// Envelopes at or below a ledger's last seen sequence number are ignored, so
/// redelivery is harmless.
#[derive(Debug, Clone, Default)]
pub struct HolderBalancesProjection {
    books: BTreeMap<LedgerId, HolderBook>,
}

impl HolderBalancesProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn book(&self, ledger_id: LedgerId) -> Option<&HolderBook> {
        self.books.get(&ledger_id)
    }

    pub fn balance(&self, ledger_id: LedgerId, account: &Address) -> Amount {
        self.book(ledger_id)
            .map(|b| b.balance(account))
            .unwrap_or_default()
    }

    pub fn total_supply(&self, ledger_id: LedgerId) -> Amount {
        self.book(ledger_id)
            .map(HolderBook::total_supply)
            .unwrap_or_default()
    }

    pub fn holders(&self, ledger_id: LedgerId) -> Vec<(Address, Amount)> {
        self.book(ledger_id).map(HolderBook::holders).unwrap_or_default()
    }

    /// Apply a published envelope carrying a JSON payload.
    ///
    /// Envelopes of other aggregate types are skipped.
    pub fn apply_json(
        &mut self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), HolderProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if self.already_seen(envelope.ledger_id(), envelope.sequence_number()) {
            return Ok(());
        }

        let event: TokenEvent = serde_json::from_value(envelope.payload().clone()).map_err(|e| {
            HolderProjectionError::Deserialize {
                sequence_number: envelope.sequence_number(),
                reason: e.to_string(),
            }
        })?;
        if event.ledger_id() != envelope.ledger_id() {
            return Err(HolderProjectionError::LedgerMismatch {
                envelope: envelope.ledger_id(),
                event: event.ledger_id(),
            });
        }

        self.apply(&envelope.clone().map_payload(|_| event));
        Ok(())
    }

    /// Drop everything and replay `envelopes` in stream order.
    pub fn rebuild_from_scratch(
        &mut self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), HolderProjectionError> {
        self.books.clear();

        let mut envelopes: Vec<_> = envelopes.into_iter().collect();
        envelopes.sort_by_key(|e| (e.ledger_id(), e.sequence_number()));
        for envelope in &envelopes {
            self.apply_json(envelope)?;
        }
        Ok(())
    }

    fn already_seen(&self, ledger_id: LedgerId, sequence_number: u64) -> bool {
        self.book(ledger_id)
            .is_some_and(|b| sequence_number <= b.last_sequence_number)
    }
}

impl Projection for HolderBalancesProjection {
    type Payload = TokenEvent;

    fn apply(&mut self, envelope: &EventEnvelope<TokenEvent>) {
        let seq = envelope.sequence_number();
        if seq == 0 || self.already_seen(envelope.ledger_id(), seq) {
            return;
        }

        let book = self.books.entry(envelope.ledger_id()).or_default();
        book.record(envelope.payload());
        book.last_sequence_number = seq;
    }
}
