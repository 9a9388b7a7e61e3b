//! Named ledger operations over a [`CommandDispatcher`].
//!
//! Each mutating call builds the matching `LedgerCommand` with the current
//! time, dispatches it, and returns the `TokenEvent`s it emitted. Queries
//! rehydrate the ledger from its stream.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use tonytoken_core::{Address, Amount, DomainError, LedgerId};
use tonytoken_events::{EventBus, EventEnvelope, InMemoryEventBus};
use tonytoken_ledger::{
    AGGREGATE_TYPE, Approve, Burn, CreateLedger, Ledger, LedgerCommand, Mint, TokenEvent,
    TokenMetadata, Transfer, TransferFrom,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent};

/// A ledger event together with its position in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub sequence_number: u64,
    pub event: TokenEvent,
}

pub type SharedBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

#[derive(Debug)]
pub struct TokenService<S, B> {
    dispatcher: CommandDispatcher<S, B>,
}

impl TokenService<InMemoryEventStore, SharedBus> {
    /// Fully in-memory service (tests, dev).
    pub fn in_memory() -> Self {
        Self::new(InMemoryEventStore::new(), Arc::new(InMemoryEventBus::new()))
    }
}

impl<S, B> TokenService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
        }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    pub fn bus(&self) -> &B {
        self.dispatcher.bus()
    }

    /// Create a new ledger under a fresh id, owned by `owner`.
    pub fn deploy(
        &self,
        owner: Address,
        metadata: TokenMetadata,
        initial_supply: Amount,
    ) -> Result<(LedgerId, Vec<TokenEvent>), DispatchError> {
        let ledger_id = LedgerId::new();
        let events = self.create(ledger_id, owner, metadata, initial_supply)?;
        Ok((ledger_id, events))
    }

    pub fn create(
        &self,
        ledger_id: LedgerId,
        owner: Address,
        metadata: TokenMetadata,
        initial_supply: Amount,
    ) -> Result<Vec<TokenEvent>, DispatchError> {
        self.run(LedgerCommand::CreateLedger(CreateLedger {
            ledger_id,
            owner,
            metadata,
            initial_supply,
            occurred_at: Utc::now(),
        }))
    }

    pub fn transfer(
        &self,
        ledger_id: LedgerId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<Vec<TokenEvent>, DispatchError> {
        self.run(LedgerCommand::Transfer(Transfer {
            ledger_id,
            from,
            to,
            amount,
            occurred_at: Utc::now(),
        }))
    }

    pub fn approve(
        &self,
        ledger_id: LedgerId,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<Vec<TokenEvent>, DispatchError> {
        self.run(LedgerCommand::Approve(Approve {
            ledger_id,
            owner,
            spender,
            amount,
            occurred_at: Utc::now(),
        }))
    }

    pub fn transfer_from(
        &self,
        ledger_id: LedgerId,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<Vec<TokenEvent>, DispatchError> {
        self.run(LedgerCommand::TransferFrom(TransferFrom {
            ledger_id,
            spender,
            from,
            to,
            amount,
            occurred_at: Utc::now(),
        }))
    }

    pub fn mint(
        &self,
        ledger_id: LedgerId,
        caller: Address,
        to: Address,
        amount: Amount,
    ) -> Result<Vec<TokenEvent>, DispatchError> {
        self.run(LedgerCommand::Mint(Mint {
            ledger_id,
            caller,
            to,
            amount,
            occurred_at: Utc::now(),
        }))
    }

    pub fn burn(
        &self,
        ledger_id: LedgerId,
        caller: Address,
        from: Address,
        amount: Amount,
    ) -> Result<Vec<TokenEvent>, DispatchError> {
        self.run(LedgerCommand::Burn(Burn {
            ledger_id,
            caller,
            from,
            amount,
            occurred_at: Utc::now(),
        }))
    }

    /// Current ledger state. `NotFound` if it was never created.
    pub fn ledger(&self, ledger_id: LedgerId) -> Result<Ledger, DispatchError> {
        let ledger = self.dispatcher.load(ledger_id, Ledger::empty)?;
        if !ledger.is_created() {
            return Err(DispatchError::Domain(DomainError::not_found()));
        }
        Ok(ledger)
    }

    pub fn balance_of(&self, ledger_id: LedgerId, account: &Address) -> Result<Amount, DispatchError> {
        Ok(self.ledger(ledger_id)?.balance_of(account))
    }

    pub fn allowance(
        &self,
        ledger_id: LedgerId,
        owner: &Address,
        spender: &Address,
    ) -> Result<Amount, DispatchError> {
        Ok(self.ledger(ledger_id)?.allowance(owner, spender))
    }

    pub fn total_supply(&self, ledger_id: LedgerId) -> Result<Amount, DispatchError> {
        Ok(self.ledger(ledger_id)?.total_supply())
    }

    pub fn decimals(&self, ledger_id: LedgerId) -> Result<u8, DispatchError> {
        Ok(self.ledger(ledger_id)?.decimals())
    }

    /// The full audit trail of a ledger, in stream order.
    pub fn history(&self, ledger_id: LedgerId) -> Result<Vec<RecordedEvent>, DispatchError> {
        let stream = self.dispatcher.store().load_stream(ledger_id)?;
        stream
            .into_iter()
            .map(|stored| {
                let sequence_number = stored.sequence_number;
                decode(stored).map(|event| RecordedEvent {
                    sequence_number,
                    event,
                })
            })
            .collect()
    }

    fn run(&self, command: LedgerCommand) -> Result<Vec<TokenEvent>, DispatchError> {
        let ledger_id = command.ledger_id();
        let operation = command.name();
        tracing::debug!(ledger_id = %ledger_id, operation, "dispatching ledger command");

        let committed = self
            .dispatcher
            .dispatch(ledger_id, AGGREGATE_TYPE, command, Ledger::empty)?;
        committed.into_iter().map(decode).collect()
    }
}

fn decode(stored: StoredEvent) -> Result<TokenEvent, DispatchError> {
    serde_json::from_value(stored.payload)
        .map_err(|e| DispatchError::Deserialize(format!("sequence {}: {e}", stored.sequence_number)))
}
