use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tonytoken_core::{Address, Aggregate, AggregateRoot, Amount, DomainError, LedgerId};
use tonytoken_events::Event;

use crate::metadata::TokenMetadata;

/// Aggregate type name used for event streams.
pub const AGGREGATE_TYPE: &str = "token.ledger";

/// Aggregate root: Ledger (fungible token accounting).
///
/// Holds balances, allowances, total supply and the owner identity. State only
/// changes through [`Aggregate::apply`]; decisions happen in
/// [`Aggregate::handle`], which never mutates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    id: LedgerId,
    owner: Address,
    metadata: TokenMetadata,
    total_supply: Amount,
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    version: u64,
    created: bool,
}

impl Ledger {
    /// Empty aggregate for rehydration.
    pub fn empty(id: LedgerId) -> Self {
        Self {
            id,
            owner: Address::ZERO,
            metadata: TokenMetadata::default(),
            total_supply: Amount::ZERO,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LedgerId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or_default()
    }

    /// Accounts with a non-zero balance, ordered by address.
    pub fn holders(&self) -> Vec<(Address, Amount)> {
        let mut holders: Vec<_> = self.balances.iter().map(|(a, b)| (*a, *b)).collect();
        holders.sort_by_key(|(address, _)| *address);
        holders
    }
}

impl AggregateRoot for Ledger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateLedger. `owner` is the deploying caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLedger {
    pub ledger_id: LedgerId,
    pub owner: Address,
    pub metadata: TokenMetadata,
    pub initial_supply: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Transfer. `from` is the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub ledger_id: LedgerId,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve. `owner` is the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub ledger_id: LedgerId,
    pub owner: Address,
    pub spender: Address,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransferFrom. `spender` is the caller, moving `from`'s tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFrom {
    pub ledger_id: LedgerId,
    pub spender: Address,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Mint (owner only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mint {
    pub ledger_id: LedgerId,
    pub caller: Address,
    pub to: Address,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Burn (owner only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Burn {
    pub ledger_id: LedgerId,
    pub caller: Address,
    pub from: Address,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    CreateLedger(CreateLedger),
    Transfer(Transfer),
    Approve(Approve),
    TransferFrom(TransferFrom),
    Mint(Mint),
    Burn(Burn),
}

impl LedgerCommand {
    pub fn ledger_id(&self) -> LedgerId {
        match self {
            LedgerCommand::CreateLedger(c) => c.ledger_id,
            LedgerCommand::Transfer(c) => c.ledger_id,
            LedgerCommand::Approve(c) => c.ledger_id,
            LedgerCommand::TransferFrom(c) => c.ledger_id,
            LedgerCommand::Mint(c) => c.ledger_id,
            LedgerCommand::Burn(c) => c.ledger_id,
        }
    }

    /// Short operation name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCommand::CreateLedger(_) => "create",
            LedgerCommand::Transfer(_) => "transfer",
            LedgerCommand::Approve(_) => "approve",
            LedgerCommand::TransferFrom(_) => "transfer_from",
            LedgerCommand::Mint(_) => "mint",
            LedgerCommand::Burn(_) => "burn",
        }
    }
}

/// Event: LedgerCreated.
///
/// The initial supply is credited by the `Transfer` from the zero address that
/// accompanies this event, not by this event itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCreated {
    pub ledger_id: LedgerId,
    pub owner: Address,
    pub metadata: TokenMetadata,
    pub initial_supply: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Transfer record `(from, to, amount)`.
///
/// `from == zero` is a mint, `to == zero` a burn. `spender` is set when the
/// move was made through an allowance; the allowance shrinks by `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transferred {
    pub ledger_id: LedgerId,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spender: Option<Address>,
    pub occurred_at: DateTime<Utc>,
}

impl Transferred {
    pub fn is_mint(&self) -> bool {
        self.from.is_zero()
    }

    pub fn is_burn(&self) -> bool {
        self.to.is_zero()
    }
}

/// Event: Approval record `(owner, spender, amount)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approved {
    pub ledger_id: LedgerId,
    pub owner: Address,
    pub spender: Address,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenEvent {
    LedgerCreated(LedgerCreated),
    Transfer(Transferred),
    Approval(Approved),
}

impl TokenEvent {
    pub fn ledger_id(&self) -> LedgerId {
        match self {
            TokenEvent::LedgerCreated(e) => e.ledger_id,
            TokenEvent::Transfer(e) => e.ledger_id,
            TokenEvent::Approval(e) => e.ledger_id,
        }
    }

    /// The `(from, to, amount)` tuple of a Transfer record.
    pub fn transfer_tuple(&self) -> Option<(Address, Address, Amount)> {
        match self {
            TokenEvent::Transfer(e) => Some((e.from, e.to, e.amount)),
            _ => None,
        }
    }

    /// The `(owner, spender, amount)` tuple of an Approval record.
    pub fn approval_tuple(&self) -> Option<(Address, Address, Amount)> {
        match self {
            TokenEvent::Approval(e) => Some((e.owner, e.spender, e.amount)),
            _ => None,
        }
    }
}

impl Event for TokenEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TokenEvent::LedgerCreated(_) => "token.ledger.created",
            TokenEvent::Transfer(_) => "token.ledger.transfer",
            TokenEvent::Approval(_) => "token.ledger.approval",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TokenEvent::LedgerCreated(e) => e.occurred_at,
            TokenEvent::Transfer(e) => e.occurred_at,
            TokenEvent::Approval(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Ledger {
    type Command = LedgerCommand;
    type Event = TokenEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TokenEvent::LedgerCreated(e) => {
                self.id = e.ledger_id;
                self.owner = e.owner;
                self.metadata = e.metadata.clone();
                self.created = true;
            }
            TokenEvent::Transfer(e) => {
                if e.is_mint() {
                    self.total_supply = self.total_supply.saturating_add(e.amount);
                } else {
                    self.debit(e.from, e.amount);
                }
                if e.is_burn() {
                    self.total_supply = self.total_supply.saturating_sub(e.amount);
                } else {
                    self.credit(e.to, e.amount);
                }
                if let Some(spender) = e.spender {
                    let remaining = self.allowance(&e.from, &spender).saturating_sub(e.amount);
                    self.set_allowance(e.from, spender, remaining);
                }
            }
            TokenEvent::Approval(e) => {
                self.set_allowance(e.owner, e.spender, e.amount);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.ensure_ledger(command.ledger_id())?;

        match command {
            LedgerCommand::CreateLedger(cmd) => self.handle_create(cmd),
            LedgerCommand::Transfer(cmd) => self.handle_transfer(cmd),
            LedgerCommand::Approve(cmd) => self.handle_approve(cmd),
            LedgerCommand::TransferFrom(cmd) => self.handle_transfer_from(cmd),
            LedgerCommand::Mint(cmd) => self.handle_mint(cmd),
            LedgerCommand::Burn(cmd) => self.handle_burn(cmd),
        }
    }
}

impl Ledger {
    fn debit(&mut self, account: Address, amount: Amount) {
        let next = self.balance_of(&account).saturating_sub(amount);
        self.set_balance(account, next);
    }

    fn credit(&mut self, account: Address, amount: Amount) {
        let next = self.balance_of(&account).saturating_add(amount);
        self.set_balance(account, next);
    }

    // Zero entries are dropped: absent means zero.
    fn set_balance(&mut self, account: Address, amount: Amount) {
        if amount.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, amount);
        }
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    fn ensure_ledger(&self, ledger_id: LedgerId) -> Result<(), DomainError> {
        if ledger_id != self.id {
            return Err(DomainError::invariant(format!(
                "command targets ledger {ledger_id}, aggregate is {}",
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), DomainError> {
        if caller != self.owner {
            return Err(DomainError::unauthorized(caller));
        }
        Ok(())
    }

    fn ensure_not_zero(address: Address, role: &str) -> Result<(), DomainError> {
        if address.is_zero() {
            return Err(DomainError::validation(format!(
                "{role} must not be the zero address"
            )));
        }
        Ok(())
    }

    fn ensure_balance(&self, account: Address, requested: Amount) -> Result<(), DomainError> {
        let available = self.balance_of(&account);
        if available < requested {
            return Err(DomainError::InsufficientBalance {
                account,
                available,
                requested,
            });
        }
        Ok(())
    }

    fn transfer_event(
        &self,
        from: Address,
        to: Address,
        amount: Amount,
        spender: Option<Address>,
        occurred_at: DateTime<Utc>,
    ) -> TokenEvent {
        TokenEvent::Transfer(Transferred {
            ledger_id: self.id,
            from,
            to,
            amount,
            spender,
            occurred_at,
        })
    }

    fn handle_create(&self, cmd: &CreateLedger) -> Result<Vec<TokenEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "ledger {} already created",
                self.id
            )));
        }
        Self::ensure_not_zero(cmd.owner, "owner")?;
        cmd.metadata.validate()?;

        let mut events = vec![TokenEvent::LedgerCreated(LedgerCreated {
            ledger_id: self.id,
            owner: cmd.owner,
            metadata: cmd.metadata.clone(),
            initial_supply: cmd.initial_supply,
            occurred_at: cmd.occurred_at,
        })];

        if !cmd.initial_supply.is_zero() {
            events.push(self.transfer_event(
                Address::ZERO,
                cmd.owner,
                cmd.initial_supply,
                None,
                cmd.occurred_at,
            ));
        }

        Ok(events)
    }

    fn handle_transfer(&self, cmd: &Transfer) -> Result<Vec<TokenEvent>, DomainError> {
        self.ensure_created()?;
        Self::ensure_not_zero(cmd.to, "recipient")?;
        self.ensure_balance(cmd.from, cmd.amount)?;

        Ok(vec![self.transfer_event(
            cmd.from,
            cmd.to,
            cmd.amount,
            None,
            cmd.occurred_at,
        )])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<TokenEvent>, DomainError> {
        self.ensure_created()?;
        Self::ensure_not_zero(cmd.spender, "spender")?;

        Ok(vec![TokenEvent::Approval(Approved {
            ledger_id: self.id,
            owner: cmd.owner,
            spender: cmd.spender,
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transfer_from(&self, cmd: &TransferFrom) -> Result<Vec<TokenEvent>, DomainError> {
        self.ensure_created()?;
        Self::ensure_not_zero(cmd.to, "recipient")?;

        // Balance is checked before allowance.
        self.ensure_balance(cmd.from, cmd.amount)?;

        let available = self.allowance(&cmd.from, &cmd.spender);
        if available < cmd.amount {
            return Err(DomainError::InsufficientAllowance {
                owner: cmd.from,
                spender: cmd.spender,
                available,
                requested: cmd.amount,
            });
        }

        Ok(vec![self.transfer_event(
            cmd.from,
            cmd.to,
            cmd.amount,
            Some(cmd.spender),
            cmd.occurred_at,
        )])
    }

    fn handle_mint(&self, cmd: &Mint) -> Result<Vec<TokenEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_owner(cmd.caller)?;
        Self::ensure_not_zero(cmd.to, "recipient")?;

        if self.total_supply.checked_add(cmd.amount).is_none() {
            return Err(DomainError::invariant("total supply overflow"));
        }

        Ok(vec![self.transfer_event(
            Address::ZERO,
            cmd.to,
            cmd.amount,
            None,
            cmd.occurred_at,
        )])
    }

    fn handle_burn(&self, cmd: &Burn) -> Result<Vec<TokenEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_owner(cmd.caller)?;
        Self::ensure_not_zero(cmd.from, "burn source")?;
        self.ensure_balance(cmd.from, cmd.amount)?;

        Ok(vec![self.transfer_event(
            cmd.from,
            Address::ZERO,
            cmd.amount,
            None,
            cmd.occurred_at,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tonytoken_events::execute;

    const OWNER: Address = Address::repeat_byte(0x01);
    const ALICE: Address = Address::repeat_byte(0x02);
    const BOB: Address = Address::repeat_byte(0x03);
    const CAROL: Address = Address::repeat_byte(0x04);

    fn amount(n: u128) -> Amount {
        Amount::new(n)
    }

    fn created_ledger(initial: u128) -> Ledger {
        let id = LedgerId::new();
        let mut ledger = Ledger::empty(id);
        execute(
            &mut ledger,
            &LedgerCommand::CreateLedger(CreateLedger {
                ledger_id: id,
                owner: OWNER,
                metadata: TokenMetadata::default(),
                initial_supply: amount(initial),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        ledger
    }

    fn transfer(ledger: &Ledger, from: Address, to: Address, n: u128) -> LedgerCommand {
        LedgerCommand::Transfer(Transfer {
            ledger_id: ledger.id_typed(),
            from,
            to,
            amount: amount(n),
            occurred_at: Utc::now(),
        })
    }

    fn approve(ledger: &Ledger, owner: Address, spender: Address, n: u128) -> LedgerCommand {
        LedgerCommand::Approve(Approve {
            ledger_id: ledger.id_typed(),
            owner,
            spender,
            amount: amount(n),
            occurred_at: Utc::now(),
        })
    }

    fn transfer_from(
        ledger: &Ledger,
        spender: Address,
        from: Address,
        to: Address,
        n: u128,
    ) -> LedgerCommand {
        LedgerCommand::TransferFrom(TransferFrom {
            ledger_id: ledger.id_typed(),
            spender,
            from,
            to,
            amount: amount(n),
            occurred_at: Utc::now(),
        })
    }

    fn mint(ledger: &Ledger, caller: Address, to: Address, n: u128) -> LedgerCommand {
        LedgerCommand::Mint(Mint {
            ledger_id: ledger.id_typed(),
            caller,
            to,
            amount: amount(n),
            occurred_at: Utc::now(),
        })
    }

    fn burn(ledger: &Ledger, caller: Address, from: Address, n: u128) -> LedgerCommand {
        LedgerCommand::Burn(Burn {
            ledger_id: ledger.id_typed(),
            caller,
            from,
            amount: amount(n),
            occurred_at: Utc::now(),
        })
    }

    fn sum_of_balances(ledger: &Ledger) -> u128 {
        ledger.holders().iter().map(|(_, b)| b.get()).sum()
    }

    #[test]
    fn create_credits_owner_and_records_mint() {
        let id = LedgerId::new();
        let mut ledger = Ledger::empty(id);

        let events = execute(
            &mut ledger,
            &LedgerCommand::CreateLedger(CreateLedger {
                ledger_id: id,
                owner: OWNER,
                metadata: TokenMetadata::default(),
                initial_supply: amount(10_000),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], TokenEvent::LedgerCreated(_)));
        assert_eq!(
            events[1].transfer_tuple(),
            Some((Address::ZERO, OWNER, amount(10_000)))
        );
        assert_eq!(ledger.owner(), OWNER);
        assert_eq!(ledger.total_supply(), amount(10_000));
        assert_eq!(ledger.balance_of(&OWNER), amount(10_000));
        assert_eq!(ledger.balance_of(&ALICE), Amount::ZERO);
        assert_eq!(ledger.version(), 2);
    }

    #[test]
    fn create_twice_is_a_conflict() {
        let ledger = created_ledger(1);
        let err = ledger
            .handle(&LedgerCommand::CreateLedger(CreateLedger {
                ledger_id: ledger.id_typed(),
                owner: ALICE,
                metadata: TokenMetadata::default(),
                initial_supply: amount(5),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn create_with_zero_supply_emits_no_transfer() {
        let ledger = Ledger::empty(LedgerId::new());
        let events = ledger
            .handle(&LedgerCommand::CreateLedger(CreateLedger {
                ledger_id: ledger.id_typed(),
                owner: OWNER,
                metadata: TokenMetadata::default(),
                initial_supply: Amount::ZERO,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn create_rejects_zero_owner_and_blank_metadata() {
        let ledger = Ledger::empty(LedgerId::new());
        let zero_owner = LedgerCommand::CreateLedger(CreateLedger {
            ledger_id: ledger.id_typed(),
            owner: Address::ZERO,
            metadata: TokenMetadata::default(),
            initial_supply: amount(1),
            occurred_at: Utc::now(),
        });
        assert!(matches!(ledger.handle(&zero_owner), Err(DomainError::Validation(_))));

        let blank = LedgerCommand::CreateLedger(CreateLedger {
            ledger_id: ledger.id_typed(),
            owner: OWNER,
            metadata: TokenMetadata::new("", "TT", 18),
            initial_supply: amount(1),
            occurred_at: Utc::now(),
        });
        assert!(matches!(ledger.handle(&blank), Err(DomainError::Validation(_))));
    }

    #[test]
    fn operations_on_uncreated_ledger_are_not_found() {
        let ledger = Ledger::empty(LedgerId::new());
        let err = ledger.handle(&transfer(&ledger, OWNER, ALICE, 0)).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn command_for_another_ledger_is_rejected() {
        let ledger = created_ledger(100);
        let other = Ledger::empty(LedgerId::new());
        let err = ledger.handle(&transfer(&other, OWNER, ALICE, 1)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn transfer_moves_balance_and_emits_record() {
        let mut ledger = created_ledger(10_000);
        let cmd = transfer(&ledger, OWNER, ALICE, 10);

        let events = execute(&mut ledger, &cmd).unwrap();

        assert_eq!(events[0].transfer_tuple(), Some((OWNER, ALICE, amount(10))));
        assert_eq!(ledger.balance_of(&OWNER), amount(9_990));
        assert_eq!(ledger.balance_of(&ALICE), amount(10));
        assert_eq!(ledger.total_supply(), amount(10_000));
    }

    #[test]
    fn transfer_beyond_balance_fails_and_changes_nothing() {
        let mut ledger = created_ledger(10_000);
        let before = ledger.clone();
        let cmd = transfer(&ledger, ALICE, BOB, 10);

        let err = execute(&mut ledger, &cmd).unwrap_err();

        assert_eq!(
            err,
            DomainError::InsufficientBalance {
                account: ALICE,
                available: Amount::ZERO,
                requested: amount(10),
            }
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn transfer_to_self_keeps_balance() {
        let mut ledger = created_ledger(50);
        let cmd = transfer(&ledger, OWNER, OWNER, 20);
        execute(&mut ledger, &cmd).unwrap();
        assert_eq!(ledger.balance_of(&OWNER), amount(50));
    }

    #[test]
    fn transfer_to_zero_address_is_rejected() {
        let ledger = created_ledger(50);
        let err = ledger.handle(&transfer(&ledger, OWNER, Address::ZERO, 1)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn zero_address_is_rejected_in_every_account_role() {
        let ledger = created_ledger(50);
        let commands = [
            approve(&ledger, OWNER, Address::ZERO, 1),
            transfer_from(&ledger, BOB, OWNER, Address::ZERO, 1),
            mint(&ledger, OWNER, Address::ZERO, 1),
            burn(&ledger, OWNER, Address::ZERO, 1),
        ];

        for cmd in &commands {
            let err = ledger.handle(cmd).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{cmd:?} gave {err:?}");
        }
        assert_eq!(ledger.total_supply(), amount(50));
    }

    #[test]
    fn approve_overwrites_rather_than_accumulates() {
        let mut ledger = created_ledger(10_000);

        let first = approve(&ledger, OWNER, BOB, 100);
        let events = execute(&mut ledger, &first).unwrap();
        assert_eq!(events[0].approval_tuple(), Some((OWNER, BOB, amount(100))));
        assert_eq!(ledger.allowance(&OWNER, &BOB), amount(100));

        let second = approve(&ledger, OWNER, BOB, 30);
        execute(&mut ledger, &second).unwrap();
        assert_eq!(ledger.allowance(&OWNER, &BOB), amount(30));
    }

    #[test]
    fn approve_may_exceed_balance() {
        let mut ledger = created_ledger(10);
        let cmd = approve(&ledger, ALICE, BOB, 1_000_000);
        execute(&mut ledger, &cmd).unwrap();
        assert_eq!(ledger.allowance(&ALICE, &BOB), amount(1_000_000));
        assert_eq!(ledger.allowance(&BOB, &ALICE), Amount::ZERO);
    }

    #[test]
    fn transfer_from_spends_allowance() {
        let mut ledger = created_ledger(10_000);
        let seed = transfer(&ledger, OWNER, ALICE, 200);
        execute(&mut ledger, &seed).unwrap();
        let allow = approve(&ledger, ALICE, BOB, 100);
        execute(&mut ledger, &allow).unwrap();

        let cmd = transfer_from(&ledger, BOB, ALICE, CAROL, 50);
        let events = execute(&mut ledger, &cmd).unwrap();

        assert_eq!(events[0].transfer_tuple(), Some((ALICE, CAROL, amount(50))));
        assert_eq!(ledger.balance_of(&ALICE), amount(150));
        assert_eq!(ledger.balance_of(&CAROL), amount(50));
        assert_eq!(ledger.allowance(&ALICE, &BOB), amount(50));
    }

    #[test]
    fn transfer_from_checks_balance_before_allowance() {
        let ledger = created_ledger(10_000);
        // Neither balance nor allowance suffices: balance wins.
        let err = ledger
            .handle(&transfer_from(&ledger, OWNER, ALICE, BOB, 10))
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientBalance { account, .. } if account == ALICE));
    }

    #[test]
    fn transfer_from_without_allowance_fails_even_with_balance() {
        let mut ledger = created_ledger(10_000);
        let seed = transfer(&ledger, OWNER, ALICE, 10);
        execute(&mut ledger, &seed).unwrap();
        let before = ledger.clone();

        let cmd = transfer_from(&ledger, BOB, ALICE, CAROL, 5);
        let err = execute(&mut ledger, &cmd).unwrap_err();

        assert_eq!(
            err,
            DomainError::InsufficientAllowance {
                owner: ALICE,
                spender: BOB,
                available: Amount::ZERO,
                requested: amount(5),
            }
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn mint_by_owner_grows_supply() {
        let mut ledger = created_ledger(10_000);
        let cmd = mint(&ledger, OWNER, OWNER, 5_000);

        let events = execute(&mut ledger, &cmd).unwrap();

        assert_eq!(events[0].transfer_tuple(), Some((Address::ZERO, OWNER, amount(5_000))));
        assert_eq!(ledger.total_supply(), amount(15_000));
        assert_eq!(ledger.balance_of(&OWNER), amount(15_000));
    }

    #[test]
    fn mint_by_non_owner_is_unauthorized() {
        let mut ledger = created_ledger(10_000);
        let before = ledger.clone();
        let cmd = mint(&ledger, ALICE, OWNER, 5_000);

        let err = execute(&mut ledger, &cmd).unwrap_err();

        assert_eq!(err, DomainError::Unauthorized { caller: ALICE });
        assert_eq!(ledger, before);
    }

    #[test]
    fn mint_overflow_is_rejected() {
        let ledger = created_ledger(1);
        let err = ledger.handle(&mint(&ledger, OWNER, ALICE, u128::MAX)).unwrap_err();
        assert_eq!(err, DomainError::invariant("total supply overflow"));
    }

    #[test]
    fn burn_by_owner_shrinks_supply() {
        let mut ledger = created_ledger(10_000);
        let cmd = burn(&ledger, OWNER, OWNER, 5_000);

        let events = execute(&mut ledger, &cmd).unwrap();

        assert_eq!(events[0].transfer_tuple(), Some((OWNER, Address::ZERO, amount(5_000))));
        assert_eq!(ledger.total_supply(), amount(5_000));
        assert_eq!(ledger.balance_of(&OWNER), amount(5_000));
    }

    #[test]
    fn burn_checks_owner_before_balance() {
        let ledger = created_ledger(10_000);
        let err = ledger.handle(&burn(&ledger, ALICE, OWNER, 20_000)).unwrap_err();
        assert_eq!(err, DomainError::Unauthorized { caller: ALICE });
    }

    #[test]
    fn burn_beyond_balance_is_insufficient() {
        let ledger = created_ledger(10_000);
        let err = ledger.handle(&burn(&ledger, OWNER, OWNER, 20_000)).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientBalance { .. }));
    }

    #[test]
    fn owner_may_burn_other_holders() {
        let mut ledger = created_ledger(100);
        let seed = transfer(&ledger, OWNER, ALICE, 40);
        execute(&mut ledger, &seed).unwrap();
        let cmd = burn(&ledger, OWNER, ALICE, 40);
        execute(&mut ledger, &cmd).unwrap();

        assert_eq!(ledger.balance_of(&ALICE), Amount::ZERO);
        assert_eq!(ledger.total_supply(), amount(60));
        assert_eq!(ledger.holders(), vec![(OWNER, amount(60))]);
    }

    #[test]
    fn events_round_trip_through_json() {
        let mut ledger = created_ledger(10);
        let cmd = approve(&ledger, OWNER, ALICE, 3);
        let events = execute(&mut ledger, &cmd).unwrap();

        let json = serde_json::to_value(&events[0]).unwrap();
        let back: TokenEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, events[0]);
        assert_eq!(back.event_type(), "token.ledger.approval");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Transfer(u8, u8, u32),
        Approve(u8, u8, u32),
        TransferFrom(u8, u8, u8, u32),
        Mint(u8, u8, u32),
        Burn(u8, u8, u32),
    }

    fn account(i: u8) -> Address {
        [OWNER, ALICE, BOB, CAROL][usize::from(i % 4)]
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<u8>(), any::<u8>(), 0u32..5_000).prop_map(|(a, b, n)| Op::Transfer(a, b, n)),
            (any::<u8>(), any::<u8>(), 0u32..5_000).prop_map(|(a, b, n)| Op::Approve(a, b, n)),
            (any::<u8>(), any::<u8>(), any::<u8>(), 0u32..5_000)
                .prop_map(|(s, a, b, n)| Op::TransferFrom(s, a, b, n)),
            (any::<u8>(), any::<u8>(), 0u32..5_000).prop_map(|(a, b, n)| Op::Mint(a, b, n)),
            (any::<u8>(), any::<u8>(), 0u32..5_000).prop_map(|(a, b, n)| Op::Burn(a, b, n)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: total supply equals the sum of balances after every
        /// operation, and rejected operations leave state untouched.
        #[test]
        fn supply_matches_balances_across_any_sequence(
            ops in prop::collection::vec(op_strategy(), 1..40)
        ) {
            let mut ledger = created_ledger(10_000);

            for op in ops {
                let cmd = match op {
                    Op::Transfer(a, b, n) => transfer(&ledger, account(a), account(b), n.into()),
                    Op::Approve(a, b, n) => approve(&ledger, account(a), account(b), n.into()),
                    Op::TransferFrom(s, a, b, n) => {
                        transfer_from(&ledger, account(s), account(a), account(b), n.into())
                    }
                    Op::Mint(a, b, n) => mint(&ledger, account(a), account(b), n.into()),
                    Op::Burn(a, b, n) => burn(&ledger, account(a), account(b), n.into()),
                };

                let before = ledger.clone();
                if execute(&mut ledger, &cmd).is_err() {
                    prop_assert_eq!(&ledger, &before);
                }
                prop_assert_eq!(ledger.total_supply().get(), sum_of_balances(&ledger));
            }
        }

        /// Property: replaying the emitted events onto a fresh aggregate
        /// reproduces the same state.
        #[test]
        fn replay_reproduces_state(
            ops in prop::collection::vec(op_strategy(), 1..25)
        ) {
            let mut ledger = created_ledger(10_000);
            let mut history = Vec::new();

            // Recreate the creation history for the replay.
            let mut fresh = Ledger::empty(ledger.id_typed());
            let creation = fresh
                .handle(&LedgerCommand::CreateLedger(CreateLedger {
                    ledger_id: ledger.id_typed(),
                    owner: OWNER,
                    metadata: TokenMetadata::default(),
                    initial_supply: amount(10_000),
                    occurred_at: Utc::now(),
                }))
                .unwrap();
            history.extend(creation);

            for op in ops {
                let cmd = match op {
                    Op::Transfer(a, b, n) => transfer(&ledger, account(a), account(b), n.into()),
                    Op::Approve(a, b, n) => approve(&ledger, account(a), account(b), n.into()),
                    Op::TransferFrom(s, a, b, n) => {
                        transfer_from(&ledger, account(s), account(a), account(b), n.into())
                    }
                    Op::Mint(a, b, n) => mint(&ledger, account(a), account(b), n.into()),
                    Op::Burn(a, b, n) => burn(&ledger, account(a), account(b), n.into()),
                };
                if let Ok(events) = execute(&mut ledger, &cmd) {
                    history.extend(events);
                }
            }

            for ev in &history {
                fresh.apply(ev);
            }
            prop_assert_eq!(fresh, ledger);
        }
    }
}
