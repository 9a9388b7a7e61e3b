//! Command handlers for the `tonytoken` binary.
//!
//! Every handler opens the file-backed store under the data directory, runs
//! one ledger operation and writes a human-readable result to `out`.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};

use tonytoken_core::{Address, Amount, LedgerId};
use tonytoken_events::InMemoryEventBus;
use tonytoken_infra::event_store::{EventStore, FileEventStore};
use tonytoken_infra::projections::HolderBalancesProjection;
use tonytoken_infra::{
    DispatchError, SharedBus, TokenService, load_contract_address, save_contract_address,
};
use tonytoken_ledger::{Ledger, TokenEvent, TokenMetadata};

use crate::config::{Command, Config, DeployArgs};

type FileTokenService = TokenService<FileEventStore, SharedBus>;

/// Everything a command needs: the service, the caller and the record path.
pub struct Session {
    service: FileTokenService,
    signer: Option<Address>,
    address_file: PathBuf,
}

impl Session {
    pub fn open(config: &Config) -> Result<Self> {
        let streams = config.storage().streams_dir();
        let store = FileEventStore::open(&streams)
            .with_context(|| format!("failed to open event store at {}", streams.display()))?;

        Ok(Self {
            service: TokenService::new(store, Arc::new(InMemoryEventBus::new())),
            signer: config.signer,
            address_file: config.address_file(),
        })
    }

    pub fn service(&self) -> &FileTokenService {
        &self.service
    }

    fn signer(&self) -> Result<Address> {
        self.signer
            .ok_or_else(|| anyhow!("no signer configured; pass --signer or set TONYTOKEN_SIGNER"))
    }

    fn deployed_ledger(&self) -> Result<LedgerId> {
        load_contract_address(&self.address_file)
            .context("failed to read deployment record")?
            .ok_or_else(|| {
                anyhow!(
                    "no deployment record at {}; run `tonytoken deploy` first",
                    self.address_file.display()
                )
            })
    }

    fn ledger(&self, ledger_id: LedgerId) -> Result<Ledger> {
        self.service
            .ledger(ledger_id)
            .with_context(|| format!("failed to load ledger {ledger_id}"))
    }
}

/// Open the data directory named by `config` and run its command.
pub fn run(config: &Config, out: &mut impl Write) -> Result<()> {
    let session = Session::open(config)?;
    execute(&session, &config.command, out)
}

pub fn execute(session: &Session, command: &Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Deploy(args) => deploy(session, args, out),
        Command::Transfer { to, value } => {
            let from = session.signer()?;
            mutate(session, "transfer", value, out, |service, id, amount| {
                service.transfer(id, from, *to, amount)
            })
        }
        Command::Approve { spender, value } => {
            let owner = session.signer()?;
            mutate(session, "approve", value, out, |service, id, amount| {
                service.approve(id, owner, *spender, amount)
            })
        }
        Command::TransferFrom {
            sender,
            receiver,
            value,
        } => {
            let spender = session.signer()?;
            mutate(session, "transfer-from", value, out, |service, id, amount| {
                service.transfer_from(id, spender, *sender, *receiver, amount)
            })
        }
        Command::Mint { owner, amount } => {
            let caller = session.signer()?;
            mutate(session, "mint", amount, out, |service, id, amount| {
                service.mint(id, caller, *owner, amount)
            })
        }
        Command::Burn { owner, amount } => {
            let caller = session.signer()?;
            mutate(session, "burn", amount, out, |service, id, amount| {
                service.burn(id, caller, *owner, amount)
            })
        }
        Command::Balance { account } => {
            let ledger = session.ledger(session.deployed_ledger()?)?;
            let balance = display_amount(&ledger, ledger.balance_of(account))?;
            writeln!(out, "{balance}")?;
            Ok(())
        }
        Command::Allowance { owner, spender } => {
            let ledger = session.ledger(session.deployed_ledger()?)?;
            let allowance = display_amount(&ledger, ledger.allowance(owner, spender))?;
            writeln!(out, "{allowance}")?;
            Ok(())
        }
        Command::Info => info(session, out),
        Command::Holders => holders(session, out),
        Command::Events => events(session, out),
        Command::Ledgers => ledgers(session, out),
    }
}

fn deploy(session: &Session, args: &DeployArgs, out: &mut impl Write) -> Result<()> {
    let deployer = session.signer()?;
    let metadata = TokenMetadata::new(&args.name, &args.symbol, args.decimals);
    let initial_supply = Amount::parse_units(&args.initial_supply, args.decimals)
        .with_context(|| format!("invalid initial supply '{}'", args.initial_supply))?;

    tracing::info!(deployer = %deployer, "deploying ledger with the account");

    let (ledger_id, _) = session
        .service
        .deploy(deployer, metadata, initial_supply)
        .context("deployment failed")?;

    tracing::info!(address = %ledger_id, "ledger deployed");

    save_contract_address(&session.address_file, ledger_id)
        .context("failed to write deployment record")?;

    writeln!(out, "Deploying contracts with the account: {deployer}")?;
    writeln!(out, "Contract address: {ledger_id}")?;
    Ok(())
}

/// Shared path of the mutating tasks: resolve the deployed ledger, scale the
/// human amount by its decimals, run the operation, report its records.
fn mutate<F>(
    session: &Session,
    task: &str,
    human_amount: &str,
    out: &mut impl Write,
    operation: F,
) -> Result<()>
where
    F: FnOnce(&FileTokenService, LedgerId, Amount) -> Result<Vec<TokenEvent>, DispatchError>,
{
    let ledger_id = session.deployed_ledger()?;
    let decimals = session
        .service
        .decimals(ledger_id)
        .with_context(|| format!("failed to read decimals of ledger {ledger_id}"))?;
    let amount = Amount::parse_units(human_amount, decimals)
        .with_context(|| format!("invalid amount '{human_amount}'"))?;

    tracing::info!(task, ledger_id = %ledger_id, amount = %amount, "running token task");

    let events = operation(&session.service, ledger_id, amount)
        .with_context(|| format!("{task} failed"))?;

    for event in &events {
        writeln!(out, "{}", describe(event, decimals)?)?;
    }
    Ok(())
}

fn info(session: &Session, out: &mut impl Write) -> Result<()> {
    let ledger_id = session.deployed_ledger()?;
    let ledger = session.ledger(ledger_id)?;

    writeln!(out, "address:      {ledger_id}")?;
    writeln!(out, "name:         {}", ledger.name())?;
    writeln!(out, "symbol:       {}", ledger.symbol())?;
    writeln!(out, "decimals:     {}", ledger.decimals())?;
    writeln!(out, "owner:        {}", ledger.owner())?;
    writeln!(out, "total supply: {}", display_amount(&ledger, ledger.total_supply())?)?;
    Ok(())
}

fn holders(session: &Session, out: &mut impl Write) -> Result<()> {
    let ledger_id = session.deployed_ledger()?;
    let ledger = session.ledger(ledger_id)?;

    let stream = session
        .service
        .dispatcher()
        .store()
        .load_stream(ledger_id)
        .with_context(|| format!("failed to load stream of ledger {ledger_id}"))?;

    let mut projection = HolderBalancesProjection::new();
    projection
        .rebuild_from_scratch(stream.iter().map(|stored| stored.to_envelope()))
        .context("failed to rebuild holder balances")?;

    for (account, balance) in projection.holders(ledger_id) {
        writeln!(out, "{account} {}", display_amount(&ledger, balance)?)?;
    }
    Ok(())
}

fn events(session: &Session, out: &mut impl Write) -> Result<()> {
    let ledger_id = session.deployed_ledger()?;
    let decimals = session.ledger(ledger_id)?.decimals();

    let history = session
        .service
        .history(ledger_id)
        .with_context(|| format!("failed to read history of ledger {ledger_id}"))?;

    for recorded in history {
        if matches!(recorded.event, TokenEvent::LedgerCreated(_)) {
            continue;
        }
        writeln!(out, "#{} {}", recorded.sequence_number, describe(&recorded.event, decimals)?)?;
    }
    Ok(())
}

/// Every ledger with a stream on disk; the one in the deployment record is
/// marked.
fn ledgers(session: &Session, out: &mut impl Write) -> Result<()> {
    let deployed = load_contract_address(&session.address_file)
        .context("failed to read deployment record")?;
    let ids = session
        .service
        .dispatcher()
        .store()
        .list_streams()
        .context("failed to list ledger streams")?;

    for id in ids {
        if Some(id) == deployed {
            writeln!(out, "{id} (deployed)")?;
        } else {
            writeln!(out, "{id}")?;
        }
    }
    Ok(())
}

fn display_amount(ledger: &Ledger, amount: Amount) -> Result<String> {
    let units = amount.format_units(ledger.decimals())?;
    Ok(format!("{units} {}", ledger.symbol()))
}

fn describe(event: &TokenEvent, decimals: u8) -> Result<String> {
    Ok(match event {
        TokenEvent::LedgerCreated(e) => format!(
            "LedgerCreated {} ({}) owner {}",
            e.metadata.name, e.metadata.symbol, e.owner
        ),
        TokenEvent::Transfer(e) => format!(
            "Transfer {} -> {} {}",
            e.from,
            e.to,
            e.amount.format_units(decimals)?
        ),
        TokenEvent::Approval(e) => format!(
            "Approval {} -> {} {}",
            e.owner,
            e.spender,
            e.amount.format_units(decimals)?
        ),
    })
}
