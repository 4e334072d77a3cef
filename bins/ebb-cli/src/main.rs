//! ebb-cli: operator console for an Ebb liquid-staking vault.
//!
//! Drives a vault persisted as a JSON snapshot together with a simulated
//! validator network and clock. Every mutating command loads the snapshot,
//! runs one vault operation and saves the result; failed operations leave
//! the file untouched.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use ebb_core::constants::DAY_SECS;
use ebb_core::types::{Address, Amount, Timestamp};
use ebb_engine::{InMemoryNetwork, Vault, VaultConfig};

mod format;
mod snapshot;

use format::{amount_arg, format_amount, format_timestamp};
use snapshot::Snapshot;

/// Ebb vault command-line interface.
#[derive(Parser)]
#[command(name = "ebb-cli")]
#[command(version, about = "Liquid staking with a FIFO redemption queue.")]
struct Cli {
    /// Vault snapshot file (default: <data dir>/ebb/vault.json).
    #[arg(short, long, global = true)]
    state: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json").
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault snapshot from configuration.
    Init(InitArgs),
    /// Show vault totals, treasury balances and queue cursors.
    Status,
    /// Validator registry management.
    Validator {
        #[command(subcommand)]
        action: ValidatorAction,
    },
    /// Deposit assets and mint shares.
    Deposit(DepositArgs),
    /// Allow a spender to redeem an owner's shares.
    Approve(ApproveArgs),
    /// Burn shares and queue a redemption request.
    Request(RequestArgs),
    /// Run a settlement pass at the simulated time.
    Process,
    /// Claim rewards and restake them.
    Compound,
    /// Pay out matured redemption requests.
    Withdraw(WithdrawArgs),
    /// Protocol fee management.
    Fee {
        #[command(subcommand)]
        action: FeeAction,
    },
    /// Stop accepting deposits.
    Pause(AdminArgs),
    /// Accept deposits again.
    Unpause(AdminArgs),
    /// Accrue simulated reward on a validator.
    Reward(RewardArgs),
    /// Move the simulated clock forward.
    Advance(AdvanceArgs),
    /// Show one redemption request.
    RequestInfo {
        id: u64,
    },
    /// Print and clear pending events as JSON lines.
    Events,
}

#[derive(Args)]
struct InitArgs {
    /// TOML configuration file; `EBB_*` environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replace an existing snapshot.
    #[arg(long)]
    force: bool,

    /// Start the simulated clock at this unix time instead of now.
    #[arg(long)]
    clock: Option<u64>,
}

#[derive(Args)]
struct AdminArgs {
    /// Acting account (default: the configured admin).
    #[arg(long = "as")]
    caller: Option<Address>,
}

#[derive(Subcommand)]
enum ValidatorAction {
    /// Register a validator.
    Add {
        address: Address,
        #[arg(short, long)]
        weight: u64,
        #[command(flatten)]
        admin: AdminArgs,
    },
    /// Change a validator's weight.
    Update {
        address: Address,
        #[arg(short, long)]
        weight: u64,
        #[command(flatten)]
        admin: AdminArgs,
    },
    /// Stop allocating to a validator; its stake is drained first.
    Disable {
        address: Address,
        #[command(flatten)]
        admin: AdminArgs,
    },
    /// List registered validators.
    List {
        /// Include disabled validators.
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum FeeAction {
    /// Withdraw accrued protocol fee to the admin.
    Claim {
        #[arg(value_parser = amount_arg)]
        amount: Amount,
        #[command(flatten)]
        admin: AdminArgs,
    },
    /// Set the protocol fee in basis points.
    Set {
        bps: u64,
        #[command(flatten)]
        admin: AdminArgs,
    },
}

#[derive(Args)]
struct DepositArgs {
    /// Depositing account.
    #[arg(long)]
    from: Address,

    /// Assets to deposit (decimal, e.g. 12.5).
    #[arg(value_parser = amount_arg)]
    amount: Amount,

    /// Share recipient (default: the depositor).
    #[arg(long)]
    to: Option<Address>,
}

#[derive(Args)]
struct ApproveArgs {
    #[arg(long)]
    owner: Address,

    #[arg(long)]
    spender: Address,

    /// Shares the spender may redeem (decimal).
    #[arg(value_parser = amount_arg)]
    shares: Amount,
}

#[derive(Args)]
struct RequestArgs {
    /// Account filing the request; it will be the one to withdraw.
    #[arg(long)]
    from: Address,

    /// Shares to redeem (decimal).
    #[arg(value_parser = amount_arg)]
    shares: Amount,

    /// Share owner, when redeeming under an allowance.
    #[arg(long)]
    owner: Option<Address>,
}

#[derive(Args)]
struct WithdrawArgs {
    /// Requester collecting matured requests.
    #[arg(long)]
    from: Address,

    /// Asset recipient (default: the requester).
    #[arg(long)]
    to: Option<Address>,
}

#[derive(Args)]
struct RewardArgs {
    validator: Address,

    #[arg(value_parser = amount_arg)]
    amount: Amount,
}

#[derive(Args)]
struct AdvanceArgs {
    #[arg(long, default_value_t = 0)]
    days: u64,

    #[arg(long, default_value_t = 0)]
    hours: u64,

    #[arg(long, default_value_t = 0)]
    secs: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    let path = resolve_state_path(cli.state)?;
    match cli.command {
        Commands::Init(args) => init(&path, args),
        command => with_vault(&path, |vault, clock| run(vault, clock, command)),
    }
}

/// Initialize tracing with the given level and output format.
///
/// `RUST_LOG` takes precedence over `level_str`. Logs go to stderr so JSON
/// event output on stdout stays machine-readable.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

/// Resolve the snapshot path, using the default if not provided.
fn resolve_state_path(path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(p) = path {
        return Ok(p);
    }
    let data = dirs::data_dir().context("Could not determine data directory")?;
    Ok(data.join("ebb").join("vault.json"))
}

/// Load the snapshot, run `op`, and save only if it succeeded.
fn with_vault(
    path: &Path,
    op: impl FnOnce(&mut Vault<InMemoryNetwork>, &mut Timestamp) -> Result<()>,
) -> Result<()> {
    let (mut vault, mut clock) = Snapshot::load(path)?.into_vault();
    op(&mut vault, &mut clock)?;
    Snapshot::from_vault(vault, clock).save(path)
}

fn admin_of(vault: &Vault<InMemoryNetwork>, args: &AdminArgs) -> Address {
    args.caller.unwrap_or(vault.state().config.admin)
}

fn init(path: &Path, args: InitArgs) -> Result<()> {
    if path.exists() && !args.force {
        bail!("Vault snapshot already exists: {} (use --force to replace)", path.display());
    }
    let config = VaultConfig::load(args.config.as_deref()).context("Failed to load vault configuration")?;
    let clock = args.clock.unwrap_or_else(format::now);
    let snapshot = Snapshot::new(config, clock)?;
    snapshot.save(path)?;

    info!(path = %path.display(), clock, "cli: vault initialised");
    println!("\n=== VAULT CREATED ===");
    println!("Admin:      {}", snapshot.state.config.admin);
    println!("Validators: {}", snapshot.state.registry.active_count());
    println!("Clock:      {}", format_timestamp(clock));
    println!("\nSnapshot saved to: {}", path.display());
    Ok(())
}

fn advance(clock: &mut Timestamp, args: AdvanceArgs) -> Result<()> {
    let secs = args
        .days
        .checked_mul(DAY_SECS)
        .and_then(|d| d.checked_add(args.hours.checked_mul(3_600)?))
        .and_then(|d| d.checked_add(args.secs))
        .and_then(|d| clock.checked_add(d))
        .context("Advance overflows the clock")?;
    *clock = secs;
    println!("Clock: {}", format_timestamp(*clock));
    Ok(())
}

fn run(vault: &mut Vault<InMemoryNetwork>, clock: &mut Timestamp, command: Commands) -> Result<()> {
    let now = *clock;
    match command {
        Commands::Init(_) => bail!("init creates a new snapshot and cannot run against a loaded one"),
        Commands::Status => status(vault, now),
        Commands::RequestInfo { id } => request_info(vault, id)?,
        Commands::Events => {
            for event in vault.take_events() {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Commands::Advance(args) => advance(clock, args)?,
        Commands::Validator { action } => match action {
            ValidatorAction::Add { address, weight, admin } => {
                let caller = admin_of(vault, &admin);
                vault.add_validator(caller, address, weight)?;
                println!("Validator {address} added with weight {weight}");
            }
            ValidatorAction::Update { address, weight, admin } => {
                let caller = admin_of(vault, &admin);
                vault.update_validator_weight(caller, address, weight)?;
                println!("Validator {address} weight set to {weight}");
            }
            ValidatorAction::Disable { address, admin } => {
                let caller = admin_of(vault, &admin);
                vault.disable_validator(caller, address)?;
                println!("Validator {address} disabled");
            }
            ValidatorAction::List { all } => list_validators(vault, all),
        },
        Commands::Deposit(args) => {
            let receiver = args.to.unwrap_or(args.from);
            let shares = vault.deposit(args.from, receiver, args.amount)?;
            println!("Deposited {} assets; minted {} shares to {receiver}", format_amount(args.amount), format_amount(shares));
        }
        Commands::Approve(args) => {
            vault.approve(args.owner, args.spender, args.shares);
            println!("{} may redeem {} shares of {}", args.spender, format_amount(args.shares), args.owner);
        }
        Commands::Request(args) => {
            let owner = args.owner.unwrap_or(args.from);
            let id = vault.request_redemption(args.from, owner, args.shares, now)?;
            let request = vault.request(id)?;
            println!("Request #{id}: {} shares for {} assets", format_amount(request.share_amount), format_amount(request.asset_amount));
        }
        Commands::Process => {
            let report = vault.process_redemption_requests(now)?;
            if let Some((before, after)) = report.matured {
                println!("Matured:   requests {before}..{after} ({} released from unbonding)", format_amount(report.released_unbonding));
            }
            println!("Harvested: {}", format_amount(report.harvested));
            println!("Source:    {:?}", report.source);
            println!(
                "Committed: {} ({} buffer, {} staking)",
                format_amount(report.committed),
                format_amount(report.from_buffer),
                format_amount(report.from_staking)
            );
            println!("Cursors:   redeeming {}, withdrawing {}", report.redeeming_cursor, report.withdrawing_cursor);
        }
        Commands::Compound => {
            let report = vault.compound(now)?;
            println!("Reward:    {} (fee {})", format_amount(report.total_reward), format_amount(report.fee));
            match report.validator {
                Some(v) => println!("Staked:    {} on {v}", format_amount(report.staked)),
                None => println!("Staked:    0"),
            }
            println!("To buffer: {}", format_amount(report.to_buffer));
        }
        Commands::Withdraw(args) => {
            let receiver = args.to.unwrap_or(args.from);
            let withdrawal = vault.withdraw(args.from, receiver, args.from)?;
            println!(
                "Paid {} assets ({} shares) to {receiver} for requests {:?}",
                format_amount(withdrawal.assets),
                format_amount(withdrawal.shares),
                withdrawal.ids
            );
        }
        Commands::Fee { action } => match action {
            FeeAction::Claim { amount, admin } => {
                let caller = admin_of(vault, &admin);
                let paid = vault.claim_protocol_fee(caller, amount)?;
                println!("Claimed {} protocol fee; {} remains", format_amount(paid), format_amount(vault.treasury().fee));
            }
            FeeAction::Set { bps, admin } => {
                let caller = admin_of(vault, &admin);
                vault.set_protocol_fee(caller, bps)?;
                println!("Protocol fee set to {bps} bps");
            }
        },
        Commands::Pause(admin) => {
            let caller = admin_of(vault, &admin);
                vault.set_deposits_paused(caller, true)?;
            println!("Deposits paused");
        }
        Commands::Unpause(admin) => {
            let caller = admin_of(vault, &admin);
                vault.set_deposits_paused(caller, false)?;
            println!("Deposits resumed");
        }
        Commands::Reward(args) => {
            if vault.validator_info(&args.validator).is_none() {
                bail!("Unknown validator: {}", args.validator);
            }
            vault.network_mut().add_reward(&args.validator, args.amount);
            println!("Accrued {} reward on {}", format_amount(args.amount), args.validator);
        }
    }
    Ok(())
}

fn status(vault: &Vault<InMemoryNetwork>, now: Timestamp) {
    let s = vault.state();
    let q = s.queue.state();
    let t = &s.treasury;

    println!("\n=== VAULT STATUS ===");
    println!("Clock:          {}", format_timestamp(now));
    println!("Deposits:       {}", if s.deposits_paused { "paused" } else { "open" });
    println!();
    println!("Total assets:   {}", format_amount(s.total_assets()));
    println!("Share supply:   {}", format_amount(s.shares.total_supply()));
    println!("Staked:         {}", format_amount(s.registry.total_staked()));
    println!("Buffer:         {}", format_amount(t.buffer));
    println!("Reserved:       {}", format_amount(t.reserved));
    println!("Unbonding:      {}", format_amount(t.unbonding));
    println!("Protocol fee:   {} ({} bps)", format_amount(t.fee), t.protocol_fee_bps);
    println!();
    println!("Queue length:   {}", q.length);
    println!("Redeeming at:   {}", q.redeeming_cursor);
    println!("Withdrawing at: {}", q.withdrawing_cursor);
    println!("Accumulated:    {}", format_amount(q.accumulated_asset_amount));
    println!("Outstanding:    {}", format_amount(s.queue.outstanding()));
    println!("Paid out:       {}", format_amount(q.total_paid));
    match s.last_unstake_at {
        Some(ts) => println!("Last unstake:   {}", format_timestamp(ts)),
        None => println!("Last unstake:   never"),
    }
}

fn list_validators(vault: &Vault<InMemoryNetwork>, all: bool) {
    let registry = &vault.state().registry;
    println!("Sum of weight: {}", registry.sum_of_weight());
    for v in registry.all().iter().filter(|v| all || v.active) {
        let position = vault.network().position(&v.address);
        println!(
            "{} weight {:>3} staked {:>24} pending reward {}{}",
            v.address,
            v.weight,
            format_amount(v.staked),
            format_amount(position.pending_reward),
            if v.active { "" } else { " (disabled)" }
        );
    }
}

fn request_info(vault: &Vault<InMemoryNetwork>, id: u64) -> Result<()> {
    let queue = &vault.state().queue;
    let request = queue.get(id)?;
    println!("Request #{}", request.id);
    println!("Requester:  {}", request.requester);
    println!("Owner:      {}", request.owner);
    println!("Shares:     {}", format_amount(request.share_amount));
    println!("Assets:     {}", format_amount(request.asset_amount));
    println!("Committed:  {}", format_amount(request.partially_redeemed));
    match request.commit_timestamp {
        Some(ts) => println!("Stamped:    {}", format_timestamp(ts)),
        None => println!("Stamped:    not yet"),
    }
    let status = if request.paid {
        "paid"
    } else if id < queue.withdrawing_cursor() {
        "withdrawable"
    } else if request.partially_redeemed == request.asset_amount {
        "committed"
    } else {
        "queued"
    };
    println!("Status:     {status}");
    Ok(())
}
