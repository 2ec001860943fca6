//! poly402 command-line entry point.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm, Password};
use rust_decimal::Decimal;
use time::macros::format_description;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use poly402::chain::Network;
use poly402::config::{ConfigStore, Settings};
use poly402::error::TradingError;
use poly402::market::Market;
use poly402::metrics;
use poly402::orchestrator::{TradeOrchestrator, TradeRequest};
use poly402::signing::{address_from_private_key, signature_type_label};
use poly402::trading::{effective_price, order_size, SubmissionLedger, TradeResult};

const RULE: &str = "======================================================================";

/// Polymarket trading with Base and Polygon balance checks.
#[derive(Parser, Debug)]
#[command(name = "poly402")]
#[command(about = "Trade Polymarket outcomes with USDC balance checks on Base and Polygon")]
#[command(version)]
struct Args {
    /// Configuration file (default: ~/.poly402/config.json).
    #[arg(long, global = true, env = "POLY402_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a configuration file with both wallet keys.
    Init {
        /// Base wallet private key (prompted when absent).
        #[arg(long)]
        base_key: Option<String>,

        /// Polygon wallet private key (prompted when absent).
        #[arg(long)]
        polygon_key: Option<String>,

        /// Overwrite an existing file without asking.
        #[arg(long)]
        force: bool,
    },

    /// Show market details and outcomes.
    Markets {
        /// Market URL or slug.
        #[arg(long)]
        url: String,
    },

    /// Buy an outcome.
    Trade {
        /// Market URL or slug.
        #[arg(long)]
        url: String,

        /// Outcome index (see `markets`).
        #[arg(long)]
        outcome: usize,

        /// USDC to spend.
        #[arg(long)]
        amount: Decimal,

        /// Maximum price per share.
        #[arg(long)]
        max_price: Option<Decimal>,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Reuse a key from an earlier attempt; keys are remembered across runs.
        #[arg(long)]
        idempotency_key: Option<Uuid>,
    },

    /// Show USDC and native balances.
    Balance {
        /// Only this network (base or polygon).
        #[arg(long)]
        network: Option<Network>,
    },

    /// Search markets.
    Search {
        /// Search text.
        #[arg(long)]
        query: String,

        /// Maximum results.
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// List open markets.
    Active {
        /// Maximum results.
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Cancel an open order.
    Cancel {
        /// Venue order ID.
        #[arg(long)]
        order_id: String,
    },

    /// Print the configuration file location.
    ConfigPath,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.log_json);
    metrics::init_metrics();

    let store = ConfigStore::new(args.config);

    match args.command {
        Command::Init {
            base_key,
            polygon_key,
            force,
        } => cmd_init(&store, base_key, polygon_key, force),
        Command::Markets { url } => cmd_markets(&store, &url).await,
        Command::Trade {
            url,
            outcome,
            amount,
            max_price,
            yes,
            idempotency_key,
        } => {
            let mut request = TradeRequest::new(url, outcome, amount).with_max_price(max_price);
            if let Some(key) = idempotency_key {
                request = request.with_idempotency_key(key);
            }
            cmd_trade(&store, request, yes).await
        }
        Command::Balance { network } => cmd_balance(&store, network).await,
        Command::Search { query, limit } => cmd_search(&store, &query, limit).await,
        Command::Active { limit } => cmd_active(&store, limit).await,
        Command::Cancel { order_id } => cmd_cancel(&store, &order_id).await,
        Command::ConfigPath => cmd_config_path(&store),
    }
}

/// Logs go to stderr so command output stays clean on stdout.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("poly402=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_settings(store: &ConfigStore) -> anyhow::Result<Settings> {
    store
        .load()
        .with_context(|| format!("failed to load configuration from {}", store.path().display()))
}

fn orchestrator(store: &ConfigStore) -> anyhow::Result<TradeOrchestrator> {
    let settings = load_settings(store)?;
    let ledger_path = store.ledger_path();
    let ledger = SubmissionLedger::open(&ledger_path).with_context(|| {
        format!("failed to open submission ledger {}", ledger_path.display())
    })?;
    Ok(TradeOrchestrator::new(&settings)?
        .with_ledger(ledger)
        .with_credential_store(store.clone()))
}

fn cmd_init(
    store: &ConfigStore,
    base_key: Option<String>,
    polygon_key: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let theme = ColorfulTheme::default();

    if store.exists() && !force {
        let overwrite = Confirm::with_theme(&theme)
            .with_prompt(format!(
                "Configuration already exists at {}. Overwrite?",
                store.path().display()
            ))
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Aborted. Existing configuration left unchanged.");
            return Ok(());
        }
    }

    let base_key = match base_key {
        Some(key) => key,
        None => Password::with_theme(&theme)
            .with_prompt("Base wallet private key")
            .interact()?,
    };
    let base_address = address_from_private_key(&base_key).context("invalid Base key")?;

    let polygon_key = match polygon_key {
        Some(key) => key,
        None => Password::with_theme(&theme)
            .with_prompt("Polygon wallet private key")
            .interact()?,
    };
    let polygon_address = address_from_private_key(&polygon_key).context("invalid Polygon key")?;

    let path = store.init_with_keys(&base_key, &polygon_key)?;
    info!(path = %path.display(), "Configuration written");

    println!("Configuration saved to {}", path.display());
    println!("  Base wallet:    {}", base_address.to_checksum(None));
    println!("  Polygon wallet: {}", polygon_address.to_checksum(None));
    println!();
    println!("Next steps:");
    println!("  1. Fund the Polygon wallet with USDC to trade");
    println!("  2. Check balances:  poly402 balance");
    println!("  3. Browse markets:  poly402 active");
    Ok(())
}

async fn cmd_markets(store: &ConfigStore, url: &str) -> anyhow::Result<()> {
    let orch = orchestrator(store)?;
    let market = orch.get_market(url).await?;
    print_market(&market);
    Ok(())
}

async fn cmd_trade(store: &ConfigStore, request: TradeRequest, yes: bool) -> anyhow::Result<()> {
    let orch = orchestrator(store)?;
    let market = orch.get_market(&request.market_ref).await?;

    let outcome = market
        .outcome(request.outcome_index)
        .ok_or(TradingError::InvalidOutcome {
            index: request.outcome_index,
            count: market.outcomes.len(),
        })?;
    let price = effective_price(outcome.price, request.max_price);

    println!("{}", RULE);
    println!("TRADE DETAILS");
    println!("{}", RULE);
    println!("  Market:           {}", market.title);
    println!("  Outcome:          [{}] {}", outcome.index, outcome.name);
    println!("  Amount:           {} USDC", request.amount);
    println!("  Price:            {}", price);
    println!("  Estimated shares: {}", order_size(request.amount, price));
    println!("  Idempotency key:  {}", request.idempotency_key);
    println!("{}", RULE);

    if !yes {
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Execute this trade?")
            .default(false)
            .interact()?;
        if !proceed {
            println!("Trade cancelled.");
            return Ok(());
        }
    }

    let result = orch.execute_trade(&request).await?;
    print_trade_result(&result);

    if !result.is_success() {
        bail!(
            "trade failed: {}. Retry with --idempotency-key {} to avoid a duplicate order",
            result.error.as_deref().unwrap_or("unknown error"),
            result.idempotency_key
        );
    }
    Ok(())
}

async fn cmd_balance(store: &ConfigStore, network: Option<Network>) -> anyhow::Result<()> {
    let orch = orchestrator(store)?;

    for balance in orch.balances(network).await {
        println!("{}", balance.network.display_name());
        println!("  Address: {}", balance.address);
        println!("  {:<8} {:.2}", "USDC:", balance.usdc);
        let symbol = format!("{}:", balance.network.native_symbol());
        match balance.native {
            Some(native) => println!("  {:<8} {:.4}", symbol, native),
            None => println!("  {:<8} unavailable", symbol),
        }
    }
    Ok(())
}

async fn cmd_search(store: &ConfigStore, query: &str, limit: usize) -> anyhow::Result<()> {
    let orch = orchestrator(store)?;
    let markets = orch.search_markets(query, limit).await?;

    if markets.is_empty() {
        println!("No markets found for '{}'.", query);
        return Ok(());
    }

    for market in &markets {
        println!("{}", market.title);
        println!("  {}", market.url());
        println!("  Volume: {}", format_volume(market.volume));
    }
    Ok(())
}

async fn cmd_active(store: &ConfigStore, limit: usize) -> anyhow::Result<()> {
    let orch = orchestrator(store)?;
    let markets = orch.active_markets(limit, 0).await?;

    if markets.is_empty() {
        println!("No active markets.");
        return Ok(());
    }

    for market in &markets {
        println!("{}", truncate(&market.title, 50));
        println!(
            "  Outcomes: {}  Volume: {}",
            market.outcomes.len(),
            format_volume(market.volume)
        );
        println!("  {}", market.url());
    }
    Ok(())
}

async fn cmd_cancel(store: &ConfigStore, order_id: &str) -> anyhow::Result<()> {
    let orch = orchestrator(store)?;
    if orch.cancel_order(order_id).await? {
        println!("Order {} cancelled.", order_id);
        Ok(())
    } else {
        bail!("order {} was not cancelled", order_id)
    }
}

fn cmd_config_path(store: &ConfigStore) -> anyhow::Result<()> {
    println!("{}", store.path().display());
    if store.exists() {
        println!("  exists");
        if let Ok(file) = store.load_file() {
            println!(
                "  signature type: {} ({})",
                file.signature_type,
                signature_type_label(file.signature_type)
            );
        }
    } else {
        println!("  not found. Run 'poly402 init' to create it.");
    }
    Ok(())
}

fn print_market(market: &Market) {
    println!("{}", RULE);
    println!("{}", market.title);
    println!("{}", RULE);
    if !market.description.is_empty() {
        println!("{}", truncate(&market.description, 100));
    }
    println!(
        "  Status:   {}",
        if market.active { "Active" } else { "Closed" }
    );
    if let Some(end) = market.end_date {
        let rendered = end
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute] UTC"
            ))
            .unwrap_or_else(|_| end.to_string());
        println!("  Ends:     {}", rendered);
    }
    println!("  Volume:   {}", format_volume(market.volume));
    println!("  URL:      {}", market.url());
    println!();
    println!("Outcomes:");
    for outcome in &market.outcomes {
        println!(
            "  [{}] {:<40} price {:.3}  ({:.1}%)",
            outcome.index,
            truncate(&outcome.name, 40),
            outcome.price,
            outcome.probability
        );
    }
}

fn print_trade_result(result: &TradeResult) {
    println!("{}", RULE);
    println!("TRADE RESULT: {}", result.status.to_string().to_uppercase());
    println!("{}", RULE);
    if !result.order_id.is_empty() {
        println!("  Order ID: {}", result.order_id);
    }
    println!("  Market:   {}", result.market_slug);
    println!("  Outcome:  {}", result.outcome);
    println!("  Amount:   {} USDC", result.amount);
    println!("  Shares:   {}", result.shares_purchased);
    println!("  Price:    {}", result.price_per_share);
    if let Some(tx) = &result.tx_hash {
        println!("  Tx:       {}", tx);
    }
    println!("  Key:      {}", result.idempotency_key);
    if let Some(error) = &result.error {
        println!("  Error:    {}", error);
    }
}

fn format_volume(volume: Option<Decimal>) -> String {
    match volume {
        Some(v) => format!("${:.2}", v),
        None => "N/A".to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}
