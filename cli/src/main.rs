// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use reqwest::Url;
use serde::Serialize;
use stderrlog::Timestamp;
use tokio_util::sync::CancellationToken;

use casper_provider::{rest::RestProvider, QueryProvider};
use casper_sdk::{
    network::{
        DEFAULT_JCLI, DEFAULT_LEDGER_PATH, DEFAULT_NODE_URL, DEFAULT_POLL_MAX_INTERVAL,
        DEFAULT_POOLS_DIR,
    },
    ConfirmationTracker, PollConfig,
};
use casper_signer::{GenesisHash, Jcli, SecretKey, Wallet};

use crate::account::{handle_account, AccountArgs};
use crate::node::{handle_node, NodeArgs};
use crate::pool::{handle_pool, PoolArgs};
use crate::transfer::{handle_send, handle_track, SendArgs, TrackArgs};

mod account;
mod node;
mod pool;
mod transfer;

/// Command line args
#[derive(Clone, Debug, Parser)]
#[command(name = "casper", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Node REST API URL
    #[arg(long, env, default_value = DEFAULT_NODE_URL)]
    node_url: Url,
    /// Genesis block hash. Read from the node settings if not given.
    #[arg(long, env)]
    genesis_hash: Option<GenesisHash>,
    /// Path to the jcli binary
    #[arg(long, env, default_value = DEFAULT_JCLI)]
    jcli: PathBuf,
    /// Account secret key (ed25519extended, bech32) for signing transactions
    #[arg(long, env, hide_env_values = true)]
    secret_key: Option<SecretKey>,
    /// Fragment ledger file
    #[arg(long, env, default_value = DEFAULT_LEDGER_PATH)]
    ledger: PathBuf,
    /// Directory where registered pool configs are saved
    #[arg(long, env, default_value = DEFAULT_POOLS_DIR)]
    pools_dir: PathBuf,
    /// Delay between fragment log polls, e.g. "5s"
    #[arg(long, env, value_parser = humantime::parse_duration, default_value = "5s")]
    poll_interval: Duration,
    /// Give up tracking after this long, e.g. "10m"
    #[arg(long, env, value_parser = humantime::parse_duration, default_value = "10m")]
    poll_timeout: Duration,
    /// Logging verbosity (repeat for more verbose logging)
    #[arg(short, long, env, action = clap::ArgAction::Count)]
    verbosity: u8,
    /// Silence logging and progress output
    #[arg(short, long, env, default_value_t = false)]
    quiet: bool,
}

#[derive(Clone, Debug, Subcommand)]
enum Commands {
    /// Create or inspect accounts.
    #[clap(alias = "accounts")]
    Account(AccountArgs),
    /// Send value to an address, optionally as a batch of transfers.
    Send(SendArgs),
    /// Resume tracking fragments left unsettled in the ledger.
    Track(TrackArgs),
    /// Register or delegate to stake pools.
    #[clap(alias = "pools")]
    Pool(PoolArgs),
    /// Query the node and the signing tool.
    Node(NodeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    stderrlog::new()
        .module(module_path!())
        .module("casper_provider")
        .module("casper_sdk")
        .module("casper_signer")
        .quiet(cli.quiet)
        .verbosity(cli.verbosity as usize)
        .timestamp(Timestamp::Millisecond)
        .init()?;

    match &cli.command.clone() {
        Commands::Account(args) => handle_account(cli, args).await,
        Commands::Send(args) => handle_send(cli, args).await,
        Commands::Track(args) => handle_track(cli, args).await,
        Commands::Pool(args) => handle_pool(cli, args).await,
        Commands::Node(args) => handle_node(cli, args).await,
    }
}

fn get_provider(cli: &Cli) -> anyhow::Result<RestProvider> {
    RestProvider::new_http(cli.node_url.clone(), None)
}

fn get_tool(cli: &Cli) -> Jcli {
    Jcli::new(cli.jcli.clone())
}

async fn get_genesis(cli: &Cli, provider: &RestProvider) -> anyhow::Result<GenesisHash> {
    if let Some(genesis) = &cli.genesis_hash {
        return Ok(genesis.clone());
    }
    let settings = provider.settings().await?;
    settings
        .block0_hash
        .ok_or_else(|| anyhow!("node did not report a genesis hash; pass --genesis-hash"))?
        .parse()
        .context("node reported an invalid genesis hash")
}

async fn get_wallet(cli: &Cli, provider: &RestProvider, tool: &Jcli) -> anyhow::Result<Wallet> {
    if let Some(secret) = &cli.secret_key {
        let genesis = get_genesis(cli, provider).await?;
        Wallet::from_secret(tool, secret.clone(), genesis).await
    } else {
        Err(anyhow!(
            "--secret-key <SECRET_KEY> is required to sign transactions"
        ))
    }
}

/// A tracker using the poll settings from the command line, cancelled by Ctrl-C.
fn get_tracker(cli: &Cli) -> ConfirmationTracker {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; stopping confirmation tracking");
            token.cancel();
        }
    });

    let config = PollConfig {
        interval: cli.poll_interval,
        max_interval: DEFAULT_POLL_MAX_INTERVAL.max(cli.poll_interval),
        timeout: cli.poll_timeout,
        ..Default::default()
    };
    ConfirmationTracker::new(config).with_cancellation(cancel)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&value)?;
    println!("{}", json);
    Ok(())
}
