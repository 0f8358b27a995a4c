// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde_json::{json, Value};

use casper_provider::{response::LogStatus, QueryProvider};
use casper_sdk::network::{decode_genesis, genesis_block};

use crate::{get_genesis, get_provider, get_tool, print_json, Cli};

#[derive(Clone, Debug, Args)]
pub struct NodeArgs {
    #[command(subcommand)]
    command: NodeCommands,
}

#[derive(Clone, Debug, Subcommand)]
enum NodeCommands {
    /// Show the fee schedule and chain settings.
    Settings,
    /// List the node's fragment logs.
    Logs,
    /// List registered stake pools.
    StakePools,
    /// Show the stake distribution of the current epoch.
    Stake,
    /// Download the genesis block.
    Genesis(GenesisArgs),
    /// Decode the genesis block with the signing tool.
    GenesisDecode,
    /// Show the signing tool version.
    Version,
}

#[derive(Clone, Debug, Args)]
struct GenesisArgs {
    /// File to write the block to.
    #[arg(short, long, default_value = "block0.bin")]
    output: PathBuf,
}

/// Node commands handler.
pub async fn handle_node(cli: Cli, args: &NodeArgs) -> anyhow::Result<()> {
    let provider = get_provider(&cli)?;

    match &args.command {
        NodeCommands::Settings => {
            let settings = provider.settings().await?;

            print_json(&json!({
                "fees": settings.fees,
                "block0_hash": settings.block0_hash,
                "max_txs_per_block": settings.max_txs_per_block,
            }))
        }
        NodeCommands::Logs => {
            let logs: Vec<Value> = provider
                .message_logs()
                .await?
                .into_iter()
                .map(|entry| {
                    json!({
                        "fragment_id": entry.fragment_id,
                        "status": status_json(entry.status),
                        "last_updated_at": entry.last_updated_at,
                    })
                })
                .collect();

            print_json(&logs)
        }
        NodeCommands::StakePools => print_json(&provider.stake_pools().await?),
        NodeCommands::Stake => {
            let stake = provider.stake().await?;

            print_json(&json!({
                "epoch": stake.epoch,
                "total": stake.total(),
                "stake": stake.stake,
            }))
        }
        NodeCommands::Genesis(args) => {
            let genesis = get_genesis(&cli, &provider).await?;
            let block = genesis_block(&provider, &genesis).await?;
            tokio::fs::write(&args.output, &block).await?;

            print_json(&json!({
                "hash": genesis,
                "size": block.len(),
                "output": args.output,
            }))
        }
        NodeCommands::GenesisDecode => {
            let genesis = get_genesis(&cli, &provider).await?;
            let decoded = decode_genesis(&provider, &get_tool(&cli), &genesis).await?;

            println!("{}", decoded);
            Ok(())
        }
        NodeCommands::Version => {
            let version = get_tool(&cli).version().await?;

            print_json(&json!({ "jcli": version }))
        }
    }
}

fn status_json(status: LogStatus) -> Value {
    match status {
        LogStatus::Pending => json!("Pending"),
        LogStatus::InABlock { date, block } => json!({"InABlock": {"date": date, "block": block}}),
        LogStatus::Rejected { reason } => json!({"Rejected": {"reason": reason}}),
        LogStatus::Other(v) => v,
    }
}
