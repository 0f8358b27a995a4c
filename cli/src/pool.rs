// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use clap::{Args, Subcommand};

use casper_sdk::{FileLedger, Pool};
use casper_signer::PoolId;

use crate::{get_provider, get_tool, get_tracker, get_wallet, print_json, Cli};

#[derive(Clone, Debug, Args)]
pub struct PoolArgs {
    #[command(subcommand)]
    command: PoolCommands,
}

#[derive(Clone, Debug, Subcommand)]
enum PoolCommands {
    /// Register a new stake pool owned by the signer.
    Register(RegisterArgs),
    /// Delegate the signer's stake to a pool.
    Delegate(DelegateArgs),
}

#[derive(Clone, Debug, Args)]
struct RegisterArgs {
    /// Pool name. Keys wait in `<pools-dir>/<name>.pending.yaml` and move to
    /// `<name>.yaml` once the registration is confirmed.
    name: String,
}

#[derive(Clone, Debug, Args)]
struct DelegateArgs {
    /// Hex-encoded pool id.
    pool_id: PoolId,
}

/// Pool commands handler.
pub async fn handle_pool(cli: Cli, args: &PoolArgs) -> anyhow::Result<()> {
    let provider = get_provider(&cli)?;
    let tool = get_tool(&cli);
    let wallet = get_wallet(&cli, &provider, &tool).await?;
    let ledger = FileLedger::new(cli.ledger.clone());
    let tracker = get_tracker(&cli);

    match &args.command {
        PoolCommands::Register(args) => {
            let report = Pool::register(
                &provider,
                &tool,
                &wallet,
                &ledger,
                &tracker,
                &cli.pools_dir,
                &args.name,
            )
            .await?;

            print_json(&report)
        }
        PoolCommands::Delegate(args) => {
            let report = Pool::delegate(
                &provider,
                &tool,
                &wallet,
                &ledger,
                &tracker,
                args.pool_id.clone(),
            )
            .await?;

            print_json(&report)
        }
    }
}
