// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use clap::{Args, Subcommand};
use serde_json::json;

use casper_provider::util::{parse_address, Address};
use casper_sdk::Account;
use casper_signer::Wallet;

use crate::{get_genesis, get_provider, get_tool, get_wallet, print_json, Cli};

#[derive(Clone, Debug, Args)]
pub struct AccountArgs {
    #[command(subcommand)]
    command: AccountCommands,
}

#[derive(Clone, Debug, Subcommand)]
enum AccountCommands {
    /// Generate a new account key and derive its address.
    Create,
    /// Show the counter, balance and delegation of an account.
    Show(ShowArgs),
}

#[derive(Clone, Debug, Args)]
struct ShowArgs {
    /// Account address. The signer address is used if no address is given.
    #[arg(value_parser = parse_address)]
    address: Option<Address>,
}

/// Account commands handler.
pub async fn handle_account(cli: Cli, args: &AccountArgs) -> anyhow::Result<()> {
    let provider = get_provider(&cli)?;
    let tool = get_tool(&cli);

    match &args.command {
        AccountCommands::Create => {
            let genesis = get_genesis(&cli, &provider).await?;
            let wallet = Wallet::generate(&tool, genesis).await?;

            print_json(&json!({
                "address": wallet.address(),
                "public_key": wallet.public_key().to_string(),
                "secret_key": wallet.secret_key().expose(),
            }))
        }
        AccountCommands::Show(args) => {
            let address = match &args.address {
                Some(addr) => addr.clone(),
                None => get_wallet(&cli, &provider, &tool).await?.address().clone(),
            };
            let state = Account::state(&provider, &address).await?;

            print_json(&json!({
                "address": address,
                "counter": state.counter(),
                "value": state.value,
                "pools": state.pools(),
            }))
        }
    }
}
