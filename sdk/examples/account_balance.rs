// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::env;

use anyhow::anyhow;

use casper_provider::{rest::RestProvider, util::parse_address};
use casper_sdk::{network::DEFAULT_NODE_URL, Account};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(anyhow!("missing account address"));
    }
    let address = parse_address(&args[1])?;

    // Use a local node
    let provider = RestProvider::new_http(DEFAULT_NODE_URL.parse()?, None)?;

    let state = Account::state(&provider, &address).await?;

    println!("Balance of {}: {}", address, state.value);
    println!("Counter: {}", state.counter());

    Ok(())
}
