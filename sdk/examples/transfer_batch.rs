// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::env;

use anyhow::anyhow;

use casper_provider::{
    rest::RestProvider,
    util::{parse_address, parse_amount},
    QueryProvider,
};
use casper_sdk::{
    network::DEFAULT_NODE_URL, BatchArgs, ConfirmationTracker, MemoryLedger, Transfer,
};
use casper_signer::{Jcli, SecretKey, Wallet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        return Err(anyhow!("usage: transfer_batch <secret key> <to> <amount>"));
    }
    let secret: SecretKey = args[1].parse()?;
    let to = parse_address(&args[2])?;
    let amount = parse_amount(&args[3])?;

    // Use a local node and `jcli` from PATH
    let provider = RestProvider::new_http(DEFAULT_NODE_URL.parse()?, None)?;
    let tool = Jcli::default();

    let genesis = provider
        .settings()
        .await?
        .block0_hash
        .ok_or_else(|| anyhow!("node did not report a genesis hash"))?
        .parse()?;
    let wallet = Wallet::from_secret(&tool, secret, genesis).await?;

    // Send three transfers on consecutive nonces and wait for all of them
    let ledger = MemoryLedger::new();
    let batch = BatchArgs {
        to,
        amount,
        rounds: 3,
        await_each: false,
        quiet: false,
    };
    let report = Transfer::send_batch(
        &provider,
        &tool,
        &wallet,
        &ledger,
        &ConfirmationTracker::default(),
        batch,
    )
    .await?;

    println!("Nonces: {:?}", report.nonces.iter().collect::<Vec<_>>());
    println!("Confirmed: {:?}", report.confirmation.confirmed);
    println!("Rejected: {:?}", report.confirmation.rejected);

    Ok(())
}
