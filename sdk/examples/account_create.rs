// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::env;

use anyhow::anyhow;

use casper_signer::{GenesisHash, Jcli, Wallet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(anyhow!("missing genesis block hash"));
    }
    let genesis: GenesisHash = args[1].parse()?;

    // Uses `jcli` from PATH
    let wallet = Wallet::generate(&Jcli::default(), genesis).await?;

    println!("Secret key: {}", wallet.secret_key().expose());
    println!("Public key: {}", wallet.public_key());
    println!("Address: {}", wallet.address());

    Ok(())
}
