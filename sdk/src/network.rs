// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use casper_provider::query::QueryProvider;
use casper_signer::{GenesisHash, SigningTool};

pub const DEFAULT_NODE_URL: &str = "http://127.0.0.1:3100";
pub const DEFAULT_JCLI: &str = "jcli";

pub const DEFAULT_LEDGER_PATH: &str = "fragments.json";
pub const DEFAULT_POOLS_DIR: &str = "pools";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_MAX_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);

/// Fetch the raw genesis block the chain identity refers to.
pub async fn genesis_block(
    provider: &impl QueryProvider,
    genesis: &GenesisHash,
) -> anyhow::Result<Vec<u8>> {
    provider.block(genesis.as_str()).await
}

/// Fetch the genesis block and have the signing tool decode it.
pub async fn decode_genesis(
    provider: &impl QueryProvider,
    tool: &impl SigningTool,
    genesis: &GenesisHash,
) -> anyhow::Result<String> {
    let block = genesis_block(provider, genesis).await?;
    tracing::debug!(hash = %genesis, bytes = block.len(), "decoding genesis block");
    tool.decode_genesis(&block).await
}
