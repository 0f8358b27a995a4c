// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use async_trait::async_trait;

use crate::response::{AccountState, MessageLogEntry, Settings, StakeDistribution};
use crate::util::Address;

/// Provider for read-only node queries.
///
/// All queries are idempotent; implementations may retry them on connectivity failure.
#[async_trait]
pub trait QueryProvider: Send + Sync {
    /// Node settings, including the current fee schedule.
    async fn settings(&self) -> anyhow::Result<Settings>;

    /// Account state. Fails with [`crate::NodeError::AccountNotFound`] for unknown accounts.
    async fn account(&self, address: &Address) -> anyhow::Result<AccountState>;

    /// The node's message log, covering every fragment it knows about.
    async fn message_logs(&self) -> anyhow::Result<Vec<MessageLogEntry>>;

    /// Raw bytes of a block, e.g. the genesis block.
    async fn block(&self, id: &str) -> anyhow::Result<Vec<u8>>;

    /// Ids of the registered stake pools.
    async fn stake_pools(&self) -> anyhow::Result<Vec<String>>;

    /// Stake distribution of the current epoch.
    async fn stake(&self) -> anyhow::Result<StakeDistribution>;
}
