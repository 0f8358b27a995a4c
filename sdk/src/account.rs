// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::ops::Range;

use serde::Serialize;

use casper_provider::{query::QueryProvider, response::AccountState, util::Address, NodeError};

/// A static wrapper around account methods.
pub struct Account {}

impl Account {
    /// Get the spending counter (nonce) the node expects for the next transaction.
    pub async fn counter(provider: &impl QueryProvider, address: &Address) -> anyhow::Result<u64> {
        let state = provider.account(address).await?;
        Ok(state.counter())
    }

    /// Like [`Account::counter`], but an account the node does not know yet
    /// counts as zero. It has no state until its first transaction lands.
    pub async fn counter_or_zero(
        provider: &impl QueryProvider,
        address: &Address,
    ) -> anyhow::Result<u64> {
        match Self::counter(provider, address).await {
            Ok(counter) => Ok(counter),
            Err(e) if NodeError::is_account_not_found(&e) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Get the full account state: counter, balance and delegation.
    pub async fn state(
        provider: &impl QueryProvider,
        address: &Address,
    ) -> anyhow::Result<AccountState> {
        provider.account(address).await
    }

    /// Reserve `count` consecutive nonces starting at the current counter.
    ///
    /// Nothing changes on the node; the reservation holds as long as no other
    /// client spends from the same account concurrently.
    pub async fn allocate(
        provider: &impl QueryProvider,
        address: &Address,
        count: u64,
    ) -> anyhow::Result<NonceRange> {
        let start = Self::counter(provider, address).await?;
        let range = NonceRange::new(start, count);
        tracing::debug!(address = %address, start, count, "allocated nonces");
        Ok(range)
    }
}

/// Consecutive nonces `[start, start + len)` reserved for one batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NonceRange {
    start: u64,
    len: u64,
}

impl NonceRange {
    pub fn new(start: u64, len: u64) -> Self {
        NonceRange { start, len }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Counter the account reaches once every nonce in the range is spent.
    pub fn awaited(&self) -> u64 {
        self.start.saturating_add(self.len)
    }

    pub fn iter(&self) -> Range<u64> {
        self.start..self.awaited()
    }
}

impl IntoIterator for NonceRange {
    type Item = u64;
    type IntoIter = Range<u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
