// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Transaction lifecycle for account-based ledger nodes.
//!
//! A transaction moves through fee resolution, nonce allocation, staged
//! construction with the signing tool, broadcast, and confirmation tracking.
//! Every accepted fragment is recorded in a [`FragmentLedger`] so tracking can
//! be resumed later.

pub mod account;
pub mod broadcast;
pub mod confirmation;
pub mod fee;
pub mod ledger;
pub mod network;
pub mod pool;
mod progress;
pub mod progress_bar;
#[cfg(test)]
mod testing;
pub mod transaction;
pub mod transfer;

pub use account::{Account, NonceRange};
pub use confirmation::{
    ConfirmationBatch, ConfirmationReport, ConfirmationTracker, Outcome, PollConfig,
};
pub use ledger::{FileLedger, FragmentLedger, FragmentRecord, FragmentStatus, MemoryLedger};
pub use pool::{
    DelegationReport, PendingPool, Pool, PoolConfig, PoolSettlement, RegistrationReport,
};
pub use transaction::{BuildError, Payload, Stage, StagedTransaction, TxBuilder};
pub use transfer::{BatchArgs, BatchReport, Transfer};
