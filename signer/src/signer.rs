// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::Path;

use async_trait::async_trait;

use casper_provider::{message::Message, response::FeeSchedule, util::Address};

use crate::certificate::{Certificate, PoolId, PoolRegistration};
use crate::genesis::GenesisHash;
use crate::key::{KeyKind, PublicKey, SecretKey};

/// Operations of the external signing tool.
///
/// Staging methods mutate the staging file at `staging`; the tool owns its format.
/// Every call either succeeds or returns an error carrying the tool's diagnostics.
#[async_trait]
pub trait SigningTool: Send + Sync {
    async fn generate_secret(&self, kind: KeyKind) -> anyhow::Result<SecretKey>;

    async fn public_key(&self, secret: &SecretKey) -> anyhow::Result<PublicKey>;

    async fn account_address(&self, public: &PublicKey) -> anyhow::Result<Address>;

    async fn new_transaction(&self, staging: &Path) -> anyhow::Result<()>;

    async fn add_account(&self, staging: &Path, account: &Address, value: u64)
        -> anyhow::Result<()>;

    async fn add_output(&self, staging: &Path, receiver: &Address, value: u64)
        -> anyhow::Result<()>;

    async fn add_certificate(&self, staging: &Path, cert: &Certificate) -> anyhow::Result<()>;

    async fn finalize(&self, staging: &Path) -> anyhow::Result<()>;

    /// Returns the transaction data a witness must sign.
    async fn data_for_witness(&self, staging: &Path) -> anyhow::Result<String>;

    /// Signs `data` for the account at `counter`, writing the witness to `output`.
    async fn make_witness(
        &self,
        data: &str,
        genesis: &GenesisHash,
        counter: u64,
        output: &Path,
        secret_file: &Path,
    ) -> anyhow::Result<()>;

    async fn add_witness(&self, staging: &Path, witness: &Path) -> anyhow::Result<()>;

    /// Human-readable summary of the staged transaction, validated against `fees`.
    async fn info(&self, staging: &Path, fees: &FeeSchedule) -> anyhow::Result<String>;

    async fn seal(&self, staging: &Path) -> anyhow::Result<()>;

    /// Authorizes the staged certificate with the key at `secret_file`.
    async fn auth(&self, staging: &Path, secret_file: &Path) -> anyhow::Result<()>;

    async fn to_message(&self, staging: &Path) -> anyhow::Result<Message>;

    async fn pool_registration(&self, reg: &PoolRegistration) -> anyhow::Result<Certificate>;

    async fn stake_delegation(
        &self,
        owner: &PublicKey,
        pool: &PoolId,
    ) -> anyhow::Result<Certificate>;

    async fn pool_id(&self, cert: &Certificate) -> anyhow::Result<PoolId>;

    /// Human-readable (YAML) rendering of a raw genesis block.
    async fn decode_genesis(&self, block: &[u8]) -> anyhow::Result<String>;
}
