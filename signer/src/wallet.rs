// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use casper_provider::util::Address;

use crate::genesis::GenesisHash;
use crate::key::{KeyKind, PublicKey, SecretKey};
use crate::signer::SigningTool;

/// An account's key material bound to one chain.
///
/// The wallet does not track the spending counter; it is read from the node
/// before every batch.
#[derive(Debug, Clone)]
pub struct Wallet {
    address: Address,
    public: PublicKey,
    secret: SecretKey,
    genesis: GenesisHash,
}

impl Wallet {
    /// Create a fresh account key.
    pub async fn generate(tool: &impl SigningTool, genesis: GenesisHash) -> anyhow::Result<Self> {
        let secret = tool.generate_secret(KeyKind::Ed25519Extended).await?;
        let wallet = Self::from_secret(tool, secret, genesis).await?;
        tracing::info!(address = %wallet.address, "generated account");
        Ok(wallet)
    }

    /// Derive the public key and address of an existing secret.
    pub async fn from_secret(
        tool: &impl SigningTool,
        secret: SecretKey,
        genesis: GenesisHash,
    ) -> anyhow::Result<Self> {
        let public = tool.public_key(&secret).await?;
        let address = tool.account_address(&public).await?;
        Ok(Wallet {
            address,
            public,
            secret,
            genesis,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn genesis(&self) -> &GenesisHash {
        &self.genesis
    }
}
