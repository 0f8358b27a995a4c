// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod certificate;
mod genesis;
mod jcli;
pub mod key;
mod signer;
pub mod staging;
mod wallet;

pub use certificate::{Certificate, PoolId, PoolRegistration};
pub use genesis::GenesisHash;
pub use jcli::{Jcli, ToolError};
pub use key::{KeyKind, PublicKey, SecretKey};
pub use signer::SigningTool;
pub use staging::{SecretFile, StagingArea};
pub use wallet::Wallet;
