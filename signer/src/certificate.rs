// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::key::PublicKey;

/// A bech32 encoded certificate (`cert1...`). Opaque to the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Certificate(String);

impl Certificate {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Certificate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(anyhow!("invalid certificate"));
        }
        Ok(Certificate(s.to_string()))
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stake pool identifier (hex), also used as the pool node id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(String);

impl PoolId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PoolId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(anyhow!("invalid stake pool id '{}'", s));
        }
        Ok(PoolId(s.to_ascii_lowercase()))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters of a stake pool registration certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolRegistration {
    pub kes_public: PublicKey,
    pub vrf_public: PublicKey,
    pub owners: Vec<PublicKey>,
    pub serial: u64,
    pub start_validity: u64,
    pub management_threshold: u8,
}

impl PoolRegistration {
    /// Serial number used for pools registered by this client.
    pub const DEFAULT_SERIAL: u64 = 1010101010;

    /// A single-owner registration valid from epoch start.
    pub fn single_owner(kes_public: PublicKey, vrf_public: PublicKey, owner: PublicKey) -> Self {
        PoolRegistration {
            kes_public,
            vrf_public,
            owners: vec![owner],
            serial: Self::DEFAULT_SERIAL,
            start_validity: 0,
            management_threshold: 1,
        }
    }
}
