// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Key algorithms understood by the signing tool.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Ed25519,
    Ed25519Extended,
    /// Key-evolving signature key used by stake pools to sign blocks.
    SumEd25519_12,
    /// Verifiable random function key used by stake pools for leader election.
    Curve25519_2HashDH,
}

impl KeyKind {
    /// The name the signing tool expects for `--type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Ed25519 => "ed25519",
            KeyKind::Ed25519Extended => "ed25519extended",
            KeyKind::SumEd25519_12 => "SumEd25519_12",
            KeyKind::Curve25519_2HashDH => "Curve25519_2HashDH",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bech32 encoded secret key. Wiped from memory on drop and never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    /// The encoded secret. Only hand this to the signing tool or to durable pool config.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

impl FromStr for SecretKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_secret_key(s)
    }
}

/// Parse a bech32 secret key (e.g. `ed25519e_sk1...`), dropping surrounding whitespace.
pub fn parse_secret_key(s: &str) -> anyhow::Result<SecretKey> {
    let s = s.trim();
    if s.is_empty() {
        return Err(anyhow!("secret key is empty"));
    }
    if s.chars().any(char::is_whitespace) || !s.contains("sk1") {
        return Err(anyhow!("secret key is not a bech32 secret key"));
    }
    Ok(SecretKey(s.to_string()))
}

/// A bech32 encoded public key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(String);

impl PublicKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PublicKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(anyhow!("invalid public key '{}'", s));
        }
        Ok(PublicKey(s.to_string()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
