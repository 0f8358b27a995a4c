// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt::Display;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An account address as printed by the signing tool (bech32, e.g. `ca1s...`).
///
/// The address is opaque to this crate; only basic shape is checked.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse an account address from string, dropping surrounding whitespace and newlines.
pub fn parse_address(s: &str) -> anyhow::Result<Address> {
    let s = s.trim();
    if s.is_empty() {
        return Err(anyhow!("address is empty"));
    }
    if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(anyhow!("address '{}' contains whitespace", s));
    }
    Ok(Address(s.to_string()))
}

/// An amount that is not a plain non-negative integer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid amount '{0}': amounts must be non-negative integers")]
pub struct InvalidAmount(pub String);

/// Parse a token amount from string.
///
/// Amounts are integers in the ledger's smallest unit; decimals, signs and
/// anything that does not fit in a `u64` are rejected.
pub fn parse_amount(s: &str) -> Result<u64, InvalidAmount> {
    let trimmed = s.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InvalidAmount(s.to_string()));
    }
    trimmed.parse::<u64>().map_err(|_| InvalidAmount(s.to_string()))
}
