// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Hash of the chain's genesis block. Witnesses are bound to it, so a transaction
/// signed for one chain cannot be replayed on another.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GenesisHash(String);

impl GenesisHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for GenesisHash {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(anyhow!(
                "invalid genesis hash '{}': expected 64 hex characters",
                s
            ));
        }
        Ok(GenesisHash(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for GenesisHash {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<GenesisHash> for String {
    fn from(g: GenesisHash) -> Self {
        g.0
    }
}

impl fmt::Display for GenesisHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
