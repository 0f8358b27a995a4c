// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt::Display;
use std::str::FromStr;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Identifier the node assigns to a posted fragment (hex encoded hash).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(String);

impl FragmentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for FragmentId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Nodes answer with the id as plain text, sometimes padded or quoted.
        let s = s.trim().trim_matches('"');
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(anyhow!("invalid fragment id '{}'", s));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl Display for FragmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider for submitting fragments.
#[async_trait]
pub trait TxProvider: Send + Sync {
    /// Post a signed message to the node's pending pool.
    ///
    /// Fails with [`crate::NodeError::BroadcastRejected`] when the node refuses the
    /// message and [`crate::NodeError::NodeUnreachable`] on connectivity failure.
    /// Never retried.
    async fn post_message(&self, message: &Message) -> anyhow::Result<FragmentId>;
}
