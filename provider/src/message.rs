// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Context;
use bytes::Bytes;

/// A signed, serialized fragment ready to be posted to a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Message(Bytes);

impl Message {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Decode the hex form printed by the signing tool's `to-message` step.
    pub fn from_hex(s: &str) -> anyhow::Result<Self> {
        let raw = hex::decode(s.trim()).context("message is not valid hex")?;
        Ok(Self(Bytes::from(raw)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl From<Message> for Bytes {
    fn from(m: Message) -> Self {
        m.0
    }
}
