// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use thiserror::Error;

use crate::util::Address;

/// Failures reported while talking to a node.
///
/// Provider methods return [`anyhow::Result`]; use [`NodeError::find`] to recover the kind.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node could not be reached (connection refused, timeout, dropped connection).
    #[error("node unreachable: {0}")]
    NodeUnreachable(String),
    /// The node has no state for the account, i.e. it never received funds.
    #[error("account {0} not found; it has not yet received a transaction or the node is offline")]
    AccountNotFound(Address),
    /// The node refused a message outright (malformed, insufficient fee, stale nonce).
    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),
    /// The node answered, but not with something we understand.
    #[error("unexpected response from {endpoint}: {message}")]
    UnexpectedResponse { endpoint: String, message: String },
}

impl NodeError {
    /// Find a [`NodeError`] anywhere in the error chain.
    pub fn find(err: &anyhow::Error) -> Option<&NodeError> {
        err.chain().find_map(|e| e.downcast_ref::<NodeError>())
    }

    /// Returns true if the error (or its cause) is a connectivity failure.
    pub fn is_unreachable(err: &anyhow::Error) -> bool {
        matches!(Self::find(err), Some(NodeError::NodeUnreachable(_)))
    }

    /// Returns true if the error (or its cause) reports an unknown account.
    pub fn is_account_not_found(err: &anyhow::Error) -> bool {
        matches!(Self::find(err), Some(NodeError::AccountNotFound(_)))
    }

    /// Returns true if the error (or its cause) is a refused broadcast.
    pub fn is_broadcast_rejected(err: &anyhow::Error) -> bool {
        matches!(Self::find(err), Some(NodeError::BroadcastRejected(_)))
    }
}
