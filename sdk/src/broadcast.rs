// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use casper_provider::{message::Message, tx::FragmentId, Provider, TxProvider};
use casper_signer::{SigningTool, Wallet};

use crate::fee::resolve_fees;
use crate::ledger::FragmentLedger;
use crate::transaction::{Payload, TxBuilder};

/// Post a serialized message to the node.
///
/// Never retried: a resend could be applied twice under a new fragment id.
pub async fn broadcast(provider: &impl TxProvider, message: &Message) -> anyhow::Result<FragmentId> {
    let id = provider.post_message(message).await?;
    tracing::info!(fragment = %id, bytes = message.len(), "broadcast fragment");
    Ok(id)
}

/// Build, broadcast and record one transaction at `nonce`.
///
/// Fees are fetched fresh for every transaction. The fragment reaches the ledger
/// only once the node has accepted it.
pub async fn submit(
    provider: &impl Provider,
    tool: &impl SigningTool,
    wallet: &Wallet,
    ledger: &dyn FragmentLedger,
    payload: &Payload,
    nonce: u64,
) -> anyhow::Result<FragmentId> {
    let fees = resolve_fees(provider).await?;
    let message = TxBuilder::new(tool, wallet, fees)
        .build(payload, nonce)
        .await?;
    let id = broadcast(provider, &message).await?;
    ledger
        .save_fragment(&id, wallet.address(), payload.receiver(), payload.amount())
        .await?;
    Ok(id)
}
