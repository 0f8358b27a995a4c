// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::anyhow;
use serde::Serialize;

use casper_provider::{
    tx::FragmentId,
    util::{Address, InvalidAmount},
    NodeError, Provider,
};
use casper_signer::{SigningTool, Wallet};

use crate::account::{Account, NonceRange};
use crate::broadcast::submit;
use crate::confirmation::{ConfirmationBatch, ConfirmationReport, ConfirmationTracker, Outcome};
use crate::ledger::FragmentLedger;
use crate::progress_bar::BatchProgressBar;
use crate::transaction::Payload;

/// Arguments for [`Transfer::send_batch`].
#[derive(Clone, Debug)]
pub struct BatchArgs {
    pub to: Address,
    pub amount: u64,
    /// Number of identical transfers to send.
    pub rounds: u64,
    /// Track each fragment before sending the next.
    pub await_each: bool,
    /// Hide the progress display.
    pub quiet: bool,
}

/// A fragment the node accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SentFragment {
    pub nonce: u64,
    pub id: FragmentId,
}

/// A transaction that was never accepted by the node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedTransaction {
    pub nonce: u64,
    pub error: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchReport {
    pub nonces: NonceRange,
    pub sent: Vec<SentFragment>,
    pub failed: Vec<FailedTransaction>,
    pub confirmation: ConfirmationReport,
    /// Set when tracking stopped on an error. Sent fragments stay in the ledger.
    pub tracking_error: Option<String>,
}

impl BatchReport {
    /// True if some transactions of the batch could not be sent or tracked.
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() || self.tracking_error.is_some()
    }

    fn record_tracking_error(&mut self, fragments: Vec<FragmentId>, err: anyhow::Error) {
        let error = format!("{:#}", err);
        tracing::warn!(fragments = fragments.len(), error = %error, "tracking failed");
        self.confirmation.merge(ConfirmationReport::failed(fragments));
        self.tracking_error = Some(error);
    }

    /// Ids of the sent fragments, in nonce order.
    pub fn fragment_ids(&self) -> Vec<FragmentId> {
        self.sent.iter().map(|s| s.id.clone()).collect()
    }
}

/// A static wrapper around value transfers.
pub struct Transfer {}

impl Transfer {
    /// Send `amount` to `to` and track it.
    pub async fn send(
        provider: &impl Provider,
        tool: &impl SigningTool,
        wallet: &Wallet,
        ledger: &dyn FragmentLedger,
        tracker: &ConfirmationTracker,
        to: Address,
        amount: u64,
    ) -> anyhow::Result<BatchReport> {
        let args = BatchArgs {
            to,
            amount,
            rounds: 1,
            await_each: false,
            quiet: true,
        };
        Self::send_batch(provider, tool, wallet, ledger, tracker, args).await
    }

    /// Send `args.rounds` transfers on consecutive nonces, then track them.
    ///
    /// A node outage while sending aborts the batch with an error; fragments
    /// already sent stay in the ledger for a later tracking pass. Any other send
    /// failure is recorded in the report and the batch moves on to the next nonce.
    /// A tracking failure is recorded in the report and stops the batch.
    pub async fn send_batch(
        provider: &impl Provider,
        tool: &impl SigningTool,
        wallet: &Wallet,
        ledger: &dyn FragmentLedger,
        tracker: &ConfirmationTracker,
        args: BatchArgs,
    ) -> anyhow::Result<BatchReport> {
        if args.rounds == 0 {
            return Err(anyhow!("rounds must be at least 1"));
        }
        if args.amount.checked_mul(args.rounds).is_none() {
            return Err(InvalidAmount(format!("{} x {}", args.amount, args.rounds)).into());
        }

        let nonces = Account::allocate(provider, wallet.address(), args.rounds).await?;
        let progress = BatchProgressBar::new(nonces.len(), args.quiet);
        let payload = Payload::Transfer {
            to: args.to.clone(),
            amount: args.amount,
        };

        let mut report = BatchReport {
            nonces,
            sent: Vec::new(),
            failed: Vec::new(),
            confirmation: ConfirmationReport::empty(),
            tracking_error: None,
        };

        for nonce in nonces {
            match submit(provider, tool, wallet, ledger, &payload, nonce).await {
                Ok(id) => {
                    progress.show_sent(nonce, &id);
                    report.sent.push(SentFragment {
                        nonce,
                        id: id.clone(),
                    });
                    if args.await_each {
                        let batch = ConfirmationBatch {
                            sender: wallet.address().clone(),
                            fragments: vec![id],
                            awaited_nonce: nonce + 1,
                        };
                        let result = tracker.track(provider, ledger, &batch).await;
                        let tracked = match result {
                            Ok(tracked) => tracked,
                            Err(e) => {
                                report.record_tracking_error(batch.fragments, e);
                                break;
                            }
                        };
                        progress.show_tracked(&tracked);
                        let cancelled = tracked.outcome == Outcome::Cancelled;
                        report.confirmation.merge(tracked);
                        if cancelled {
                            break;
                        }
                    }
                }
                Err(e) if NodeError::is_unreachable(&e) => {
                    progress.finish();
                    return Err(e.context(format!(
                        "batch aborted at nonce {} after {} of {} transactions",
                        nonce,
                        report.sent.len(),
                        nonces.len()
                    )));
                }
                Err(e) => {
                    tracing::warn!(nonce, error = %format!("{:#}", e), "transaction failed");
                    progress.show_failed(nonce, &e);
                    report.failed.push(FailedTransaction {
                        nonce,
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        if !args.await_each && !report.sent.is_empty() {
            let batch = ConfirmationBatch {
                sender: wallet.address().clone(),
                fragments: report.fragment_ids(),
                awaited_nonce: nonces.awaited(),
            };
            progress.show_tracking(batch.fragments.len());
            let result = tracker.track(provider, ledger, &batch).await;
            match result {
                Ok(tracked) => {
                    progress.show_tracked(&tracked);
                    report.confirmation = tracked;
                }
                Err(e) => report.record_tracking_error(batch.fragments, e),
            }
        }

        progress.finish();
        Ok(report)
    }
}
