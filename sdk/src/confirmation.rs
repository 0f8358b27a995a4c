// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Tracks broadcast fragments until the node settles them.
//!
//! The tracker polls the node's message log and moves each fragment through
//! `Broadcast -> Pending -> Confirmed | Rejected`. It also watches the sender's
//! spending counter: once it reaches the batch's awaited nonce, whatever is still
//! outstanding is taken as confirmed.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use casper_provider::{
    query::QueryProvider, response::LogStatus, tx::FragmentId, util::Address, NodeError,
};

use crate::account::Account;
use crate::ledger::{FragmentLedger, FragmentStatus};
use crate::network::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_MAX_INTERVAL, DEFAULT_POLL_TIMEOUT};

/// How often and for how long to poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between polls while the node is reachable.
    pub interval: Duration,
    /// Upper bound for the delay while the node is unreachable.
    pub max_interval: Duration,
    /// Growth of the delay after each failed poll.
    pub backoff_factor: u32,
    /// Give up after this long.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: DEFAULT_POLL_INTERVAL,
            max_interval: DEFAULT_POLL_MAX_INTERVAL,
            backoff_factor: 2,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Fragments from one sender, tracked together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationBatch {
    pub sender: Address,
    pub fragments: Vec<FragmentId>,
    /// Sender's counter once every fragment has been applied.
    pub awaited_nonce: u64,
}

/// Why tracking stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    AllSettled,
    NonceReached,
    TimedOut,
    Cancelled,
    /// Tracking stopped on an error other than an unreachable node.
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfirmationReport {
    pub confirmed: Vec<FragmentId>,
    pub rejected: Vec<(FragmentId, String)>,
    /// Fragments still unsettled when tracking stopped.
    pub pending: Vec<FragmentId>,
    pub outcome: Outcome,
}

impl ConfirmationReport {
    /// An empty report for a batch with nothing to track.
    pub fn empty() -> Self {
        ConfirmationReport {
            confirmed: Vec::new(),
            rejected: Vec::new(),
            pending: Vec::new(),
            outcome: Outcome::AllSettled,
        }
    }

    /// A report for fragments whose tracking stopped on an error.
    pub fn failed(pending: Vec<FragmentId>) -> Self {
        ConfirmationReport {
            pending,
            outcome: Outcome::Failed,
            ..ConfirmationReport::empty()
        }
    }

    /// Fold another report into this one, keeping the least successful outcome.
    pub fn merge(&mut self, other: ConfirmationReport) {
        self.confirmed.extend(other.confirmed);
        self.rejected.extend(other.rejected);
        self.pending.extend(other.pending);
        self.outcome = self.outcome.max(other.outcome);
    }

    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Polls the node until a [`ConfirmationBatch`] settles, times out or is cancelled.
#[derive(Clone, Debug, Default)]
pub struct ConfirmationTracker {
    config: PollConfig,
    cancel: CancellationToken,
}

impl ConfirmationTracker {
    pub fn new(config: PollConfig) -> Self {
        ConfirmationTracker {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop tracking when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn track(
        &self,
        provider: &impl QueryProvider,
        ledger: &dyn FragmentLedger,
        batch: &ConfirmationBatch,
    ) -> anyhow::Result<ConfirmationReport> {
        // A timeout too large to represent never expires.
        let deadline = Instant::now().checked_add(self.config.timeout);
        let mut tracked = Tracked::load(ledger, &batch.fragments).await?;
        let mut interval = self.config.interval;

        tracing::info!(
            sender = %batch.sender,
            fragments = batch.fragments.len(),
            awaited_nonce = batch.awaited_nonce,
            "tracking fragments"
        );

        let outcome = loop {
            if self.cancel.is_cancelled() {
                break Outcome::Cancelled;
            }

            match self.poll(provider, ledger, batch, &mut tracked).await {
                Ok(Some(outcome)) => break outcome,
                Ok(None) => interval = self.config.interval,
                Err(e) if NodeError::is_unreachable(&e) => {
                    interval = self.backoff(interval);
                    tracing::warn!(error = %e, retry_in = ?interval, "node unreachable while tracking");
                }
                Err(e) => return Err(e),
            }

            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Outcome::TimedOut;
                    }
                    interval.min(deadline - now)
                }
                None => interval,
            };
            tokio::select! {
                _ = self.cancel.cancelled() => break Outcome::Cancelled,
                _ = tokio::time::sleep(wait) => {}
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break Outcome::TimedOut;
            }
        };

        let report = tracked.report(outcome);
        tracing::info!(
            confirmed = report.confirmed.len(),
            rejected = report.rejected.len(),
            pending = report.pending.len(),
            outcome = ?report.outcome,
            "tracking finished"
        );
        Ok(report)
    }

    /// One iteration. Returns the outcome once the batch is done.
    async fn poll(
        &self,
        provider: &impl QueryProvider,
        ledger: &dyn FragmentLedger,
        batch: &ConfirmationBatch,
        tracked: &mut Tracked,
    ) -> anyhow::Result<Option<Outcome>> {
        let entries = provider.message_logs().await?;
        for entry in entries {
            tracked.observe(&entry.fragment_id, &entry.status);
        }
        tracked.persist(ledger).await?;

        if tracked.all_terminal() {
            return Ok(Some(Outcome::AllSettled));
        }

        let counter = Account::counter_or_zero(provider, &batch.sender).await?;
        if counter >= batch.awaited_nonce {
            tracked.confirm_by_nonce(counter);
            tracked.persist(ledger).await?;
            return Ok(Some(Outcome::NonceReached));
        }
        Ok(None)
    }

    fn backoff(&self, interval: Duration) -> Duration {
        interval
            .saturating_mul(self.config.backoff_factor.max(1))
            .min(self.config.max_interval)
            .max(self.config.interval)
    }
}

struct Fragment {
    id: FragmentId,
    status: FragmentStatus,
    persisted: Option<FragmentStatus>,
}

/// Local view of the batch, in broadcast order.
struct Tracked {
    fragments: Vec<Fragment>,
    index: HashMap<FragmentId, usize>,
}

impl Tracked {
    async fn load(ledger: &dyn FragmentLedger, ids: &[FragmentId]) -> anyhow::Result<Self> {
        let mut fragments = Vec::with_capacity(ids.len());
        let mut index = HashMap::with_capacity(ids.len());
        for id in ids {
            if index.contains_key(id) {
                continue;
            }
            let persisted = ledger.fragment(id).await?.map(|r| r.status);
            index.insert(id.clone(), fragments.len());
            fragments.push(Fragment {
                id: id.clone(),
                status: persisted.clone().unwrap_or(FragmentStatus::Broadcast),
                persisted,
            });
        }
        Ok(Tracked { fragments, index })
    }

    fn observe(&mut self, id: &FragmentId, status: &LogStatus) {
        let Some(&i) = self.index.get(id) else {
            return;
        };
        let fragment = &mut self.fragments[i];
        if fragment.status.is_terminal() {
            return;
        }
        let next = match status {
            LogStatus::Pending => FragmentStatus::Pending,
            LogStatus::InABlock { block, .. } => {
                tracing::info!(fragment = %id, block = %block, "fragment confirmed");
                FragmentStatus::Confirmed
            }
            LogStatus::Rejected { reason } => {
                tracing::info!(fragment = %id, reason = %reason, "fragment rejected");
                FragmentStatus::Rejected(reason.clone())
            }
            LogStatus::Other(value) => {
                tracing::debug!(fragment = %id, status = %value, "unrecognized fragment status");
                return;
            }
        };
        if next == FragmentStatus::Pending && fragment.status != FragmentStatus::Pending {
            tracing::info!(fragment = %id, "fragment pending");
        }
        fragment.status = next;
    }

    fn confirm_by_nonce(&mut self, counter: u64) {
        for fragment in self.fragments.iter_mut() {
            if !fragment.status.is_terminal() {
                tracing::info!(fragment = %fragment.id, counter, "fragment confirmed by nonce");
                fragment.status = FragmentStatus::Confirmed;
            }
        }
    }

    /// Write changed statuses. Unchanged statuses are never rewritten.
    async fn persist(&mut self, ledger: &dyn FragmentLedger) -> anyhow::Result<()> {
        for fragment in self.fragments.iter_mut() {
            if fragment.persisted.as_ref() == Some(&fragment.status) {
                continue;
            }
            if fragment.persisted.is_none() && fragment.status == FragmentStatus::Broadcast {
                continue;
            }
            ledger
                .update_fragment_status(&fragment.id, &fragment.status)
                .await?;
            fragment.persisted = Some(fragment.status.clone());
        }
        Ok(())
    }

    fn all_terminal(&self) -> bool {
        self.fragments.iter().all(|f| f.status.is_terminal())
    }

    fn report(self, outcome: Outcome) -> ConfirmationReport {
        let mut report = ConfirmationReport {
            outcome,
            ..ConfirmationReport::empty()
        };
        for fragment in self.fragments {
            match fragment.status {
                FragmentStatus::Confirmed => report.confirmed.push(fragment.id),
                FragmentStatus::Rejected(reason) => report.rejected.push((fragment.id, reason)),
                FragmentStatus::Broadcast | FragmentStatus::Pending => {
                    report.pending.push(fragment.id)
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use casper_provider::response::{AccountState, FeeSchedule};

    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::testing::{fragment_id, sender, MockNode};

    fn fast() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(4),
            backoff_factor: 2,
            timeout: Duration::from_secs(5),
        }
    }

    async fn setup(ids: &[FragmentId]) -> (MockNode, MemoryLedger) {
        let node = MockNode::new(FeeSchedule::default());
        node.set_account(&sender(), AccountState::new(0, 1000));
        let ledger = MemoryLedger::new();
        for id in ids {
            ledger.save_fragment(id, &sender(), None, None).await.unwrap();
        }
        (node, ledger)
    }

    fn batch(ids: &[FragmentId], awaited_nonce: u64) -> ConfirmationBatch {
        ConfirmationBatch {
            sender: sender(),
            fragments: ids.to_vec(),
            awaited_nonce,
        }
    }

    fn in_a_block() -> LogStatus {
        LogStatus::InABlock {
            date: "1.2".into(),
            block: "ab".into(),
        }
    }

    #[tokio::test]
    async fn confirms_after_pending() {
        let id = fragment_id(1);
        let (node, ledger) = setup(&[id.clone()]).await;
        node.script_status(
            &id,
            vec![LogStatus::Pending, LogStatus::Pending, in_a_block()],
        );

        let report = ConfirmationTracker::new(fast())
            .track(&node, &ledger, &batch(&[id.clone()], 100))
            .await
            .unwrap();

        assert_eq!(report.outcome, Outcome::AllSettled);
        assert_eq!(report.confirmed, vec![id.clone()]);
        assert_eq!(
            ledger.writes().await,
            vec![
                (id.clone(), FragmentStatus::Broadcast),
                (id.clone(), FragmentStatus::Pending),
                (id.clone(), FragmentStatus::Confirmed),
            ]
        );
        assert_eq!(node.log_polls(), 3);
    }

    #[tokio::test]
    async fn stops_on_rejection_without_polling_again() {
        let id = fragment_id(1);
        let (node, ledger) = setup(&[id.clone()]).await;
        node.script_status(
            &id,
            vec![LogStatus::Rejected {
                reason: "pool full".into(),
            }],
        );

        let report = ConfirmationTracker::new(fast())
            .track(&node, &ledger, &batch(&[id.clone()], 100))
            .await
            .unwrap();

        assert_eq!(report.rejected, vec![(id.clone(), "pool full".to_string())]);
        assert_eq!(node.log_polls(), 1);
        let record = ledger.fragment(&id).await.unwrap().unwrap();
        assert_eq!(record.status, FragmentStatus::Rejected("pool full".into()));
    }

    #[tokio::test]
    async fn confirms_remaining_fragments_by_nonce() {
        let ids = [fragment_id(1), fragment_id(2)];
        let (node, ledger) = setup(&ids).await;
        node.script_status(&ids[0], vec![in_a_block()]);
        node.script_status(&ids[1], vec![LogStatus::Pending]);
        node.script_counters(&sender(), vec![1, 2]);

        let report = ConfirmationTracker::new(fast())
            .track(&node, &ledger, &batch(&ids, 2))
            .await
            .unwrap();

        assert_eq!(report.outcome, Outcome::NonceReached);
        assert_eq!(report.confirmed, ids.to_vec());
        assert!(report.pending.is_empty());
    }

    #[tokio::test]
    async fn ignores_unknown_fragments_and_statuses() {
        let id = fragment_id(1);
        let (node, ledger) = setup(&[id.clone()]).await;
        node.script_status(&fragment_id(9), vec![in_a_block()]);
        node.script_status(
            &id,
            vec![
                LogStatus::Other(serde_json::json!({"Dropped": {}})),
                in_a_block(),
            ],
        );

        let report = ConfirmationTracker::new(fast())
            .track(&node, &ledger, &batch(&[id.clone()], 100))
            .await
            .unwrap();
        assert_eq!(report.confirmed, vec![id.clone()]);
        assert_eq!(ledger.writes().await.len(), 2);
    }

    #[tokio::test]
    async fn times_out_leaving_fragments_pending() {
        let id = fragment_id(1);
        let (node, ledger) = setup(&[id.clone()]).await;
        node.script_status(&id, vec![LogStatus::Pending]);

        let config = PollConfig {
            timeout: Duration::from_millis(30),
            ..fast()
        };
        let report = ConfirmationTracker::new(config)
            .track(&node, &ledger, &batch(&[id.clone()], 100))
            .await
            .unwrap();

        assert_eq!(report.outcome, Outcome::TimedOut);
        assert_eq!(report.pending, vec![id.clone()]);
        let record = ledger.fragment(&id).await.unwrap().unwrap();
        assert_eq!(record.status, FragmentStatus::Pending);
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let id = fragment_id(1);
        let (node, ledger) = setup(&[id.clone()]).await;
        node.script_status(&id, vec![LogStatus::Pending]);

        let cancel = CancellationToken::new();
        let tracker = ConfirmationTracker::new(PollConfig {
            interval: Duration::from_secs(60),
            ..fast()
        })
        .with_cancellation(cancel.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });
        let report = tracker
            .track(&node, &ledger, &batch(&[id.clone()], 100))
            .await
            .unwrap();
        canceller.await.unwrap();

        assert_eq!(report.outcome, Outcome::Cancelled);
        assert_eq!(report.pending, vec![id]);
    }

    #[tokio::test]
    async fn keeps_polling_through_outages() {
        let id = fragment_id(1);
        let (node, ledger) = setup(&[id.clone()]).await;
        node.script_status(&id, vec![in_a_block()]);
        node.fail_log_polls(2);

        let report = ConfirmationTracker::new(fast())
            .track(&node, &ledger, &batch(&[id.clone()], 100))
            .await
            .unwrap();

        assert_eq!(report.confirmed, vec![id]);
        assert_eq!(node.log_polls(), 3);
    }

    #[tokio::test]
    async fn unbounded_timeout_tracks_until_settled() {
        let id = fragment_id(1);
        let (node, ledger) = setup(&[id.clone()]).await;
        node.script_status(&id, vec![LogStatus::Pending, in_a_block()]);

        let config = PollConfig {
            timeout: Duration::MAX,
            ..fast()
        };
        let report = ConfirmationTracker::new(config)
            .track(&node, &ledger, &batch(&[id.clone()], 100))
            .await
            .unwrap();

        assert_eq!(report.outcome, Outcome::AllSettled);
        assert_eq!(report.confirmed, vec![id]);
    }

    #[test]
    fn backoff_grows_to_the_cap() {
        let tracker = ConfirmationTracker::new(fast());
        let d = tracker.backoff(Duration::from_millis(1));
        assert_eq!(d, Duration::from_millis(2));
        let d = tracker.backoff(Duration::from_millis(3));
        assert_eq!(d, Duration::from_millis(4));
    }

    #[test]
    fn merged_reports_keep_the_worst_outcome() {
        let mut report = ConfirmationReport::empty();
        report.merge(ConfirmationReport {
            confirmed: vec![fragment_id(1)],
            outcome: Outcome::TimedOut,
            ..ConfirmationReport::empty()
        });
        assert_eq!(report.confirmed.len(), 1);
        assert_eq!(report.outcome, Outcome::TimedOut);
    }
}
