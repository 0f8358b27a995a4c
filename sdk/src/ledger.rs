// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Durable record of broadcast fragments and their confirmation status.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use casper_provider::{tx::FragmentId, util::Address};

/// Where a fragment is in its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason")]
pub enum FragmentStatus {
    /// Accepted by the node's REST endpoint, not yet seen in its log.
    Broadcast,
    Pending,
    Confirmed,
    Rejected(String),
}

impl FragmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FragmentStatus::Confirmed | FragmentStatus::Rejected(_))
    }
}

impl fmt::Display for FragmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentStatus::Broadcast => f.write_str("broadcast"),
            FragmentStatus::Pending => f.write_str("pending"),
            FragmentStatus::Confirmed => f.write_str("confirmed"),
            FragmentStatus::Rejected(reason) => write!(f, "rejected ({})", reason),
        }
    }
}

/// A broadcast fragment. Certificate transactions have no receiver or amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentRecord {
    pub id: FragmentId,
    pub sender: Address,
    pub receiver: Option<Address>,
    pub amount: Option<u64>,
    pub status: FragmentStatus,
}

/// Storage for fragment records.
///
/// Implementations must be safe to share between tasks.
#[async_trait]
pub trait FragmentLedger: Send + Sync {
    /// Record a freshly broadcast fragment with status [`FragmentStatus::Broadcast`].
    async fn save_fragment(
        &self,
        id: &FragmentId,
        sender: &Address,
        receiver: Option<&Address>,
        amount: Option<u64>,
    ) -> anyhow::Result<()>;

    async fn update_fragment_status(
        &self,
        id: &FragmentId,
        status: &FragmentStatus,
    ) -> anyhow::Result<()>;

    async fn fragment(&self, id: &FragmentId) -> anyhow::Result<Option<FragmentRecord>>;

    /// Fragments not yet confirmed or rejected, in broadcast order.
    async fn outstanding(&self) -> anyhow::Result<Vec<FragmentRecord>>;
}

fn new_record(
    id: &FragmentId,
    sender: &Address,
    receiver: Option<&Address>,
    amount: Option<u64>,
) -> FragmentRecord {
    FragmentRecord {
        id: id.clone(),
        sender: sender.clone(),
        receiver: receiver.cloned(),
        amount,
        status: FragmentStatus::Broadcast,
    }
}

fn upsert(records: &mut Vec<FragmentRecord>, record: FragmentRecord) {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

fn set_status(
    records: &mut [FragmentRecord],
    id: &FragmentId,
    status: &FragmentStatus,
) -> anyhow::Result<()> {
    let record = records
        .iter_mut()
        .find(|r| &r.id == id)
        .ok_or_else(|| anyhow!("fragment {} is not in the ledger", id))?;
    record.status = status.clone();
    Ok(())
}

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<FragmentRecord>,
    writes: Vec<(FragmentId, FragmentStatus)>,
}

/// In-memory ledger. Clones share the same records.
#[derive(Clone, Debug, Default)]
pub struct MemoryLedger {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write so far, in order, including the initial `Broadcast`.
    ///
    /// Kept for inspection: it shows which status changes actually reached
    /// storage, e.g. that an unchanged status was never rewritten.
    pub async fn writes(&self) -> Vec<(FragmentId, FragmentStatus)> {
        self.inner.lock().await.writes.clone()
    }

    pub async fn records(&self) -> Vec<FragmentRecord> {
        self.inner.lock().await.records.clone()
    }
}

#[async_trait]
impl FragmentLedger for MemoryLedger {
    async fn save_fragment(
        &self,
        id: &FragmentId,
        sender: &Address,
        receiver: Option<&Address>,
        amount: Option<u64>,
    ) -> anyhow::Result<()> {
        let mut state = self.inner.lock().await;
        upsert(&mut state.records, new_record(id, sender, receiver, amount));
        state.writes.push((id.clone(), FragmentStatus::Broadcast));
        Ok(())
    }

    async fn update_fragment_status(
        &self,
        id: &FragmentId,
        status: &FragmentStatus,
    ) -> anyhow::Result<()> {
        let mut state = self.inner.lock().await;
        set_status(&mut state.records, id, status)?;
        state.writes.push((id.clone(), status.clone()));
        Ok(())
    }

    async fn fragment(&self, id: &FragmentId) -> anyhow::Result<Option<FragmentRecord>> {
        let state = self.inner.lock().await;
        Ok(state.records.iter().find(|r| &r.id == id).cloned())
    }

    async fn outstanding(&self) -> anyhow::Result<Vec<FragmentRecord>> {
        let state = self.inner.lock().await;
        Ok(state
            .records
            .iter()
            .filter(|r| !r.status.is_terminal())
            .cloned()
            .collect())
    }
}

/// Ledger kept as a JSON array in a single file.
///
/// Each write rewrites the whole document through a sibling temporary file and
/// a rename, so a crash never leaves a truncated ledger behind.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileLedger {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> anyhow::Result<Vec<FragmentRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("failed to parse ledger {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(anyhow::Error::from(e)
                .context(format!("failed to read ledger {}", self.path.display()))),
        }
    }

    async fn store(&self, records: &[FragmentRecord]) -> anyhow::Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let bytes = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace ledger {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl FragmentLedger for FileLedger {
    async fn save_fragment(
        &self,
        id: &FragmentId,
        sender: &Address,
        receiver: Option<&Address>,
        amount: Option<u64>,
    ) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        upsert(&mut records, new_record(id, sender, receiver, amount));
        self.store(&records).await
    }

    async fn update_fragment_status(
        &self,
        id: &FragmentId,
        status: &FragmentStatus,
    ) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        set_status(&mut records, id, status)?;
        self.store(&records).await
    }

    async fn fragment(&self, id: &FragmentId) -> anyhow::Result<Option<FragmentRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().find(|r| &r.id == id))
    }

    async fn outstanding(&self) -> anyhow::Result<Vec<FragmentRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|r| !r.status.is_terminal())
            .collect())
    }
}
