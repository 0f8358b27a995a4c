// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! In-process stand-ins for the node and the signing tool.

use std::collections::{HashMap, VecDeque};
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};

use casper_provider::{
    message::Message,
    query::QueryProvider,
    response::{
        AccountState, FeeSchedule, LogStatus, MessageLogEntry, Settings, Stake,
        StakeDistribution,
    },
    tx::{FragmentId, TxProvider},
    util::Address,
    NodeError,
};
use casper_signer::{
    Certificate, GenesisHash, KeyKind, PoolId, PoolRegistration, PublicKey, SecretKey,
    SigningTool, ToolError, Wallet,
};

pub fn fnv(parts: &[&[u8]]) -> u64 {
    let mut hasher = FnvHasher::default();
    for part in parts {
        hasher.write(part);
        hasher.write(b"|");
    }
    hasher.finish()
}

pub fn sender() -> Address {
    "ca1sender".parse().unwrap()
}

pub fn receiver() -> Address {
    "ca1receiver".parse().unwrap()
}

pub fn fragment_id(n: u64) -> FragmentId {
    format!("{:064x}", n).parse().unwrap()
}

pub fn genesis() -> GenesisHash {
    format!("{:064x}", 1).parse().unwrap()
}

pub async fn test_wallet(tool: &MockTool) -> Wallet {
    Wallet::generate(tool, genesis()).await.unwrap()
}

fn unreachable() -> anyhow::Error {
    NodeError::NodeUnreachable("connection refused".into()).into()
}

#[derive(Default)]
struct NodeState {
    fees: FeeSchedule,
    accounts: HashMap<Address, AccountState>,
    counters: HashMap<Address, VecDeque<u64>>,
    unreachable: bool,
    failing_settings: usize,
    failing_log_polls: usize,
    reject: Option<String>,
    reject_once: Option<String>,
    posted: Vec<(FragmentId, Message)>,
    scripts: Vec<(FragmentId, VecDeque<LogStatus>)>,
    settle_with: Option<LogStatus>,
    log_polls: usize,
}

/// Pops the next scripted value, repeating the last one forever.
fn next<T: Clone>(script: &mut VecDeque<T>) -> Option<T> {
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

/// A scripted node.
///
/// Posted fragments show up in the message log as `Pending`, or with the status
/// given to [`MockNode::settle_with`]. Fragments with a script follow it instead.
pub struct MockNode {
    state: Mutex<NodeState>,
}

impl MockNode {
    pub fn new(fees: FeeSchedule) -> Self {
        MockNode {
            state: Mutex::new(NodeState {
                fees,
                ..Default::default()
            }),
        }
    }

    pub fn set_account(&self, address: &Address, state: AccountState) {
        let mut s = self.state.lock().unwrap();
        s.accounts.insert(address.clone(), state);
    }

    /// Counters reported by successive account queries.
    pub fn script_counters(&self, address: &Address, counters: Vec<u64>) {
        let mut s = self.state.lock().unwrap();
        s.counters.insert(address.clone(), counters.into());
    }

    /// Statuses reported for `id` by successive log polls.
    pub fn script_status(&self, id: &FragmentId, statuses: Vec<LogStatus>) {
        let mut s = self.state.lock().unwrap();
        s.scripts.push((id.clone(), statuses.into()));
    }

    pub fn settle_with(&self, status: LogStatus) {
        self.state.lock().unwrap().settle_with = Some(status);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn fail_settings(&self, times: usize) {
        self.state.lock().unwrap().failing_settings = times;
    }

    pub fn fail_log_polls(&self, times: usize) {
        self.state.lock().unwrap().failing_log_polls = times;
    }

    pub fn reject_broadcasts(&self, reason: &str) {
        self.state.lock().unwrap().reject = Some(reason.into());
    }

    pub fn reject_broadcasts_once(&self, reason: &str) {
        self.state.lock().unwrap().reject_once = Some(reason.into());
    }

    pub fn posted(&self) -> Vec<Message> {
        let s = self.state.lock().unwrap();
        s.posted.iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn log_polls(&self) -> usize {
        self.state.lock().unwrap().log_polls
    }
}

#[async_trait]
impl QueryProvider for MockNode {
    async fn settings(&self) -> anyhow::Result<Settings> {
        let mut s = self.state.lock().unwrap();
        if s.unreachable {
            return Err(unreachable());
        }
        if s.failing_settings > 0 {
            s.failing_settings -= 1;
            return Err(unreachable());
        }
        Ok(Settings {
            fees: s.fees,
            block0_hash: Some(genesis().to_string()),
            max_txs_per_block: None,
        })
    }

    async fn account(&self, address: &Address) -> anyhow::Result<AccountState> {
        let mut s = self.state.lock().unwrap();
        if s.unreachable {
            return Err(unreachable());
        }
        let scripted = s.counters.get_mut(address).and_then(next);
        let state = s.accounts.get(address).cloned();
        match (scripted, state) {
            (Some(counter), state) => Ok(AccountState::new(
                counter,
                state.map(|a| a.value).unwrap_or_default(),
            )),
            (None, Some(state)) => Ok(state),
            (None, None) => Err(NodeError::AccountNotFound(address.clone()).into()),
        }
    }

    async fn message_logs(&self) -> anyhow::Result<Vec<MessageLogEntry>> {
        let mut s = self.state.lock().unwrap();
        s.log_polls += 1;
        if s.unreachable {
            return Err(unreachable());
        }
        if s.failing_log_polls > 0 {
            s.failing_log_polls -= 1;
            return Err(unreachable());
        }

        let mut entries = Vec::new();
        for (id, script) in s.scripts.iter_mut() {
            if let Some(status) = next(script) {
                entries.push(MessageLogEntry::new(id.clone(), status));
            }
        }
        for (id, _) in &s.posted {
            if s.scripts.iter().any(|(scripted, _)| scripted == id) {
                continue;
            }
            let status = s.settle_with.clone().unwrap_or(LogStatus::Pending);
            entries.push(MessageLogEntry::new(id.clone(), status));
        }
        Ok(entries)
    }

    async fn block(&self, _id: &str) -> anyhow::Result<Vec<u8>> {
        if self.state.lock().unwrap().unreachable {
            return Err(unreachable());
        }
        Ok(b"genesis".to_vec())
    }

    async fn stake_pools(&self) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn stake(&self) -> anyhow::Result<StakeDistribution> {
        Ok(StakeDistribution {
            epoch: 0,
            stake: Stake::default(),
        })
    }
}

#[async_trait]
impl TxProvider for MockNode {
    async fn post_message(&self, message: &Message) -> anyhow::Result<FragmentId> {
        let mut s = self.state.lock().unwrap();
        if s.unreachable {
            return Err(unreachable());
        }
        if let Some(reason) = s.reject_once.take().or_else(|| s.reject.clone()) {
            return Err(NodeError::BroadcastRejected(reason).into());
        }
        let id: FragmentId = format!("{:016x}", fnv(&[message.as_bytes()])).parse()?;
        s.posted.push((id.clone(), message.clone()));
        Ok(id)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Staging {
    inputs: Vec<(String, u64)>,
    outputs: Vec<(String, u64)>,
    certificate: Option<String>,
    finalized: bool,
    witness: Option<Witness>,
    sealed: bool,
    auth: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Witness {
    counter: u64,
    signature: String,
}

#[derive(Default)]
struct ToolState {
    calls: Vec<String>,
    fail_on: Option<String>,
    generated: u64,
    last_secret: Option<PathBuf>,
}

/// A deterministic signing tool.
///
/// The staging file holds JSON describing the transaction, and messages are
/// that JSON. Signatures are FNV digests, so equal inputs give equal messages.
#[derive(Default)]
pub struct MockTool {
    state: Mutex<ToolState>,
}

impl MockTool {
    /// Names of the steps run so far.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Make the named step fail from now on.
    pub fn fail_on(&self, step: &str) {
        self.state.lock().unwrap().fail_on = Some(step.into());
    }

    /// The last key file handed to the tool.
    pub fn last_secret_path(&self) -> Option<PathBuf> {
        self.state.lock().unwrap().last_secret.clone()
    }

    /// Value debited by the transaction in `message`.
    pub fn input_value_of(&self, message: &Message) -> Option<u64> {
        let staging: Staging = serde_json::from_slice(message.as_bytes()).ok()?;
        staging.inputs.first().map(|(_, v)| *v)
    }

    /// Spending counter the transaction in `message` was signed for.
    pub fn counter_of(&self, message: &Message) -> Option<u64> {
        let staging: Staging = serde_json::from_slice(message.as_bytes()).ok()?;
        staging.witness.map(|w| w.counter)
    }

    fn call(&self, step: &str) -> anyhow::Result<()> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(step.to_string());
        if s.fail_on.as_deref() == Some(step) {
            return Err(ToolError::CommandFailed {
                command: format!("jcli {}", step),
                status: "exit status: 1".into(),
                stderr: "mock failure".into(),
            }
            .into());
        }
        Ok(())
    }

    fn record_secret(&self, path: &Path) {
        self.state.lock().unwrap().last_secret = Some(path.to_path_buf());
    }

    async fn read(staging: &Path) -> anyhow::Result<Staging> {
        let raw = tokio::fs::read(staging).await?;
        if raw.is_empty() {
            return Ok(Staging::default());
        }
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn update(staging: &Path, f: impl FnOnce(&mut Staging)) -> anyhow::Result<()> {
        let mut tx = Self::read(staging).await?;
        f(&mut tx);
        tokio::fs::write(staging, serde_json::to_vec(&tx)?).await?;
        Ok(())
    }
}

#[async_trait]
impl SigningTool for MockTool {
    async fn generate_secret(&self, kind: KeyKind) -> anyhow::Result<SecretKey> {
        self.call("key-generate")?;
        let n = {
            let mut s = self.state.lock().unwrap();
            s.generated += 1;
            s.generated
        };
        let prefix = match kind {
            KeyKind::Ed25519 => "ed25519",
            KeyKind::Ed25519Extended => "ed25519e",
            KeyKind::SumEd25519_12 => "kes25519-12",
            KeyKind::Curve25519_2HashDH => "vrf",
        };
        format!("{}_sk1mock{}", prefix, n).parse()
    }

    async fn public_key(&self, secret: &SecretKey) -> anyhow::Result<PublicKey> {
        self.call("to-public")?;
        format!("ed25519_pk1{:016x}", fnv(&[secret.expose().as_bytes()])).parse()
    }

    async fn account_address(&self, public: &PublicKey) -> anyhow::Result<Address> {
        self.call("address")?;
        format!("ca1{:016x}", fnv(&[public.as_str().as_bytes()])).parse()
    }

    async fn new_transaction(&self, staging: &Path) -> anyhow::Result<()> {
        self.call("new")?;
        tokio::fs::write(staging, serde_json::to_vec(&Staging::default())?).await?;
        Ok(())
    }

    async fn add_account(
        &self,
        staging: &Path,
        account: &Address,
        value: u64,
    ) -> anyhow::Result<()> {
        self.call("add-account")?;
        Self::update(staging, |tx| tx.inputs.push((account.to_string(), value))).await
    }

    async fn add_output(
        &self,
        staging: &Path,
        receiver: &Address,
        value: u64,
    ) -> anyhow::Result<()> {
        self.call("add-output")?;
        Self::update(staging, |tx| tx.outputs.push((receiver.to_string(), value))).await
    }

    async fn add_certificate(&self, staging: &Path, cert: &Certificate) -> anyhow::Result<()> {
        self.call("add-certificate")?;
        Self::update(staging, |tx| tx.certificate = Some(cert.to_string())).await
    }

    async fn finalize(&self, staging: &Path) -> anyhow::Result<()> {
        self.call("finalize")?;
        Self::update(staging, |tx| tx.finalized = true).await
    }

    async fn data_for_witness(&self, staging: &Path) -> anyhow::Result<String> {
        self.call("data-for-witness")?;
        let tx = Self::read(staging).await?;
        Ok(format!("{:016x}", fnv(&[serde_json::to_vec(&tx)?.as_slice()])))
    }

    async fn make_witness(
        &self,
        data: &str,
        genesis: &GenesisHash,
        counter: u64,
        output: &Path,
        secret_file: &Path,
    ) -> anyhow::Result<()> {
        self.record_secret(secret_file);
        self.call("make-witness")?;
        let secret = tokio::fs::read(secret_file).await?;
        let signature = fnv(&[
            data.as_bytes(),
            genesis.as_str().as_bytes(),
            counter.to_be_bytes().as_slice(),
            secret.as_slice(),
        ]);
        let witness = Witness {
            counter,
            signature: format!("{:016x}", signature),
        };
        tokio::fs::write(output, serde_json::to_vec(&witness)?).await?;
        Ok(())
    }

    async fn add_witness(&self, staging: &Path, witness: &Path) -> anyhow::Result<()> {
        self.call("add-witness")?;
        let witness: Witness = serde_json::from_slice(&tokio::fs::read(witness).await?)?;
        Self::update(staging, |tx| tx.witness = Some(witness)).await
    }

    async fn info(&self, staging: &Path, fees: &FeeSchedule) -> anyhow::Result<String> {
        self.call("info")?;
        let tx = Self::read(staging).await?;
        Ok(format!(
            "inputs: {:?}, outputs: {:?}, fees: {:?}",
            tx.inputs, tx.outputs, fees
        ))
    }

    async fn seal(&self, staging: &Path) -> anyhow::Result<()> {
        self.call("seal")?;
        Self::update(staging, |tx| tx.sealed = true).await
    }

    async fn auth(&self, staging: &Path, secret_file: &Path) -> anyhow::Result<()> {
        self.record_secret(secret_file);
        self.call("auth")?;
        let secret = tokio::fs::read(secret_file).await?;
        let auth = format!("{:016x}", fnv(&[secret.as_slice()]));
        Self::update(staging, |tx| tx.auth = Some(auth)).await
    }

    async fn to_message(&self, staging: &Path) -> anyhow::Result<Message> {
        self.call("to-message")?;
        let tx = Self::read(staging).await?;
        Ok(Message::new(serde_json::to_vec(&tx)?))
    }

    async fn pool_registration(&self, reg: &PoolRegistration) -> anyhow::Result<Certificate> {
        self.call("stake-pool-registration")?;
        let owners: Vec<&[u8]> = reg.owners.iter().map(|o| o.as_str().as_bytes()).collect();
        let digest = fnv(&[
            reg.kes_public.as_str().as_bytes(),
            reg.vrf_public.as_str().as_bytes(),
            owners.concat().as_slice(),
        ]);
        format!("cert1{:016x}", digest).parse()
    }

    async fn stake_delegation(
        &self,
        owner: &PublicKey,
        pool: &PoolId,
    ) -> anyhow::Result<Certificate> {
        self.call("stake-delegation")?;
        let digest = fnv(&[owner.as_str().as_bytes(), pool.as_str().as_bytes()]);
        format!("cert1{:016x}", digest).parse()
    }

    async fn pool_id(&self, cert: &Certificate) -> anyhow::Result<PoolId> {
        self.call("get-stake-pool-id")?;
        format!("{:016x}", fnv(&[cert.as_str().as_bytes()])).parse()
    }

    async fn decode_genesis(&self, block: &[u8]) -> anyhow::Result<String> {
        self.call("genesis-decode")?;
        Ok(format!("blockchain_configuration:\n  block0_bytes: {}", block.len()))
    }
}
