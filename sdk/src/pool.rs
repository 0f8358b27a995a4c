// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Stake pool registration and delegation.
//!
//! Both operations send a certificate transaction through the same pipeline as
//! transfers: one nonce, fresh fees, build, broadcast, record, track.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use casper_provider::{tx::FragmentId, NodeError, Provider};
use casper_signer::{
    Certificate, KeyKind, PoolId, PoolRegistration, SecretKey, SigningTool, Wallet,
};

use crate::account::Account;
use crate::broadcast::submit;
use crate::confirmation::{ConfirmationBatch, ConfirmationReport, ConfirmationTracker};
use crate::ledger::{FragmentLedger, FragmentStatus};
use crate::transaction::Payload;

/// Keys a pool node needs to produce blocks, as stored in `<pools_dir>/<name>.yaml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub genesis: PoolGenesis,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolGenesis {
    /// KES secret key.
    pub sig_key: SecretKey,
    /// VRF secret key.
    pub vrf_key: SecretKey,
    pub node_id: PoolId,
}

impl PoolConfig {
    pub fn path(pools_dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
        validate_name(name)?;
        Ok(pools_dir.join(format!("{}.yaml", name)))
    }

    /// Write the config, creating `pools_dir` if needed.
    pub async fn save(&self, pools_dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
        let path = Self::path(pools_dir, name)?;
        write_private(pools_dir, &path, &serde_yml::to_string(self)?).await?;
        Ok(path)
    }

    pub async fn load(pools_dir: &Path, name: &str) -> anyhow::Result<Self> {
        let path = Self::path(pools_dir, name)?;
        let yaml = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_yml::from_str(&yaml).with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Pool keys waiting for their registration to settle, in `<pools_dir>/<name>.pending.yaml`.
///
/// Written before the certificate is broadcast so the keys outlive an
/// interrupted run. Becomes a [`PoolConfig`] once the registration is confirmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPool {
    pub name: String,
    pub config: PoolConfig,
    /// The registration fragment, once the node has accepted it.
    pub fragment: Option<FragmentId>,
}

const PENDING_SUFFIX: &str = ".pending.yaml";

impl PendingPool {
    pub fn path(pools_dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
        validate_name(name)?;
        Ok(pools_dir.join(format!("{}{}", name, PENDING_SUFFIX)))
    }

    pub async fn save(&self, pools_dir: &Path) -> anyhow::Result<PathBuf> {
        let path = Self::path(pools_dir, &self.name)?;
        write_private(pools_dir, &path, &serde_yml::to_string(self)?).await?;
        Ok(path)
    }

    /// Every pending pool under `pools_dir`. A missing directory holds none.
    pub async fn load_all(pools_dir: &Path) -> anyhow::Result<Vec<Self>> {
        let mut dir = match tokio::fs::read_dir(pools_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to list {}", pools_dir.display()))
            }
        };
        let mut pending = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let is_pending = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(PENDING_SUFFIX));
            if !is_pending {
                continue;
            }
            let yaml = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let pool: PendingPool = serde_yml::from_str(&yaml)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            pending.push(pool);
        }
        pending.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pending)
    }

    /// Act on the registration's status: save the config once confirmed,
    /// discard the keys once rejected, keep waiting otherwise.
    pub async fn settle(
        self,
        pools_dir: &Path,
        status: &FragmentStatus,
    ) -> anyhow::Result<PoolSettlement> {
        let pending_path = Self::path(pools_dir, &self.name)?;
        let pool_id = self.config.genesis.node_id.clone();
        let (config_path, pending_config_path) = match status {
            FragmentStatus::Confirmed => {
                let path = self.config.save(pools_dir, &self.name).await?;
                remove_file(&pending_path).await?;
                tracing::info!(pool = %pool_id, path = %path.display(), "saved pool config");
                (Some(path), None)
            }
            FragmentStatus::Rejected(reason) => {
                remove_file(&pending_path).await?;
                tracing::warn!(
                    pool = %pool_id,
                    reason = %reason,
                    "registration rejected; pool keys discarded"
                );
                (None, None)
            }
            FragmentStatus::Broadcast | FragmentStatus::Pending => {
                tracing::warn!(
                    pool = %pool_id,
                    path = %pending_path.display(),
                    "registration not settled; pool keys kept"
                );
                (None, Some(pending_path))
            }
        };
        Ok(PoolSettlement {
            name: self.name,
            pool_id,
            status: status.clone(),
            config_path,
            pending_config_path,
        })
    }
}

/// What became of a pending pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PoolSettlement {
    pub name: String,
    pub pool_id: PoolId,
    pub status: FragmentStatus,
    /// Set once the registration is confirmed and the config written.
    pub config_path: Option<PathBuf>,
    /// Set while the registration is unsettled.
    pub pending_config_path: Option<PathBuf>,
}

fn validate_name(name: &str) -> anyhow::Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(anyhow!(
            "invalid pool name '{}': use letters, digits, '-' and '_'",
            name
        ));
    }
    Ok(())
}

async fn write_private(pools_dir: &Path, path: &Path, contents: &str) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(pools_dir)
        .await
        .with_context(|| format!("failed to create {}", pools_dir.display()))?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    restrict_permissions(path).await
}

async fn remove_file(path: &Path) -> anyhow::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[derive(Clone, Debug, Serialize)]
pub struct RegistrationReport {
    pub pool_id: PoolId,
    pub fragment: FragmentId,
    pub confirmation: ConfirmationReport,
    /// Set once the registration is confirmed and the config written.
    pub config_path: Option<PathBuf>,
    /// Set while the registration is unsettled. `casper track` finishes it.
    pub pending_config_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DelegationReport {
    pub pool_id: PoolId,
    pub fragment: FragmentId,
    pub confirmation: ConfirmationReport,
}

/// A static wrapper around stake pool certificates.
pub struct Pool {}

impl Pool {
    /// Register a new stake pool owned by `wallet`.
    ///
    /// The pool's keys go to `<pools_dir>/<name>.pending.yaml` before the
    /// certificate is broadcast. They move to `<name>.yaml` once the
    /// registration is confirmed and are deleted only if it is rejected.
    pub async fn register(
        provider: &impl Provider,
        tool: &impl SigningTool,
        wallet: &Wallet,
        ledger: &dyn FragmentLedger,
        tracker: &ConfirmationTracker,
        pools_dir: &Path,
        name: &str,
    ) -> anyhow::Result<RegistrationReport> {
        validate_name(name)?;
        if PoolConfig::path(pools_dir, name)?.exists()
            || PendingPool::path(pools_dir, name)?.exists()
        {
            return Err(anyhow!(
                "pool '{}' already exists in {}",
                name,
                pools_dir.display()
            ));
        }

        let vrf_secret = tool.generate_secret(KeyKind::Curve25519_2HashDH).await?;
        let vrf_public = tool.public_key(&vrf_secret).await?;
        let kes_secret = tool.generate_secret(KeyKind::SumEd25519_12).await?;
        let kes_public = tool.public_key(&kes_secret).await?;

        let registration =
            PoolRegistration::single_owner(kes_public, vrf_public, wallet.public_key().clone());
        let cert = tool.pool_registration(&registration).await?;
        let pool_id = tool.pool_id(&cert).await?;
        tracing::info!(pool = %pool_id, name, "created stake pool registration");

        let mut pending = PendingPool {
            name: name.to_string(),
            config: PoolConfig {
                genesis: PoolGenesis {
                    sig_key: kes_secret,
                    vrf_key: vrf_secret,
                    node_id: pool_id.clone(),
                },
            },
            fragment: None,
        };
        let pending_path = pending.save(pools_dir).await?;
        tracing::info!(pool = %pool_id, path = %pending_path.display(), "saved pending pool keys");

        let sent = Self::submit_certificate(provider, tool, wallet, ledger, cert).await;
        let (fragment, batch) = match sent {
            Ok(sent) => sent,
            Err(e) if NodeError::is_broadcast_rejected(&e) => {
                remove_file(&pending_path).await?;
                return Err(e.context("registration rejected; pool keys discarded"));
            }
            Err(e) => {
                return Err(e.context(format!("pool keys kept in {}", pending_path.display())));
            }
        };
        pending.fragment = Some(fragment.clone());
        pending.save(pools_dir).await?;

        let confirmation = tracker
            .track(provider, ledger, &batch)
            .await
            .with_context(|| format!("pool keys kept in {}", pending_path.display()))?;
        let status = if confirmation.confirmed.contains(&fragment) {
            FragmentStatus::Confirmed
        } else if let Some((_, reason)) = confirmation
            .rejected
            .iter()
            .find(|(id, _)| *id == fragment)
        {
            FragmentStatus::Rejected(reason.clone())
        } else {
            FragmentStatus::Pending
        };
        let settled = pending.settle(pools_dir, &status).await?;

        Ok(RegistrationReport {
            pool_id,
            fragment,
            confirmation,
            config_path: settled.config_path,
            pending_config_path: settled.pending_config_path,
        })
    }

    /// Settle pending registrations from the ledger, e.g. after a tracking pass.
    ///
    /// Pools whose fragment is unknown to the ledger are left alone.
    pub async fn settle_pending(
        pools_dir: &Path,
        ledger: &dyn FragmentLedger,
    ) -> anyhow::Result<Vec<PoolSettlement>> {
        let mut settled = Vec::new();
        for pending in PendingPool::load_all(pools_dir).await? {
            let Some(fragment) = pending.fragment.clone() else {
                tracing::warn!(name = %pending.name, "pending pool was never broadcast");
                continue;
            };
            let Some(record) = ledger.fragment(&fragment).await? else {
                tracing::warn!(
                    name = %pending.name,
                    fragment = %fragment,
                    "pending pool fragment not in ledger"
                );
                continue;
            };
            settled.push(pending.settle(pools_dir, &record.status).await?);
        }
        Ok(settled)
    }

    /// Delegate `wallet`'s stake to an existing pool.
    pub async fn delegate(
        provider: &impl Provider,
        tool: &impl SigningTool,
        wallet: &Wallet,
        ledger: &dyn FragmentLedger,
        tracker: &ConfirmationTracker,
        pool_id: PoolId,
    ) -> anyhow::Result<DelegationReport> {
        let cert = tool
            .stake_delegation(wallet.public_key(), &pool_id)
            .await?;
        tracing::info!(pool = %pool_id, "created stake delegation");
        let (fragment, batch) =
            Self::submit_certificate(provider, tool, wallet, ledger, cert).await?;
        let confirmation = tracker.track(provider, ledger, &batch).await?;
        Ok(DelegationReport {
            pool_id,
            fragment,
            confirmation,
        })
    }

    async fn submit_certificate(
        provider: &impl Provider,
        tool: &impl SigningTool,
        wallet: &Wallet,
        ledger: &dyn FragmentLedger,
        cert: Certificate,
    ) -> anyhow::Result<(FragmentId, ConfirmationBatch)> {
        let nonces = Account::allocate(provider, wallet.address(), 1).await?;
        let payload = Payload::Certificate(cert);
        let fragment = submit(provider, tool, wallet, ledger, &payload, nonces.start()).await?;
        let batch = ConfirmationBatch {
            sender: wallet.address().clone(),
            fragments: vec![fragment.clone()],
            awaited_nonce: nonces.awaited(),
        };
        Ok((fragment, batch))
    }
}
