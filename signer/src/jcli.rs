// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use zeroize::Zeroize;

use casper_provider::{message::Message, response::FeeSchedule, util::Address};

use crate::certificate::{Certificate, PoolId, PoolRegistration};
use crate::genesis::GenesisHash;
use crate::key::{parse_secret_key, KeyKind, PublicKey, SecretKey};
use crate::signer::SigningTool;

/// Failures running the signing tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("'{command}' returned unexpected output: {message}")]
    InvalidOutput { command: String, message: String },
}

/// [`SigningTool`] backed by the `jcli` binary.
///
/// Each operation is one subprocess. A non-zero exit status always fails the
/// operation with [`ToolError::CommandFailed`].
#[derive(Clone, Debug)]
pub struct Jcli {
    bin: PathBuf,
}

impl Default for Jcli {
    fn default() -> Self {
        Jcli::new("jcli")
    }
}

impl Jcli {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Jcli { bin: bin.into() }
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    /// Full version string reported by the tool.
    pub async fn version(&self) -> anyhow::Result<String> {
        self.run(["--full-version"], None).await
    }

    async fn run<I, S>(&self, args: I, input: Option<&[u8]>) -> anyhow::Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        let command = describe(&args);
        tracing::debug!(command = %command, "running signing tool");

        let spawn_err = |source| ToolError::Spawn {
            command: command.clone(),
            source,
        };
        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(input).await.map_err(spawn_err)?;
        }
        let output = child.wait_with_output().await.map_err(spawn_err)?;

        if !output.status.success() {
            return Err(ToolError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        let stdout = String::from_utf8(output.stdout).map_err(|e| ToolError::InvalidOutput {
            command: command.clone(),
            message: e.to_string(),
        })?;
        Ok(stdout.trim().to_string())
    }

    async fn run_parse<T, I, S>(&self, args: I, input: Option<&[u8]>) -> anyhow::Result<T>
    where
        T: FromStr<Err = anyhow::Error>,
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        let out = self.run(&args, input).await?;
        out.parse().map_err(|e: anyhow::Error| {
            ToolError::InvalidOutput {
                command: describe(&args),
                message: e.to_string(),
            }
            .into()
        })
    }

    async fn run_staging<I, S>(&self, args: I, staging: &Path) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        args.push("--staging".into());
        args.push(staging.into());
        self.run(&args, None).await?;
        Ok(())
    }
}

/// Leading words of the invocation, up to the first flag.
fn describe(args: &[OsString]) -> String {
    let words: Vec<_> = args
        .iter()
        .map(|a| a.to_string_lossy())
        .take_while(|a| !a.starts_with('-') || a == "--full-version")
        .take(3)
        .collect();
    format!("jcli {}", words.join(" "))
}

#[async_trait]
impl SigningTool for Jcli {
    async fn generate_secret(&self, kind: KeyKind) -> anyhow::Result<SecretKey> {
        let mut out = self
            .run(["key", "generate", "--type", kind.as_str()], None)
            .await?;
        let secret = parse_secret_key(&out).map_err(|e| ToolError::InvalidOutput {
            command: "jcli key generate".into(),
            message: e.to_string(),
        });
        out.zeroize();
        Ok(secret?)
    }

    async fn public_key(&self, secret: &SecretKey) -> anyhow::Result<PublicKey> {
        self.run_parse(["key", "to-public"], Some(secret.expose().as_bytes()))
            .await
    }

    async fn account_address(&self, public: &PublicKey) -> anyhow::Result<Address> {
        self.run_parse(["address", "account", "--testing", public.as_str()], None)
            .await
    }

    async fn new_transaction(&self, staging: &Path) -> anyhow::Result<()> {
        self.run_staging(["transaction", "new"], staging).await
    }

    async fn add_account(
        &self,
        staging: &Path,
        account: &Address,
        value: u64,
    ) -> anyhow::Result<()> {
        let value = value.to_string();
        self.run_staging(
            ["transaction", "add-account", account.as_str(), value.as_str()],
            staging,
        )
        .await
    }

    async fn add_output(
        &self,
        staging: &Path,
        receiver: &Address,
        value: u64,
    ) -> anyhow::Result<()> {
        let value = value.to_string();
        self.run_staging(
            ["transaction", "add-output", receiver.as_str(), value.as_str()],
            staging,
        )
        .await
    }

    async fn add_certificate(&self, staging: &Path, cert: &Certificate) -> anyhow::Result<()> {
        self.run_staging(["transaction", "add-certificate", cert.as_str()], staging)
            .await
    }

    async fn finalize(&self, staging: &Path) -> anyhow::Result<()> {
        self.run_staging(["transaction", "finalize"], staging).await
    }

    async fn data_for_witness(&self, staging: &Path) -> anyhow::Result<String> {
        let data = self
            .run(
                [
                    OsStr::new("transaction"),
                    OsStr::new("data-for-witness"),
                    OsStr::new("--staging"),
                    staging.as_os_str(),
                ],
                None,
            )
            .await?;
        if data.is_empty() {
            return Err(ToolError::InvalidOutput {
                command: "jcli transaction data-for-witness".into(),
                message: "empty witness data".into(),
            }
            .into());
        }
        Ok(data)
    }

    async fn make_witness(
        &self,
        data: &str,
        genesis: &GenesisHash,
        counter: u64,
        output: &Path,
        secret_file: &Path,
    ) -> anyhow::Result<()> {
        let counter = counter.to_string();
        self.run(
            [
                OsStr::new("transaction"),
                OsStr::new("make-witness"),
                OsStr::new(data),
                OsStr::new("--genesis-block-hash"),
                OsStr::new(genesis.as_str()),
                OsStr::new("--type"),
                OsStr::new("account"),
                OsStr::new("--account-spending-counter"),
                OsStr::new(&counter),
                output.as_os_str(),
                secret_file.as_os_str(),
            ],
            None,
        )
        .await?;
        Ok(())
    }

    async fn add_witness(&self, staging: &Path, witness: &Path) -> anyhow::Result<()> {
        self.run_staging(
            [
                OsStr::new("transaction"),
                OsStr::new("add-witness"),
                witness.as_os_str(),
            ],
            staging,
        )
        .await
    }

    async fn info(&self, staging: &Path, fees: &FeeSchedule) -> anyhow::Result<String> {
        let constant = fees.constant.to_string();
        let coefficient = fees.coefficient.to_string();
        let certificate = fees.certificate.to_string();
        self.run(
            [
                OsStr::new("transaction"),
                OsStr::new("info"),
                OsStr::new("--fee-constant"),
                OsStr::new(&constant),
                OsStr::new("--fee-coefficient"),
                OsStr::new(&coefficient),
                OsStr::new("--fee-certificate"),
                OsStr::new(&certificate),
                OsStr::new("--staging"),
                staging.as_os_str(),
            ],
            None,
        )
        .await
    }

    async fn seal(&self, staging: &Path) -> anyhow::Result<()> {
        self.run_staging(["transaction", "seal"], staging).await
    }

    async fn auth(&self, staging: &Path, secret_file: &Path) -> anyhow::Result<()> {
        self.run_staging(
            [
                OsStr::new("transaction"),
                OsStr::new("auth"),
                OsStr::new("-k"),
                secret_file.as_os_str(),
            ],
            staging,
        )
        .await
    }

    async fn to_message(&self, staging: &Path) -> anyhow::Result<Message> {
        let out = self
            .run(
                [
                    OsStr::new("transaction"),
                    OsStr::new("to-message"),
                    OsStr::new("--staging"),
                    staging.as_os_str(),
                ],
                None,
            )
            .await?;
        Message::from_hex(&out).map_err(|e| {
            ToolError::InvalidOutput {
                command: "jcli transaction to-message".into(),
                message: e.to_string(),
            }
            .into()
        })
    }

    async fn pool_registration(&self, reg: &PoolRegistration) -> anyhow::Result<Certificate> {
        let mut args: Vec<OsString> = vec![
            "certificate".into(),
            "new".into(),
            "stake-pool-registration".into(),
            "--kes-key".into(),
            reg.kes_public.as_str().into(),
            "--vrf-key".into(),
            reg.vrf_public.as_str().into(),
        ];
        for owner in &reg.owners {
            args.push("--owner".into());
            args.push(owner.as_str().into());
        }
        args.extend([
            "--serial".into(),
            reg.serial.to_string().into(),
            "--start-validity".into(),
            reg.start_validity.to_string().into(),
            "--management-threshold".into(),
            reg.management_threshold.to_string().into(),
        ]);
        self.run_parse(&args, None).await
    }

    async fn stake_delegation(
        &self,
        owner: &PublicKey,
        pool: &PoolId,
    ) -> anyhow::Result<Certificate> {
        self.run_parse(
            [
                "certificate",
                "new",
                "stake-delegation",
                owner.as_str(),
                pool.as_str(),
            ],
            None,
        )
        .await
    }

    async fn pool_id(&self, cert: &Certificate) -> anyhow::Result<PoolId> {
        self.run_parse(
            ["certificate", "get-stake-pool-id"],
            Some(cert.as_str().as_bytes()),
        )
        .await
    }

    async fn decode_genesis(&self, block: &[u8]) -> anyhow::Result<String> {
        let decoded = self.run(["genesis", "decode"], Some(block)).await?;
        if decoded.is_empty() {
            return Err(ToolError::InvalidOutput {
                command: "jcli genesis decode".into(),
                message: "empty output".into(),
            }
            .into());
        }
        Ok(decoded)
    }
}
