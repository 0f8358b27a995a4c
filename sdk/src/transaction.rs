// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;

use thiserror::Error;

use casper_provider::{message::Message, response::FeeSchedule, util::Address};
use casper_signer::{Certificate, SecretFile, SigningTool, StagingArea, Wallet};

use crate::fee::{certificate_total, transfer_total};

/// Build stages of a staged transaction, in the only order they may occur.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Empty,
    AccountAdded,
    OutputsAdded,
    CertificateAdded,
    Finalized,
    WitnessComputed,
    WitnessAdded,
    Sealed,
    Authorized,
    Serialized,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Failures building a staged transaction.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot move staged transaction from {from} to {to}")]
    OutOfOrder { from: Stage, to: Stage },
    #[error("transaction build failed at step {step}")]
    Step {
        step: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl BuildError {
    /// The stage that failed, if the error came from a signing tool step.
    pub fn failed_step(err: &anyhow::Error) -> Option<Stage> {
        err.chain()
            .find_map(|e| e.downcast_ref::<BuildError>())
            .and_then(|e| match e {
                BuildError::Step { step, .. } => Some(*step),
                BuildError::OutOfOrder { .. } => None,
            })
    }
}

/// What a transaction carries besides its input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Transfer { to: Address, amount: u64 },
    Certificate(Certificate),
}

impl Payload {
    /// Value debited from the sender, fees included.
    pub fn input_value(&self, fees: &FeeSchedule) -> anyhow::Result<u64> {
        Ok(match self {
            Payload::Transfer { amount, .. } => transfer_total(fees, *amount)?,
            Payload::Certificate(_) => certificate_total(fees)?,
        })
    }

    pub fn receiver(&self) -> Option<&Address> {
        match self {
            Payload::Transfer { to, .. } => Some(to),
            Payload::Certificate(_) => None,
        }
    }

    pub fn amount(&self) -> Option<u64> {
        match self {
            Payload::Transfer { amount, .. } => Some(*amount),
            Payload::Certificate(_) => None,
        }
    }
}

/// A transaction being assembled by the signing tool.
///
/// Every step consumes the transaction and hands it back on success. On failure
/// the transaction is dropped together with its staging files.
pub struct StagedTransaction<'a, T: SigningTool> {
    tool: &'a T,
    area: StagingArea,
    stage: Stage,
    sender: Option<Address>,
    total_fee: u64,
    outputs: Vec<(Address, u64)>,
    certificate: Option<Certificate>,
    witness_data: Option<String>,
    sealed: bool,
    message: Option<Message>,
}

impl<T: SigningTool> fmt::Debug for StagedTransaction<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedTransaction")
            .field("stage", &self.stage)
            .field("sender", &self.sender)
            .field("area", &self.area)
            .finish()
    }
}

impl<'a, T: SigningTool> StagedTransaction<'a, T> {
    /// Start an empty transaction in a fresh staging area.
    pub async fn new(tool: &'a T) -> anyhow::Result<Self> {
        let area = StagingArea::new().await.map_err(step_err(Stage::Empty))?;
        tool.new_transaction(area.staging_path())
            .await
            .map_err(step_err(Stage::Empty))?;
        Ok(StagedTransaction {
            tool,
            area,
            stage: Stage::Empty,
            sender: None,
            total_fee: 0,
            outputs: Vec::new(),
            certificate: None,
            witness_data: None,
            sealed: false,
            message: None,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    /// Value debited from the sender, fees included.
    pub fn total_fee(&self) -> u64 {
        self.total_fee
    }

    pub fn outputs(&self) -> &[(Address, u64)] {
        &self.outputs
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    fn advance(&mut self, to: Stage) -> anyhow::Result<()> {
        use Stage::*;
        let allowed = matches!(
            (self.stage, to),
            (Empty, AccountAdded)
                | (AccountAdded, OutputsAdded)
                | (AccountAdded, CertificateAdded)
                | (OutputsAdded, Finalized)
                | (CertificateAdded, Finalized)
                | (Finalized, WitnessComputed)
                | (WitnessComputed, WitnessAdded)
                | (WitnessAdded, Sealed)
                | (Sealed, Authorized)
                | (Authorized, Serialized)
        );
        if !allowed {
            return Err(BuildError::OutOfOrder {
                from: self.stage,
                to,
            }
            .into());
        }
        Ok(())
    }

    /// Add the sender as the single input, debited `value` (amount plus fees).
    pub async fn add_account(mut self, sender: &Address, value: u64) -> anyhow::Result<Self> {
        self.advance(Stage::AccountAdded)?;
        self.tool
            .add_account(self.area.staging_path(), sender, value)
            .await
            .map_err(step_err(Stage::AccountAdded))?;
        self.sender = Some(sender.clone());
        self.total_fee = value;
        self.stage = Stage::AccountAdded;
        Ok(self)
    }

    pub async fn add_outputs(mut self, outputs: &[(Address, u64)]) -> anyhow::Result<Self> {
        self.advance(Stage::OutputsAdded)?;
        for (receiver, value) in outputs {
            self.tool
                .add_output(self.area.staging_path(), receiver, *value)
                .await
                .map_err(step_err(Stage::OutputsAdded))?;
        }
        self.outputs = outputs.to_vec();
        self.stage = Stage::OutputsAdded;
        Ok(self)
    }

    pub async fn add_certificate(mut self, cert: &Certificate) -> anyhow::Result<Self> {
        self.advance(Stage::CertificateAdded)?;
        self.tool
            .add_certificate(self.area.staging_path(), cert)
            .await
            .map_err(step_err(Stage::CertificateAdded))?;
        self.certificate = Some(cert.clone());
        self.stage = Stage::CertificateAdded;
        Ok(self)
    }

    pub async fn finalize(mut self) -> anyhow::Result<Self> {
        self.advance(Stage::Finalized)?;
        self.tool
            .finalize(self.area.staging_path())
            .await
            .map_err(step_err(Stage::Finalized))?;
        self.stage = Stage::Finalized;
        Ok(self)
    }

    /// Sign the finalized transaction for spending counter `nonce`.
    pub async fn compute_witness(mut self, wallet: &Wallet, nonce: u64) -> anyhow::Result<Self> {
        self.advance(Stage::WitnessComputed)?;
        let step = step_err(Stage::WitnessComputed);
        let data = self
            .tool
            .data_for_witness(self.area.staging_path())
            .await
            .map_err(step)?;

        let secret = SecretFile::write(wallet.secret_key()).await.map_err(step)?;
        let result = self
            .tool
            .make_witness(
                &data,
                wallet.genesis(),
                nonce,
                self.area.witness_path(),
                secret.path(),
            )
            .await;
        erase(secret).await;
        result.map_err(step)?;

        self.witness_data = Some(data);
        self.stage = Stage::WitnessComputed;
        Ok(self)
    }

    /// Attach the witness and log the tool's view of the transaction.
    pub async fn add_witness(mut self, fees: &FeeSchedule) -> anyhow::Result<Self> {
        self.advance(Stage::WitnessAdded)?;
        let step = step_err(Stage::WitnessAdded);
        self.tool
            .add_witness(self.area.staging_path(), self.area.witness_path())
            .await
            .map_err(step)?;
        let info = self
            .tool
            .info(self.area.staging_path(), fees)
            .await
            .map_err(step)?;
        tracing::debug!(info = %info, "staged transaction");
        self.stage = Stage::WitnessAdded;
        Ok(self)
    }

    pub async fn seal(mut self) -> anyhow::Result<Self> {
        self.advance(Stage::Sealed)?;
        self.tool
            .seal(self.area.staging_path())
            .await
            .map_err(step_err(Stage::Sealed))?;
        self.sealed = true;
        self.stage = Stage::Sealed;
        Ok(self)
    }

    /// Authorize the certificate, if any. Plain transfers need no authorization.
    pub async fn authorize(mut self, wallet: &Wallet) -> anyhow::Result<Self> {
        self.advance(Stage::Authorized)?;
        if self.certificate.is_some() {
            let step = step_err(Stage::Authorized);
            let secret = SecretFile::write(wallet.secret_key()).await.map_err(step)?;
            let result = self
                .tool
                .auth(self.area.staging_path(), secret.path())
                .await;
            erase(secret).await;
            result.map_err(step)?;
        }
        self.stage = Stage::Authorized;
        Ok(self)
    }

    /// Convert to the bytes posted to the node. The staging area is released here.
    pub async fn to_message(mut self) -> anyhow::Result<Message> {
        self.advance(Stage::Serialized)?;
        let message = self
            .tool
            .to_message(self.area.staging_path())
            .await
            .map_err(step_err(Stage::Serialized))?;
        self.message = Some(message.clone());
        self.stage = Stage::Serialized;
        Ok(message)
    }
}

fn step_err(step: Stage) -> impl Fn(anyhow::Error) -> anyhow::Error + Copy {
    move |source: anyhow::Error| -> anyhow::Error { BuildError::Step { step, source }.into() }
}

async fn erase(secret: SecretFile) {
    if let Err(e) = secret.erase().await {
        tracing::warn!(error = %e, "failed to erase secret file");
    }
}

/// Builds signed messages for one wallet against one fee schedule snapshot.
pub struct TxBuilder<'a, T: SigningTool> {
    tool: &'a T,
    wallet: &'a Wallet,
    fees: FeeSchedule,
}

impl<'a, T: SigningTool> TxBuilder<'a, T> {
    pub fn new(tool: &'a T, wallet: &'a Wallet, fees: FeeSchedule) -> Self {
        TxBuilder { tool, wallet, fees }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Run every stage for `payload` at spending counter `nonce`.
    pub async fn build(&self, payload: &Payload, nonce: u64) -> anyhow::Result<Message> {
        // Fails before the tool is touched.
        let value = payload.input_value(&self.fees)?;

        let tx = StagedTransaction::new(self.tool)
            .await?
            .add_account(self.wallet.address(), value)
            .await?;
        let tx = match payload {
            Payload::Transfer { to, amount } => tx.add_outputs(&[(to.clone(), *amount)]).await?,
            Payload::Certificate(cert) => tx.add_certificate(cert).await?,
        };
        let message = tx
            .finalize()
            .await?
            .compute_witness(self.wallet, nonce)
            .await?
            .add_witness(&self.fees)
            .await?
            .seal()
            .await?
            .authorize(self.wallet)
            .await?
            .to_message()
            .await?;
        tracing::debug!(nonce, bytes = message.len(), "built transaction");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use casper_provider::util::InvalidAmount;

    use super::*;
    use crate::testing::{receiver, test_wallet, MockTool};

    const FEES: FeeSchedule = FeeSchedule {
        constant: 2,
        coefficient: 1,
        certificate: 10,
    };

    fn transfer(amount: u64) -> Payload {
        Payload::Transfer {
            to: receiver(),
            amount,
        }
    }

    #[tokio::test]
    async fn builds_transfers_in_order() {
        let tool = MockTool::default();
        let wallet = test_wallet(&tool).await;
        let message = TxBuilder::new(&tool, &wallet, FEES)
            .build(&transfer(100), 5)
            .await
            .unwrap();
        assert!(!message.is_empty());

        let calls = tool.calls();
        assert_eq!(
            calls.iter().skip_while(|c| *c != "new").cloned().collect::<Vec<_>>(),
            vec![
                "new",
                "add-account",
                "add-output",
                "finalize",
                "data-for-witness",
                "make-witness",
                "add-witness",
                "info",
                "seal",
                "to-message",
            ]
        );
        assert_eq!(tool.input_value_of(&message), Some(104));
    }

    #[tokio::test]
    async fn certificate_transactions_are_authorized() {
        let tool = MockTool::default();
        let wallet = test_wallet(&tool).await;
        let cert: Certificate = "cert1mock".parse().unwrap();
        let message = TxBuilder::new(&tool, &wallet, FEES)
            .build(&Payload::Certificate(cert), 0)
            .await
            .unwrap();

        let calls = tool.calls();
        assert!(calls.contains(&"add-certificate".to_string()));
        assert!(calls.contains(&"auth".to_string()));
        assert!(!calls.contains(&"add-output".to_string()));
        assert_eq!(tool.input_value_of(&message), Some(13));
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_messages() {
        let tool = MockTool::default();
        let wallet = test_wallet(&tool).await;
        let builder = TxBuilder::new(&tool, &wallet, FEES);
        let a = builder.build(&transfer(100), 7).await.unwrap();
        let b = builder.build(&transfer(100), 7).await.unwrap();
        let c = builder.build(&transfer(100), 8).await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn debug_shows_stage_and_sender() {
        let tool = MockTool::default();
        let tx = StagedTransaction::new(&tool)
            .await
            .unwrap()
            .add_account(&receiver(), 10)
            .await
            .unwrap();
        let debug = format!("{:?}", tx);
        assert!(debug.contains("stage: AccountAdded"));
        assert!(debug.contains("ca1receiver"));
    }

    #[tokio::test]
    async fn rejects_out_of_order_steps() {
        let tool = MockTool::default();
        let tx = StagedTransaction::new(&tool).await.unwrap();
        let err = tx.seal().await.unwrap_err();
        match err.downcast_ref::<BuildError>() {
            Some(BuildError::OutOfOrder { from, to }) => {
                assert_eq!(*from, Stage::Empty);
                assert_eq!(*to, Stage::Sealed);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn outputs_and_certificates_are_exclusive() {
        let tool = MockTool::default();
        let cert: Certificate = "cert1mock".parse().unwrap();
        let tx = StagedTransaction::new(&tool)
            .await
            .unwrap()
            .add_account(&receiver(), 10)
            .await
            .unwrap()
            .add_outputs(&[(receiver(), 1)])
            .await
            .unwrap();
        let err = tx.add_certificate(&cert).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::OutOfOrder { .. })
        ));
    }

    #[tokio::test]
    async fn reports_the_failed_step() {
        let tool = MockTool::default();
        let wallet = test_wallet(&tool).await;
        tool.fail_on("seal");
        let err = TxBuilder::new(&tool, &wallet, FEES)
            .build(&transfer(100), 0)
            .await
            .unwrap_err();
        assert_eq!(BuildError::failed_step(&err), Some(Stage::Sealed));
        assert!(!tool.calls().contains(&"to-message".to_string()));
    }

    #[tokio::test]
    async fn failed_witness_still_erases_the_secret() {
        let tool = MockTool::default();
        let wallet = test_wallet(&tool).await;
        tool.fail_on("make-witness");
        let err = TxBuilder::new(&tool, &wallet, FEES)
            .build(&transfer(1), 0)
            .await
            .unwrap_err();
        assert_eq!(BuildError::failed_step(&err), Some(Stage::WitnessComputed));
        let secret_path = tool.last_secret_path().unwrap();
        assert!(!secret_path.exists());
    }

    #[tokio::test]
    async fn invalid_amounts_fail_before_the_tool_runs() {
        let tool = MockTool::default();
        let wallet = test_wallet(&tool).await;
        let before = tool.calls().len();
        let err = TxBuilder::new(&tool, &wallet, FEES)
            .build(&transfer(u64::MAX), 0)
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<InvalidAmount>().is_some());
        assert_eq!(tool.calls().len(), before);
    }
}
