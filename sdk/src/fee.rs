// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use casper_provider::{query::QueryProvider, response::FeeSchedule, util::InvalidAmount};

/// Fetch the node's current fee schedule.
///
/// Never cached: call once per transaction build.
pub async fn resolve_fees(provider: &impl QueryProvider) -> anyhow::Result<FeeSchedule> {
    let settings = provider.settings().await?;
    tracing::debug!(
        constant = settings.fees.constant,
        coefficient = settings.fees.coefficient,
        certificate = settings.fees.certificate,
        "resolved fee schedule"
    );
    Ok(settings.fees)
}

/// Total debited from the sender of a single-output transfer.
///
/// One input and one output are each charged the coefficient.
pub fn transfer_total(fees: &FeeSchedule, amount: u64) -> Result<u64, InvalidAmount> {
    fees.coefficient
        .checked_mul(2)
        .and_then(|c| c.checked_add(fees.constant))
        .and_then(|f| f.checked_add(amount))
        .ok_or_else(|| overflow(amount))
}

/// Total debited from the sender of a certificate transaction (one input, no outputs).
pub fn certificate_total(fees: &FeeSchedule) -> Result<u64, InvalidAmount> {
    fees.certificate
        .checked_add(fees.coefficient)
        .and_then(|f| f.checked_add(fees.constant))
        .ok_or_else(|| overflow(fees.certificate))
}

fn overflow(amount: u64) -> InvalidAmount {
    InvalidAmount(format!("{} plus fees overflows", amount))
}
