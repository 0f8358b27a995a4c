// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use clap::Args;
use serde::Serialize;

use casper_provider::{
    tx::FragmentId,
    util::{parse_address, parse_amount, Address},
};
use casper_sdk::{
    Account, BatchArgs, ConfirmationBatch, ConfirmationReport, FileLedger, FragmentLedger,
    Outcome, Pool, PoolSettlement, Transfer,
};

use crate::{get_provider, get_tool, get_tracker, get_wallet, print_json, Cli};

#[derive(Clone, Debug, Args)]
pub struct SendArgs {
    /// The recipient account address.
    #[arg(long, value_parser = parse_address)]
    to: Address,
    /// The amount to send with each transfer.
    #[arg(value_parser = parse_amount)]
    amount: u64,
    /// Number of transfers to send on consecutive nonces.
    #[arg(long, default_value_t = 1)]
    rounds: u64,
    /// Wait for each transfer to settle before sending the next.
    #[arg(long, default_value_t = false)]
    await_each: bool,
}

#[derive(Clone, Debug, Args)]
pub struct TrackArgs {
    /// Only track fragments sent from this address.
    #[arg(long, value_parser = parse_address)]
    sender: Option<Address>,
}

/// Send command handler.
pub async fn handle_send(cli: Cli, args: &SendArgs) -> anyhow::Result<()> {
    let provider = get_provider(&cli)?;
    let tool = get_tool(&cli);
    let wallet = get_wallet(&cli, &provider, &tool).await?;
    let ledger = FileLedger::new(cli.ledger.clone());
    let tracker = get_tracker(&cli);

    let batch = BatchArgs {
        to: args.to.clone(),
        amount: args.amount,
        rounds: args.rounds,
        await_each: args.await_each,
        quiet: cli.quiet,
    };
    let report = Transfer::send_batch(&provider, &tool, &wallet, &ledger, &tracker, batch).await?;

    print_json(&report)
}

#[derive(Debug, Serialize)]
struct TrackReport {
    confirmation: ConfirmationReport,
    /// Pool registrations settled by this pass.
    pools: Vec<PoolSettlement>,
}

/// Track command handler.
///
/// Fragments are grouped by sender. The ledger keeps no nonces, so a sender's
/// outstanding fragments are assumed to hold the nonces right after its current
/// counter. If some of them were already applied, the awaited nonce overshoots:
/// the rest then settle only through the message log, or run to the timeout.
/// Pending pool registrations are settled from the ledger afterwards.
pub async fn handle_track(cli: Cli, args: &TrackArgs) -> anyhow::Result<()> {
    let provider = get_provider(&cli)?;
    let ledger = FileLedger::new(cli.ledger.clone());
    let tracker = get_tracker(&cli);

    let mut by_sender: BTreeMap<Address, Vec<FragmentId>> = BTreeMap::new();
    for record in ledger.outstanding().await? {
        if args.sender.as_ref().map_or(true, |s| *s == record.sender) {
            by_sender.entry(record.sender).or_default().push(record.id);
        }
    }

    let mut report = ConfirmationReport::empty();
    for (sender, fragments) in by_sender {
        let counter = Account::counter_or_zero(&provider, &sender).await?;
        let awaited_nonce = counter + fragments.len() as u64;
        let batch = ConfirmationBatch {
            sender,
            fragments,
            awaited_nonce,
        };
        let tracked = tracker.track(&provider, &ledger, &batch).await?;
        let cancelled = tracked.outcome == Outcome::Cancelled;
        report.merge(tracked);
        if cancelled {
            break;
        }
    }

    let pools = Pool::settle_pending(&cli.pools_dir, &ledger).await?;
    print_json(&TrackReport {
        confirmation: report,
        pools,
    })
}
