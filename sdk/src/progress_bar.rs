// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use indicatif::ProgressBar;

use casper_provider::tx::FragmentId;

use crate::confirmation::ConfirmationReport;
use crate::progress::{new_batch_bar, CONFIRMED, FAILED, SENT, WAITING};

/// Terminal progress for a batch send. Does nothing when quiet.
pub struct BatchProgressBar {
    inner: Option<ProgressBar>,
}

impl BatchProgressBar {
    pub fn new(len: u64, quiet: bool) -> Self {
        if quiet {
            return Self { inner: None };
        }
        Self {
            inner: Some(new_batch_bar(len)),
        }
    }

    pub fn show_sent(&self, nonce: u64, id: &FragmentId) {
        if let Some(bar) = &self.inner {
            bar.println(format!("{} Sent nonce {} (fragment {}).", SENT, nonce, id));
            bar.inc(1);
        }
    }

    pub fn show_failed(&self, nonce: u64, err: &anyhow::Error) {
        if let Some(bar) = &self.inner {
            bar.println(format!("{} Nonce {} failed: {:#}", FAILED, nonce, err));
            bar.inc(1);
        }
    }

    pub fn show_tracking(&self, count: usize) {
        if let Some(bar) = &self.inner {
            bar.set_message(format!("{} Waiting for {} fragment(s)...", WAITING, count));
        }
    }

    pub fn show_tracked(&self, report: &ConfirmationReport) {
        if let Some(bar) = &self.inner {
            for id in &report.confirmed {
                bar.println(format!("{} Fragment {} confirmed.", CONFIRMED, id));
            }
            for (id, reason) in &report.rejected {
                bar.println(format!("{} Fragment {} rejected: {}", FAILED, id, reason));
            }
            bar.set_message("");
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.inner {
            bar.finish_and_clear();
        }
    }
}
