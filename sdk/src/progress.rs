// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;

pub(crate) static SENT: Emoji<'_, '_> = Emoji("📤 ", "");
pub(crate) static CONFIRMED: Emoji<'_, '_> = Emoji("✅ ", "");
pub(crate) static FAILED: Emoji<'_, '_> = Emoji("❌ ", "x ");
pub(crate) static WAITING: Emoji<'_, '_> = Emoji("⌛ ", "");

lazy_static! {
    static ref BATCH_STYLE: ProgressStyle = ProgressStyle::with_template(
        "[{elapsed_precise}] {spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} {msg}"
    )
    .unwrap()
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    .progress_chars("#>-");
}

/// Create a bar counting the transactions of a batch.
pub(crate) fn new_batch_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(BATCH_STYLE.clone());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
