// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::query::QueryProvider;
use crate::tx::TxProvider;

/// Provider capable of submitting queries and fragments.
pub trait Provider: QueryProvider + TxProvider {}

impl<T> Provider for T where T: QueryProvider + TxProvider {}
