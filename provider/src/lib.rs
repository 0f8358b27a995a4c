// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod error;
pub mod message;
mod provider;
pub mod query;
pub mod response;
pub mod rest;
pub mod retry;
pub mod tx;
pub mod util;

pub use error::NodeError;
pub use message::Message;
pub use provider::*;
pub use query::QueryProvider;
pub use tx::{FragmentId, TxProvider};
pub use util::Address;
