// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tx::FragmentId;

/// Linear fee parameters charged per transaction.
///
/// A snapshot: nodes may change fees between calls, so never cache one across builds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub constant: u64,
    pub coefficient: u64,
    #[serde(default)]
    pub certificate: u64,
}

/// The subset of `GET /settings` the client needs.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub fees: FeeSchedule,
    #[serde(default)]
    pub block0_hash: Option<String>,
    #[serde(default)]
    pub max_txs_per_block: Option<u32>,
}

/// Pools an account delegates to, with their weights.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    #[serde(default)]
    pub pools: Vec<(String, u64)>,
}

/// Account state returned by `GET /account/{address}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Older nodes report a single spending counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    counter: Option<u64>,
    /// Newer nodes report one counter per lane; lane 0 is the one transactions use.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    counters: Vec<u64>,
    pub value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation: Option<Delegation>,
}

impl AccountState {
    pub fn new(counter: u64, value: u64) -> Self {
        AccountState {
            counter: Some(counter),
            counters: Vec::new(),
            value,
            delegation: None,
        }
    }

    /// The account's spending counter (nonce).
    pub fn counter(&self) -> u64 {
        self.counter
            .or_else(|| self.counters.first().copied())
            .unwrap_or_default()
    }

    /// Ids of the pools this account delegates to.
    pub fn pools(&self) -> Vec<String> {
        self.delegation
            .as_ref()
            .map(|d| d.pools.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }
}

/// Stake distribution returned by `GET /stake`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeDistribution {
    /// Epoch the distribution was computed for.
    #[serde(default)]
    pub epoch: u64,
    pub stake: Stake,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    /// Stake delegated to pools that no longer exist.
    #[serde(default)]
    pub dangling: u64,
    /// Stake not delegated to any pool.
    #[serde(default)]
    pub unassigned: u64,
    /// Stake per pool id.
    #[serde(default)]
    pub pools: Vec<(String, u64)>,
}

impl StakeDistribution {
    /// Sum of all stake, delegated or not.
    pub fn total(&self) -> u64 {
        let pooled = self
            .stake
            .pools
            .iter()
            .fold(0u64, |acc, (_, v)| acc.saturating_add(*v));
        pooled
            .saturating_add(self.stake.dangling)
            .saturating_add(self.stake.unassigned)
    }
}

/// Fragment status as reported by the node's message log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogStatus {
    /// Still in the node's pending pool.
    Pending,
    /// Included in a block.
    InABlock { date: String, block: String },
    /// Refused at settlement time.
    Rejected { reason: String },
    /// Anything else the node reports; kept verbatim for inspection.
    Other(Value),
}

impl From<Value> for LogStatus {
    fn from(v: Value) -> Self {
        match &v {
            Value::String(s) if s == "Pending" => LogStatus::Pending,
            Value::Object(map) => {
                if let Some(inner) = map.get("InABlock") {
                    LogStatus::InABlock {
                        date: string_field(inner, "date"),
                        block: string_field(inner, "block"),
                    }
                } else if let Some(inner) = map.get("Rejected") {
                    let reason = match inner {
                        Value::String(s) => s.clone(),
                        other => string_field(other, "reason"),
                    };
                    LogStatus::Rejected { reason }
                } else {
                    LogStatus::Other(v)
                }
            }
            _ => LogStatus::Other(v),
        }
    }
}

fn string_field(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

impl<'de> Deserialize<'de> for LogStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(LogStatus::from)
    }
}

/// One entry of `GET /fragment/logs`.
#[derive(Clone, Debug, Deserialize)]
pub struct MessageLogEntry {
    pub fragment_id: FragmentId,
    pub status: LogStatus,
    #[serde(default)]
    pub received_from: Option<String>,
    #[serde(default)]
    pub received_at: Option<String>,
    #[serde(default)]
    pub last_updated_at: Option<String>,
}

impl MessageLogEntry {
    pub fn new(fragment_id: FragmentId, status: LogStatus) -> Self {
        MessageLogEntry {
            fragment_id,
            status,
            received_from: None,
            received_at: None,
            last_updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_settings() {
        let settings: Settings = serde_json::from_value(json!({
            "block0Hash": "adbdd5ede31637f6c9bad5c271eec0bc3d0cb9efb86a5b913bb55cba549d0770",
            "block0Time": "2019-12-13T19:13:37+00:00",
            "consensusVersion": "genesis",
            "fees": {"certificate": 10000, "coefficient": 50, "constant": 1000},
            "maxTxsPerBlock": 255
        }))
        .unwrap();

        assert_eq!(
            settings.fees,
            FeeSchedule {
                constant: 1000,
                coefficient: 50,
                certificate: 10000
            }
        );
        assert_eq!(settings.max_txs_per_block, Some(255));
    }

    #[test]
    fn decodes_account_counter_forms() {
        let old: AccountState = serde_json::from_value(json!({
            "counter": 7,
            "value": 1000,
            "delegation": {"pools": [["pool-a", 1]]}
        }))
        .unwrap();
        assert_eq!(old.counter(), 7);
        assert_eq!(old.pools(), vec!["pool-a".to_string()]);

        let new: AccountState =
            serde_json::from_value(json!({"counters": [3, 0, 0], "value": 5})).unwrap();
        assert_eq!(new.counter(), 3);
        assert!(new.pools().is_empty());
    }

    #[test]
    fn decodes_stake_distribution() {
        let stake: StakeDistribution = serde_json::from_value(json!({
            "epoch": 12,
            "stake": {
                "dangling": 1,
                "pools": [["5cf03f", 300], ["3815602", 200]],
                "unassigned": 10
            }
        }))
        .unwrap();
        assert_eq!(stake.epoch, 12);
        assert_eq!(stake.stake.pools[0], ("5cf03f".to_string(), 300));
        assert_eq!(stake.total(), 511);
    }

    #[test]
    fn decodes_message_log_statuses() {
        let entries: Vec<MessageLogEntry> = serde_json::from_value(json!([
            {"fragment_id": "aa", "status": "Pending", "received_from": "Rest"},
            {"fragment_id": "bb", "status": {"InABlock": {"date": "12.3", "block": "ff00"}}},
            {"fragment_id": "cc", "status": {"Rejected": {"reason": "pool full"}}},
            {"fragment_id": "dd", "status": {"Squashed": {}}}
        ]))
        .unwrap();

        assert_eq!(entries[0].status, LogStatus::Pending);
        assert_eq!(
            entries[1].status,
            LogStatus::InABlock {
                date: "12.3".into(),
                block: "ff00".into()
            }
        );
        assert_eq!(
            entries[2].status,
            LogStatus::Rejected {
                reason: "pool full".into()
            }
        );
        assert!(matches!(entries[3].status, LogStatus::Other(_)));
    }
}
