// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::NodeError;
use crate::message::Message;
use crate::query::QueryProvider;
use crate::response::{AccountState, MessageLogEntry, Settings, StakeDistribution};
use crate::retry::RetryPolicy;
use crate::tx::{FragmentId, TxProvider};
use crate::util::Address;

/// Default timeout for a single request to the node.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A REST node provider talking to the `/api/v0` surface of a node.
#[derive(Clone, Debug)]
pub struct RestProvider {
    inner: reqwest::Client,
    url: Url,
    retry: RetryPolicy,
}

impl RestProvider {
    /// Create a provider for the node at `url` (e.g. `http://127.0.0.1:8443`).
    pub fn new_http(url: Url, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .build()
            .context("failed to build http client")?;
        tracing::debug!("Using REST client to submit requests to: {}", url);
        Ok(Self {
            inner,
            url,
            retry: RetryPolicy::default(),
        })
    }

    /// Set the retry policy used for idempotent queries.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The node base URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v0/{}", self.url.as_str().trim_end_matches('/'), path)
    }

    async fn get(&self, path: &str) -> anyhow::Result<Response> {
        let url = self.endpoint(path);
        self.retry
            .retry(path, || async {
                self.inner
                    .get(url.as_str())
                    .send()
                    .await
                    .map_err(|e| unreachable_err(&url, e))
            })
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let response = self.get(path).await?;
        let response = ensure_success(&self.endpoint(path), response).await?;
        decode_json(&self.endpoint(path), response).await
    }
}

#[async_trait]
impl QueryProvider for RestProvider {
    async fn settings(&self) -> anyhow::Result<Settings> {
        self.get_json("settings").await
    }

    async fn account(&self, address: &Address) -> anyhow::Result<AccountState> {
        let path = format!("account/{}", address);
        let response = self.get(&path).await?;
        // Unknown accounts come back as 404 (or 400 from older nodes) with an empty body.
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST
        ) {
            return Err(NodeError::AccountNotFound(address.clone()).into());
        }
        let response = ensure_success(&self.endpoint(&path), response).await?;
        decode_json(&self.endpoint(&path), response).await
    }

    async fn message_logs(&self) -> anyhow::Result<Vec<MessageLogEntry>> {
        self.get_json("fragment/logs").await
    }

    async fn block(&self, id: &str) -> anyhow::Result<Vec<u8>> {
        let path = format!("block/{}", id);
        let response = self.get(&path).await?;
        let response = ensure_success(&self.endpoint(&path), response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| unreachable_err(&self.endpoint(&path), e))?;
        Ok(bytes.to_vec())
    }

    async fn stake_pools(&self) -> anyhow::Result<Vec<String>> {
        self.get_json("stake_pools").await
    }

    async fn stake(&self) -> anyhow::Result<StakeDistribution> {
        self.get_json("stake").await
    }
}

#[async_trait]
impl TxProvider for RestProvider {
    async fn post_message(&self, message: &Message) -> anyhow::Result<FragmentId> {
        let url = self.endpoint("message");
        let response = self
            .inner
            .post(url.as_str())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(message.as_bytes().to_vec())
            .send()
            .await
            .map_err(|e| unreachable_err(&url, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| unreachable_err(&url, e))?;
        if !status.is_success() {
            return Err(NodeError::BroadcastRejected(format_err(status, &body)).into());
        }
        let id = body.parse::<FragmentId>().map_err(|e| NodeError::UnexpectedResponse {
            endpoint: url.clone(),
            message: e.to_string(),
        })?;
        tracing::info!("Posted fragment {} ({} bytes)", id, message.len());
        Ok(id)
    }
}

fn unreachable_err(url: &str, e: reqwest::Error) -> anyhow::Error {
    NodeError::NodeUnreachable(format!("{}: {}", url, e)).into()
}

async fn ensure_success(url: &str, response: Response) -> anyhow::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = if status == StatusCode::SERVICE_UNAVAILABLE {
        NodeError::NodeUnreachable(format!("{}: {}", url, format_err(status, &body)))
    } else {
        NodeError::UnexpectedResponse {
            endpoint: url.to_string(),
            message: format_err(status, &body),
        }
    };
    Err(err.into())
}

async fn decode_json<T: DeserializeOwned>(url: &str, response: Response) -> anyhow::Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| unreachable_err(url, e))?;
    serde_json::from_slice(&body).map_err(|e| {
        anyhow::Error::from(NodeError::UnexpectedResponse {
            endpoint: url.to_string(),
            message: format!("error decoding body: {}", e),
        })
    })
}

/// Format node error replies.
fn format_err(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status.to_string()
    } else {
        format!("{}; {}", status, body)
    }
}
