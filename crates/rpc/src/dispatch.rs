//! Forwarding of unary calls.
//!
//! Frames which are neither subscribe nor unsubscribe requests are handed to a [RpcDispatcher]
//! as raw bytes, and its reply is written back to the client verbatim.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::value::RawValue;

use crate::jsonrpc::{RequestId, RpcError, RpcResponse};

#[async_trait]
pub trait RpcDispatcher: Send + Sync {
    /// Executes the request in `frame` and returns the complete JSON-RPC reply.
    async fn dispatch(&self, id: &RequestId, frame: Vec<u8>) -> anyhow::Result<Box<RawValue>>;
}

/// Forwards unary calls to a JSON-RPC server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    inner: reqwest::Client,
    url: Url,
}

impl HttpDispatcher {
    pub fn new(url: Url) -> reqwest::Result<Self> {
        Ok(Self {
            inner: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            url,
        })
    }
}

#[async_trait]
impl RpcDispatcher for HttpDispatcher {
    async fn dispatch(&self, _: &RequestId, frame: Vec<u8>) -> anyhow::Result<Box<RawValue>> {
        let response = self
            .inner
            .post(self.url.clone())
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(frame)
            .send()
            .await
            .context("Sending request")?
            .error_for_status()
            .context("RPC server replied with an error status")?;

        let body = response.bytes().await.context("Reading response body")?;
        serde_json::from_slice(&body).context("Parsing response body")
    }
}

/// Replies to every unary call with a `Method not found` error.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodNotFoundDispatcher;

#[async_trait]
impl RpcDispatcher for MethodNotFoundDispatcher {
    async fn dispatch(&self, id: &RequestId, _: Vec<u8>) -> anyhow::Result<Box<RawValue>> {
        let response = RpcResponse::error(RpcError::MethodNotFound, id.clone());
        serde_json::value::to_raw_value(&response).context("Encoding reply")
    }
}
