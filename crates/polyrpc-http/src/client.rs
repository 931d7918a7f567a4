//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Honours [`ConnectionOptions`]:
//! - `static_network`: the first `eth_chainId` answer is cached and reused
//! - `batch_max_count`: batches are split into chunks of at most this size,
//!   and chunks of one go out as plain single requests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use polyrpc_core::error::TransportError;
use polyrpc_core::request::{JsonRpcRequest, JsonRpcResponse, RpcId};
use polyrpc_core::transport::{decode_chain_id, ConnectionOptions, RpcTransport, TransportFactory};

/// Default per-request timeout for bound handles.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP JSON-RPC connection handle bound to one endpoint.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    options: ConnectionOptions,
    request_timeout: Duration,
    next_id: AtomicU64,
    chain_id: OnceCell<u64>,
}

impl HttpRpcClient {
    /// Create a client for `url`. Fails on a malformed or non-HTTP URL; no
    /// request is sent.
    pub fn new(
        url: impl Into<String>,
        options: ConnectionOptions,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let url = url.into();
        validate_url(&url)?;

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url,
            http,
            options,
            request_timeout,
            next_id: AtomicU64::new(1),
            chain_id: OnceCell::new(),
        })
    }

    /// Create with default options and timeout.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, ConnectionOptions::default(), DEFAULT_REQUEST_TIMEOUT)
    }

    async fn post<B, R>(&self, body: &B) -> Result<R, TransportError>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<R>().await.map_err(|e| self.map_reqwest(e))
    }

    fn map_reqwest(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }

    async fn fetch_chain_id(&self) -> Result<u64, TransportError> {
        decode_chain_id(self.request("eth_chainId", vec![]).await?)
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::trace!(url = %self.url, method = %req.method, "sending request");
        self.post(&req).await
    }

    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let chunk_size = self.options.batch_max_count.max(1);
        let mut responses = Vec::with_capacity(reqs.len());
        for chunk in reqs.chunks(chunk_size) {
            if let [single] = chunk {
                responses.push(self.send(single.clone()).await?);
            } else {
                let batch: Vec<JsonRpcResponse> = self.post(chunk).await?;
                responses.extend(batch);
            }
        }
        Ok(responses)
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn request(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resp = self.send(JsonRpcRequest::new(id, method, params)).await?;
        if resp.id != RpcId::Number(id) {
            tracing::debug!(url = %self.url, expected = id, got = %resp.id, "response id mismatch");
        }
        resp.into_result().map_err(TransportError::Rpc)
    }

    async fn chain_id(&self) -> Result<u64, TransportError> {
        if !self.options.static_network {
            return self.fetch_chain_id().await;
        }
        self.chain_id
            .get_or_try_init(|| self.fetch_chain_id())
            .await
            .copied()
    }
}

impl std::fmt::Debug for HttpRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRpcClient")
            .field("url", &self.url)
            .field("options", &self.options)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn validate_url(url: &str) -> Result<(), TransportError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| TransportError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(TransportError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}

/// Builds [`HttpRpcClient`] handles for the connection manager.
#[derive(Debug, Clone)]
pub struct HttpTransportFactory {
    request_timeout: Duration,
}

impl HttpTransportFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for HttpTransportFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl TransportFactory for HttpTransportFactory {
    fn connect(
        &self,
        url: &str,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn RpcTransport>, TransportError> {
        let client = HttpRpcClient::new(url, *options, self.request_timeout)?;
        Ok(Arc::new(client))
    }
}
