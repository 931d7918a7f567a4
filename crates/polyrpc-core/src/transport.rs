//! The `RpcTransport` trait and the factory seam used to build transports.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{parse_quantity, JsonRpcRequest, JsonRpcResponse};

/// Options applied when a connection handle is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Fetch the chain id once and treat it as fixed afterwards, instead of
    /// re-detecting the network on every call.
    pub static_network: bool,
    /// Maximum number of requests folded into one batch.
    pub batch_max_count: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            static_network: true,
            batch_max_count: 1,
        }
    }
}

/// The central async trait every RPC connection handle implements.
///
/// Implementations must be `Send + Sync`; handles are shared as
/// `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Send several requests. The default sends them one after another.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let mut responses = Vec::with_capacity(reqs.len());
        for req in reqs {
            responses.push(self.send(req).await?);
        }
        Ok(responses)
    }

    /// The endpoint URL this handle is bound to.
    fn url(&self) -> &str;

    /// Call `method` and return the raw `result` value.
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let resp = self.send(JsonRpcRequest::new(1, method, params)).await?;
        resp.into_result().map_err(TransportError::Rpc)
    }

    /// Fetch the network identity (`eth_chainId`).
    async fn chain_id(&self) -> Result<u64, TransportError> {
        decode_chain_id(self.request("eth_chainId", vec![]).await?)
    }
}

/// Decode the `result` of an `eth_chainId` call.
pub fn decode_chain_id(value: Value) -> Result<u64, TransportError> {
    let raw = value.as_str().ok_or_else(|| {
        TransportError::Other(format!("eth_chainId returned a non-string result: {value}"))
    })?;
    parse_quantity(raw).ok_or_else(|| {
        TransportError::Other(format!("eth_chainId returned a malformed quantity: {raw}"))
    })
}

/// Builds connection handles from a URL.
///
/// Construction does no network I/O; it fails only on malformed input or a
/// client that cannot be set up.
pub trait TransportFactory: Send + Sync + 'static {
    fn connect(
        &self,
        url: &str,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn RpcTransport>, TransportError>;
}
