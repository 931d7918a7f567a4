//! Error types for transports, configuration and the connection manager.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur while building or using an RPC transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint URL could not be parsed or uses an unsupported scheme.
    #[error("invalid endpoint URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP request failed (connection refused, TLS, non-2xx status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request did not complete within the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by [`ConnectionManager`](crate::manager::ConnectionManager).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The accessor was called before a successful `initialize`.
    #[error("Provider not initialized. Call initialize_provider() first.")]
    Uninitialized,
}

/// Errors produced while loading provider settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
