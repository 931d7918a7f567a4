//! polyrpc-core: endpoint selection and failover for a Polygon RPC connection.
//!
//! # Overview
//!
//! Given an operator-configured URL and the built-in public endpoints for the
//! active network, the core decides which endpoint to use and keeps a single
//! shared connection handle bound to it:
//!
//! - [`RpcTransport`] / [`TransportFactory`]: the seam to the RPC client
//! - [`build_candidates`]: priority-ordered candidate list
//! - [`HealthProbe`]: one `eth_chainId` round trip raced against a timeout
//! - [`ConnectionManager`]: sequential fallback, caching, get and reset
//! - [`config`] module: settings file, environment overrides

pub mod candidates;
pub mod config;
pub mod error;
pub mod manager;
pub mod network;
pub mod probe;
pub mod request;
pub mod transport;

pub use candidates::build_candidates;
pub use config::{
    ConfigSource, EnvOverrides, EnvSource, JsonFileConfig, ProcessEnv, ProviderSettings,
    StaticConfig,
};
pub use error::{ConfigError, ProviderError, TransportError};
pub use manager::{ConnectionManager, InitOutcome};
pub use network::{short_url, NetworkMode};
pub use probe::{HealthProbe, ProbeFailure, ProbeOutcome, DEFAULT_PROBE_TIMEOUT};
pub use request::{JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::{ConnectionOptions, RpcTransport, TransportFactory};
