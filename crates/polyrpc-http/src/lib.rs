//! polyrpc-http: HTTP JSON-RPC transport and the process-wide provider.
//!
//! # Quick start
//! ```rust,no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use polyrpc_core::RpcTransport;
//! use polyrpc_http::global::{get_provider, initialize_provider};
//!
//! initialize_provider().await;
//! let provider = get_provider()?;
//! let chain_id = provider.chain_id().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod global;

pub use client::{HttpRpcClient, HttpTransportFactory, DEFAULT_REQUEST_TIMEOUT};
pub use global::{get_provider, initialize_provider, reset_provider};
