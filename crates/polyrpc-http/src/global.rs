//! Process-wide provider built on [`HttpTransportFactory`].
//!
//! The manager is created on first use. Settings come from the JSON file named
//! by `POLYRPC_CONFIG` (default `polyrpc.json`, re-read on every
//! non-cached initialize); URL overrides come from `POLYGON_RPC_URL` and
//! `POLYGON_TESTNET_RPC_URL`, read at the same points.

use std::sync::{Arc, OnceLock};

use polyrpc_core::{
    ConnectionManager, InitOutcome, JsonFileConfig, ProcessEnv, ProviderError, RpcTransport,
};

use crate::client::HttpTransportFactory;

/// Environment variable naming the settings file.
pub const CONFIG_PATH_VAR: &str = "POLYRPC_CONFIG";
/// Settings file used when `POLYRPC_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "polyrpc.json";

static MANAGER: OnceLock<ConnectionManager> = OnceLock::new();

/// The shared manager.
pub fn manager() -> &'static ConnectionManager {
    MANAGER.get_or_init(|| {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        ConnectionManager::new(
            Arc::new(HttpTransportFactory::default()),
            Arc::new(JsonFileConfig::new(path)),
        )
        .with_env(ProcessEnv)
    })
}

/// Select a working endpoint. Always leaves a handle in place unless the
/// fallback itself cannot be constructed.
pub async fn initialize_provider() -> InitOutcome {
    manager().initialize().await
}

/// The shared handle; fails until [`initialize_provider`] has run.
pub fn get_provider() -> Result<Arc<dyn RpcTransport>, ProviderError> {
    manager().get()
}

/// Forget the current binding.
pub fn reset_provider() {
    manager().reset();
}
