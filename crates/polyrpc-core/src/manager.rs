//! Endpoint selection and the cached connection handle.
//!
//! [`ConnectionManager::initialize`] walks the candidate list in priority
//! order, probing one endpoint at a time, and binds the cache to the first
//! one that answers. If none does, it binds to the network's first default
//! without verification, so callers always end up with a handle.
//!
//! ```text
//! Uninitialized ──initialize──▶ Initialized(url) ──reset──▶ Uninitialized
//!                                   │    ▲
//!                         invalidate│    │initialize (re-probe / reuse)
//!                                   ▼    │
//!                                Stale(url)
//! ```

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::Mutex;

use crate::candidates::build_candidates;
use crate::config::{ConfigSource, EnvOverrides, EnvSource, ProviderSettings};
use crate::error::ProviderError;
use crate::network::{short_url, NetworkMode};
use crate::probe::{HealthProbe, ProbeOutcome};
use crate::transport::{ConnectionOptions, RpcTransport, TransportFactory};

const LOG_URL_LEN: usize = 50;

/// How `initialize` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// The cache was already bound; nothing was probed.
    AlreadyInitialized { url: String },
    /// The previously bound handle was still cached and was re-used.
    Reused { url: String },
    /// A candidate answered the probe and a fresh handle was bound.
    Verified { url: String, chain_id: u64 },
    /// Every candidate failed; bound to the fallback without checking it.
    Unverified { url: String },
    /// Even the fallback handle could not be constructed.
    Unbound,
}

impl InitOutcome {
    /// URL the cache is bound to after this run, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::AlreadyInitialized { url }
            | Self::Reused { url }
            | Self::Verified { url, .. }
            | Self::Unverified { url } => Some(url),
            Self::Unbound => None,
        }
    }
}

/// Cached binding. `initialized` implies `handle` is set and `bound_url`
/// is non-empty.
#[derive(Default)]
struct ConnectionCache {
    handle: Option<Arc<dyn RpcTransport>>,
    initialized: bool,
    bound_url: String,
}

impl ConnectionCache {
    fn bind(&mut self, url: &str, handle: Arc<dyn RpcTransport>) {
        self.handle = Some(handle);
        self.bound_url = url.to_string();
        self.initialized = true;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn warm_url(&self) -> Option<&str> {
        (self.initialized && self.handle.is_some()).then_some(self.bound_url.as_str())
    }
}

/// Owns the selected connection handle for one process or test.
pub struct ConnectionManager {
    factory: Arc<dyn TransportFactory>,
    config: Arc<dyn ConfigSource>,
    env: Arc<dyn EnvSource>,
    options: ConnectionOptions,
    probe_timeout: Option<Duration>,
    mode_override: Option<NetworkMode>,
    cache: RwLock<ConnectionCache>,
    init_guard: Mutex<()>,
}

impl ConnectionManager {
    /// Create a manager with no environment overrides and default options.
    pub fn new(factory: Arc<dyn TransportFactory>, config: Arc<dyn ConfigSource>) -> Self {
        Self {
            factory,
            config,
            env: Arc::new(EnvOverrides::default()),
            options: ConnectionOptions::default(),
            probe_timeout: None,
            mode_override: None,
            cache: RwLock::new(ConnectionCache::default()),
            init_guard: Mutex::new(()),
        }
    }

    /// Take URL overrides from `env`, consulted on every search.
    pub fn with_env(mut self, env: impl EnvSource) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Override the probe timeout from settings.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    /// Pin the network mode regardless of settings.
    pub fn with_network_mode(mut self, mode: NetworkMode) -> Self {
        self.mode_override = Some(mode);
        self
    }

    /// Network mode the next `initialize` would target.
    pub fn network_mode(&self) -> NetworkMode {
        self.mode_override
            .unwrap_or_else(|| self.config.settings().network_mode())
    }

    /// Candidate list the next `initialize` would walk.
    pub fn candidates(&self) -> Vec<String> {
        self.resolve().2
    }

    /// Current settings, effective mode and candidate list. Settings and
    /// environment overrides are both read fresh.
    fn resolve(&self) -> (ProviderSettings, NetworkMode, Vec<String>) {
        let settings = self.config.settings();
        let mode = self.mode_override.unwrap_or_else(|| settings.network_mode());
        let configured = settings.configured_url(mode, &self.env.overrides());
        let candidates = build_candidates(mode, configured.as_deref());
        (settings, mode, candidates)
    }

    /// Select an endpoint and bind the cache to it.
    ///
    /// Returns immediately when already initialized. Concurrent callers are
    /// serialized: the first runs the search, the rest observe its result.
    pub async fn initialize(&self) -> InitOutcome {
        let _guard = self.init_guard.lock().await;

        if let Some(url) = self.read_cache().warm_url() {
            return InitOutcome::AlreadyInitialized {
                url: url.to_string(),
            };
        }

        let (settings, mode, candidates) = self.resolve();
        let probe = HealthProbe::new(
            self.factory.clone(),
            self.options,
            self.probe_timeout.unwrap_or_else(|| settings.probe_timeout()),
        );

        tracing::info!(
            network = mode.display_name(),
            candidates = candidates.len(),
            "searching for a working RPC endpoint"
        );

        for url in &candidates {
            if self.reuse_if_bound(url) {
                tracing::info!(url = %short_url(url, LOG_URL_LEN), "using existing connection");
                return InitOutcome::Reused { url: url.clone() };
            }

            tracing::debug!(url = %short_url(url, LOG_URL_LEN), "probing RPC endpoint");

            match probe.probe(url).await {
                ProbeOutcome::Reachable { chain_id, latency } => {
                    if chain_id != mode.expected_chain_id() {
                        tracing::warn!(
                            url = %short_url(url, LOG_URL_LEN),
                            chain_id,
                            expected = mode.expected_chain_id(),
                            "endpoint reports an unexpected chain id"
                        );
                    }
                    match self.factory.connect(url, &self.options) {
                        Ok(handle) => {
                            self.write_cache().bind(url, handle);
                            tracing::info!(
                                url = %short_url(url, LOG_URL_LEN),
                                chain_id,
                                latency_ms = latency.as_millis() as u64,
                                "RPC endpoint connected"
                            );
                            return InitOutcome::Verified {
                                url: url.clone(),
                                chain_id,
                            };
                        }
                        Err(e) => {
                            self.write_cache().clear();
                            tracing::warn!(
                                url = %short_url(url, LOG_URL_LEN),
                                error = %e,
                                "failed to create provider after a successful probe"
                            );
                        }
                    }
                }
                ProbeOutcome::Failed(reason) => {
                    tracing::warn!(
                        url = %short_url(url, LOG_URL_LEN),
                        error = %reason,
                        "RPC endpoint unavailable"
                    );
                }
            }
        }

        let fallback = mode.fallback_endpoint();
        tracing::warn!(
            url = fallback,
            "all RPC endpoints unavailable, using fallback without verification"
        );
        match self.factory.connect(fallback, &self.options) {
            Ok(handle) => {
                self.write_cache().bind(fallback, handle);
                InitOutcome::Unverified {
                    url: fallback.to_string(),
                }
            }
            Err(e) => {
                tracing::error!(url = fallback, error = %e, "failed to create fallback provider");
                InitOutcome::Unbound
            }
        }
    }

    /// The cached handle, or [`ProviderError::Uninitialized`].
    pub fn get(&self) -> Result<Arc<dyn RpcTransport>, ProviderError> {
        let cache = self.read_cache();
        cache
            .handle
            .as_ref()
            .filter(|_| cache.initialized)
            .cloned()
            .ok_or(ProviderError::Uninitialized)
    }

    /// Drop the cached handle; the next `initialize` starts from scratch.
    pub fn reset(&self) {
        self.write_cache().clear();
    }

    /// Mark the binding stale while keeping the handle.
    ///
    /// `get` fails until the next `initialize`, which probes higher-priority
    /// candidates again and re-uses the handle if it reaches the bound URL.
    pub fn invalidate(&self) {
        self.write_cache().initialized = false;
    }

    /// Whether `get` would currently succeed.
    pub fn is_initialized(&self) -> bool {
        self.read_cache().initialized
    }

    /// URL of the current binding, if initialized.
    pub fn bound_url(&self) -> Option<String> {
        self.read_cache().warm_url().map(str::to_string)
    }

    fn reuse_if_bound(&self, url: &str) -> bool {
        let mut cache = self.write_cache();
        if cache.handle.is_some() && cache.bound_url == url {
            cache.initialized = true;
            return true;
        }
        false
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, ConnectionCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, ConnectionCache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.read_cache();
        f.debug_struct("ConnectionManager")
            .field("initialized", &cache.initialized)
            .field("bound_url", &cache.bound_url)
            .field("options", &self.options)
            .finish()
    }
}
