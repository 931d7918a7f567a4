//! Provider settings, configuration sources and environment overrides.
//!
//! Precedence for the operator URL of the active network:
//! environment variable > settings value > none. Empty strings are treated
//! as unset at every level.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::network::NetworkMode;
use crate::probe::DEFAULT_PROBE_TIMEOUT;

/// Settings read from the configuration source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    /// `"mainnet"` selects mainnet; anything else means testnet.
    #[serde(default)]
    pub network_mode: Option<String>,
    /// Operator endpoint for mainnet.
    #[serde(default)]
    pub polygon_rpc_url: Option<String>,
    /// Operator endpoint for Amoy testnet.
    #[serde(default)]
    pub polygon_testnet_rpc_url: Option<String>,
    /// Upper bound for a single health probe.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT.as_millis() as u64
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            network_mode: None,
            polygon_rpc_url: None,
            polygon_testnet_rpc_url: None,
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl ProviderSettings {
    /// Network mode named by `network_mode`; testnet unless it is `"mainnet"`.
    pub fn network_mode(&self) -> NetworkMode {
        NetworkMode::from_config(self.network_mode.as_deref())
    }

    /// `probe_timeout_ms` as a [`Duration`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Resolve the operator-configured URL for `mode`.
    pub fn configured_url(&self, mode: NetworkMode, env: &EnvOverrides) -> Option<String> {
        let (from_env, from_settings) = match mode {
            NetworkMode::Testnet => (&env.polygon_testnet_rpc_url, &self.polygon_testnet_rpc_url),
            NetworkMode::Mainnet => (&env.polygon_rpc_url, &self.polygon_rpc_url),
        };
        non_empty(from_env)
            .or_else(|| non_empty(from_settings))
            .map(str::to_string)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Read-only source of provider settings.
///
/// Consulted on every non-cached `initialize`, so implementations may pick up
/// changes between runs.
pub trait ConfigSource: Send + Sync + 'static {
    fn settings(&self) -> ProviderSettings;
}

/// Fixed in-memory settings.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig(pub ProviderSettings);

impl ConfigSource for StaticConfig {
    fn settings(&self) -> ProviderSettings {
        self.0.clone()
    }
}

/// Settings stored as a camelCase JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    /// Read settings from `path`. Nothing is touched until the first load.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the settings document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<ProviderSettings>, ConfigError> {
        let display = self.path.display().to_string();
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ConfigError::Io { path: display, source }),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| ConfigError::Parse { path: display, source })
    }
}

impl ConfigSource for JsonFileConfig {
    fn settings(&self) -> ProviderSettings {
        match self.load() {
            Ok(Some(settings)) => settings,
            Ok(None) => ProviderSettings::default(),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable provider config, using defaults");
                ProviderSettings::default()
            }
        }
    }
}

/// Per-network URL overrides taken from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub polygon_rpc_url: Option<String>,
    pub polygon_testnet_rpc_url: Option<String>,
}

impl EnvOverrides {
    /// Snapshot `POLYGON_RPC_URL` and `POLYGON_TESTNET_RPC_URL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            polygon_rpc_url: lookup(NetworkMode::Mainnet.env_var()),
            polygon_testnet_rpc_url: lookup(NetworkMode::Testnet.env_var()),
        }
    }
}

/// Source of per-network URL overrides.
///
/// Like [`ConfigSource`], consulted on every non-cached `initialize` and on
/// every candidate listing.
pub trait EnvSource: Send + Sync + 'static {
    /// Overrides as of now.
    fn overrides(&self) -> EnvOverrides;
}

/// A fixed set of overrides.
impl EnvSource for EnvOverrides {
    fn overrides(&self) -> EnvOverrides {
        self.clone()
    }
}

/// Reads the process environment each time it is asked.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn overrides(&self) -> EnvOverrides {
        EnvOverrides::from_env()
    }
}
