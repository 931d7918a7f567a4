//! Network modes and their built-in public endpoints.
//!
//! These are free, no-API-key endpoints. They are used when no operator URL
//! is configured, and as the tail of the candidate list when one is.

use std::fmt;

/// Public Polygon Amoy testnet endpoints, in priority order.
pub const TESTNET_ENDPOINTS: &[&str] = &[
    "https://rpc-amoy.polygon.technology",
    "https://polygon-amoy.g.alchemy.com/v2/demo",
    "https://polygon-amoy-bor-rpc.publicnode.com",
];

/// Public Polygon PoS mainnet endpoints, in priority order.
pub const MAINNET_ENDPOINTS: &[&str] = &[
    "https://polygon-rpc.com",
    "https://polygon-bor-rpc.publicnode.com",
    "https://rpc.ankr.com/polygon",
];

/// Which class of endpoints is targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkMode {
    #[default]
    Testnet,
    Mainnet,
}

impl NetworkMode {
    /// Map a configuration value to a mode. Only `"mainnet"` selects mainnet.
    pub fn from_config(value: Option<&str>) -> Self {
        match value {
            Some("mainnet") => Self::Mainnet,
            _ => Self::Testnet,
        }
    }

    /// Built-in endpoints for this mode.
    pub fn default_endpoints(self) -> &'static [&'static str] {
        match self {
            Self::Testnet => TESTNET_ENDPOINTS,
            Self::Mainnet => MAINNET_ENDPOINTS,
        }
    }

    /// The endpoint used, unverified, when every candidate fails.
    pub fn fallback_endpoint(self) -> &'static str {
        self.default_endpoints()[0]
    }

    /// Chain id reported by a healthy node of this network.
    pub fn expected_chain_id(self) -> u64 {
        match self {
            Self::Testnet => 80_002,
            Self::Mainnet => 137,
        }
    }

    /// Environment variable holding the operator override for this mode.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::Testnet => "POLYGON_TESTNET_RPC_URL",
            Self::Mainnet => "POLYGON_RPC_URL",
        }
    }

    /// Human-readable network name for logs.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Testnet => "Amoy Testnet",
            Self::Mainnet => "Polygon Mainnet",
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Testnet => write!(f, "testnet"),
            Self::Mainnet => write!(f, "mainnet"),
        }
    }
}

/// Shorten `url` to at most `max` characters for logging, appending `...`
/// when cut. Keeps API keys embedded in long paths out of log lines.
pub fn short_url(url: &str, max: usize) -> String {
    match url.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &url[..idx]),
        None => url.to_string(),
    }
}
