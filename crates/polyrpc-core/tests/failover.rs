//! End-to-end endpoint selection against a scripted transport factory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use polyrpc_core::network::{MAINNET_ENDPOINTS, TESTNET_ENDPOINTS};
use polyrpc_core::{
    ConnectionManager, ConnectionOptions, EnvOverrides, EnvSource, InitOutcome, JsonRpcRequest,
    JsonRpcResponse, NetworkMode, ProviderError, ProviderSettings, RpcTransport, StaticConfig,
    TransportError, TransportFactory,
};

#[derive(Clone, Copy)]
enum Behavior {
    /// Answers `eth_chainId` with the given hex quantity.
    Up(&'static str),
    /// Returns a transport error.
    Down,
    /// Never answers.
    Hang,
    /// The factory rejects the URL.
    Malformed,
    /// Probe succeeds, but building the real handle afterwards fails.
    BreaksOnBind(&'static str),
}

#[derive(Default)]
struct Log {
    connects: Vec<String>,
    probes: Vec<String>,
}

struct ScriptedFactory {
    script: HashMap<String, Behavior>,
    log: Arc<Mutex<Log>>,
}

impl ScriptedFactory {
    fn new(script: &[(&str, Behavior)]) -> Self {
        Self {
            script: script
                .iter()
                .map(|(url, b)| (url.to_string(), *b))
                .collect(),
            log: Arc::default(),
        }
    }

    fn behavior(&self, url: &str) -> Behavior {
        self.script.get(url).copied().unwrap_or(Behavior::Down)
    }
}

impl TransportFactory for ScriptedFactory {
    fn connect(
        &self,
        url: &str,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn RpcTransport>, TransportError> {
        assert_eq!(*options, ConnectionOptions::default());
        let mut log = self.log.lock().unwrap();
        let previous = log.connects.iter().filter(|u| u.as_str() == url).count();
        log.connects.push(url.to_string());

        let behavior = self.behavior(url);
        match behavior {
            Behavior::Malformed => Err(TransportError::InvalidUrl {
                url: url.to_string(),
                reason: "scripted".into(),
            }),
            Behavior::BreaksOnBind(_) if previous > 0 => {
                Err(TransportError::Other("scripted bind failure".into()))
            }
            _ => Ok(Arc::new(ScriptedTransport {
                url: url.to_string(),
                behavior,
                log: self.log.clone(),
            })),
        }
    }
}

struct ScriptedTransport {
    url: String,
    behavior: Behavior,
    log: Arc<Mutex<Log>>,
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.log.lock().unwrap().probes.push(self.url.clone());
        match self.behavior {
            Behavior::Up(hex) | Behavior::BreaksOnBind(hex) => {
                Ok(JsonRpcResponse::success(req.id, hex.into()))
            }
            Behavior::Down | Behavior::Malformed => {
                Err(TransportError::Http("connection refused".into()))
            }
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError::Other("unreachable".into()))
            }
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

struct Harness {
    manager: ConnectionManager,
    log: Arc<Mutex<Log>>,
}

impl Harness {
    fn probes(&self) -> Vec<String> {
        self.log.lock().unwrap().probes.clone()
    }

    fn clear_log(&self) {
        let mut log = self.log.lock().unwrap();
        log.probes.clear();
        log.connects.clear();
    }
}

fn harness(settings: ProviderSettings, env: EnvOverrides, script: &[(&str, Behavior)]) -> Harness {
    let factory = ScriptedFactory::new(script);
    let log = factory.log.clone();
    let manager = ConnectionManager::new(Arc::new(factory), Arc::new(StaticConfig(settings)))
        .with_env(env)
        .with_probe_timeout(Duration::from_millis(50));
    Harness { manager, log }
}

fn mainnet() -> ProviderSettings {
    ProviderSettings {
        network_mode: Some("mainnet".into()),
        ..Default::default()
    }
}

const AMOY: &str = "0x13882";
const POLYGON: &str = "0x89";

#[tokio::test]
async fn testnet_third_default_wins() {
    let h = harness(
        ProviderSettings::default(),
        EnvOverrides::default(),
        &[(TESTNET_ENDPOINTS[2], Behavior::Up(AMOY))],
    );

    let out = h.manager.initialize().await;

    assert_eq!(
        out,
        InitOutcome::Verified {
            url: TESTNET_ENDPOINTS[2].into(),
            chain_id: 80_002
        }
    );
    assert_eq!(h.probes(), TESTNET_ENDPOINTS);
    assert_eq!(h.manager.get().unwrap().url(), TESTNET_ENDPOINTS[2]);
    assert_eq!(h.manager.bound_url().as_deref(), Some(TESTNET_ENDPOINTS[2]));
}

#[tokio::test]
async fn mainnet_override_wins_without_touching_defaults() {
    let override_url = "https://polygon.operator.example/rpc";
    let env = EnvOverrides {
        polygon_rpc_url: Some(override_url.into()),
        polygon_testnet_rpc_url: None,
    };
    let mut script: Vec<(&str, Behavior)> =
        MAINNET_ENDPOINTS.iter().map(|u| (*u, Behavior::Up(POLYGON))).collect();
    script.push((override_url, Behavior::Up(POLYGON)));
    let h = harness(mainnet(), env, &script);

    let out = h.manager.initialize().await;

    assert_eq!(out.url(), Some(override_url));
    assert_eq!(h.probes(), vec![override_url.to_string()]);
    let connects = h.log.lock().unwrap().connects.clone();
    assert!(connects.iter().all(|u| u == override_url));
}

#[tokio::test]
async fn configured_url_is_tried_before_defaults() {
    let settings = ProviderSettings {
        polygon_testnet_rpc_url: Some("https://amoy.operator.example".into()),
        ..Default::default()
    };
    let h = harness(
        settings,
        EnvOverrides::default(),
        &[(TESTNET_ENDPOINTS[0], Behavior::Up(AMOY))],
    );

    let out = h.manager.initialize().await;

    assert_eq!(out.url(), Some(TESTNET_ENDPOINTS[0]));
    assert_eq!(
        h.probes(),
        vec!["https://amoy.operator.example".to_string(), TESTNET_ENDPOINTS[0].to_string()]
    );
}

#[tokio::test]
async fn nothing_reachable_falls_back_unverified() {
    let h = harness(mainnet(), EnvOverrides::default(), &[]);

    let out = h.manager.initialize().await;

    assert_eq!(
        out,
        InitOutcome::Unverified {
            url: MAINNET_ENDPOINTS[0].into()
        }
    );
    assert!(h.manager.is_initialized());
    assert_eq!(h.manager.get().unwrap().url(), MAINNET_ENDPOINTS[0]);
    assert_eq!(h.probes(), MAINNET_ENDPOINTS);
}

#[tokio::test]
async fn second_initialize_does_not_probe() {
    let h = harness(
        ProviderSettings::default(),
        EnvOverrides::default(),
        &[(TESTNET_ENDPOINTS[1], Behavior::Up(AMOY))],
    );
    h.manager.initialize().await;
    let handle = h.manager.get().unwrap();
    h.clear_log();

    let out = h.manager.initialize().await;

    assert_eq!(
        out,
        InitOutcome::AlreadyInitialized {
            url: TESTNET_ENDPOINTS[1].into()
        }
    );
    assert!(h.probes().is_empty());
    assert!(h.log.lock().unwrap().connects.is_empty());
    assert!(Arc::ptr_eq(&handle, &h.manager.get().unwrap()));
}

#[tokio::test]
async fn reset_forces_a_fresh_probe() {
    let h = harness(
        ProviderSettings::default(),
        EnvOverrides::default(),
        &[(TESTNET_ENDPOINTS[0], Behavior::Up(AMOY))],
    );
    h.manager.initialize().await;
    h.clear_log();

    h.manager.reset();
    assert_eq!(h.manager.get().err(), Some(ProviderError::Uninitialized));

    let out = h.manager.initialize().await;
    assert!(matches!(out, InitOutcome::Verified { .. }));
    assert_eq!(h.probes(), vec![TESTNET_ENDPOINTS[0].to_string()]);
}

#[tokio::test]
async fn hanging_endpoint_is_skipped() {
    let h = harness(
        ProviderSettings::default(),
        EnvOverrides::default(),
        &[
            (TESTNET_ENDPOINTS[0], Behavior::Hang),
            (TESTNET_ENDPOINTS[1], Behavior::Up(AMOY)),
        ],
    );

    let started = Instant::now();
    let out = h.manager.initialize().await;

    assert_eq!(out.url(), Some(TESTNET_ENDPOINTS[1]));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn malformed_and_bind_failures_fall_through() {
    let settings = ProviderSettings {
        polygon_testnet_rpc_url: Some("::not-a-url::".into()),
        ..Default::default()
    };
    let h = harness(
        settings,
        EnvOverrides::default(),
        &[
            ("::not-a-url::", Behavior::Malformed),
            (TESTNET_ENDPOINTS[0], Behavior::BreaksOnBind(AMOY)),
            (TESTNET_ENDPOINTS[1], Behavior::Up(AMOY)),
        ],
    );

    let out = h.manager.initialize().await;

    assert_eq!(out.url(), Some(TESTNET_ENDPOINTS[1]));
    assert_eq!(h.manager.get().unwrap().url(), TESTNET_ENDPOINTS[1]);
}

#[tokio::test]
async fn unexpected_chain_id_still_binds() {
    let h = harness(
        ProviderSettings::default(),
        EnvOverrides::default(),
        &[(TESTNET_ENDPOINTS[0], Behavior::Up(POLYGON))],
    );

    let out = h.manager.initialize().await;

    assert_eq!(
        out,
        InitOutcome::Verified {
            url: TESTNET_ENDPOINTS[0].into(),
            chain_id: 137
        }
    );
}

#[tokio::test]
async fn invalidate_reprobes_higher_priority_then_reuses() {
    let h = harness(
        ProviderSettings::default(),
        EnvOverrides::default(),
        &[(TESTNET_ENDPOINTS[1], Behavior::Up(AMOY))],
    );
    h.manager.initialize().await;
    let handle = h.manager.get().unwrap();
    h.clear_log();

    h.manager.invalidate();
    assert!(h.manager.get().is_err());
    let out = h.manager.initialize().await;

    assert_eq!(
        out,
        InitOutcome::Reused {
            url: TESTNET_ENDPOINTS[1].into()
        }
    );
    assert_eq!(h.probes(), vec![TESTNET_ENDPOINTS[0].to_string()]);
    assert!(Arc::ptr_eq(&handle, &h.manager.get().unwrap()));
}

#[tokio::test]
async fn concurrent_initialize_probes_once() {
    let h = harness(
        ProviderSettings::default(),
        EnvOverrides::default(),
        &[(TESTNET_ENDPOINTS[0], Behavior::Up(AMOY))],
    );

    let outcomes =
        futures::future::join_all((0..4).map(|_| h.manager.initialize())).await;

    let verified = outcomes
        .iter()
        .filter(|o| matches!(o, InitOutcome::Verified { .. }))
        .count();
    assert_eq!(verified, 1);
    assert!(outcomes.iter().all(|o| o.url() == Some(TESTNET_ENDPOINTS[0])));
    assert_eq!(h.probes(), vec![TESTNET_ENDPOINTS[0].to_string()]);
}

#[test]
fn mode_and_candidates_follow_settings() {
    let h = harness(mainnet(), EnvOverrides::default(), &[]);
    assert_eq!(h.manager.network_mode(), NetworkMode::Mainnet);
    assert_eq!(h.manager.candidates(), MAINNET_ENDPOINTS);

    let pinned = harness(mainnet(), EnvOverrides::default(), &[]);
    let pinned = Harness {
        manager: pinned.manager.with_network_mode(NetworkMode::Testnet),
        log: pinned.log,
    };
    assert_eq!(pinned.manager.candidates(), TESTNET_ENDPOINTS);
}

/// Overrides that can change between searches, like a process environment.
#[derive(Clone, Default)]
struct SharedEnv(Arc<Mutex<EnvOverrides>>);

impl EnvSource for SharedEnv {
    fn overrides(&self) -> EnvOverrides {
        self.0.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn override_set_after_first_search_is_used_after_reset() {
    let operator = "https://amoy.operator.example/rpc";
    let env = SharedEnv::default();
    let factory = ScriptedFactory::new(&[
        (TESTNET_ENDPOINTS[0], Behavior::Up(AMOY)),
        (operator, Behavior::Up(AMOY)),
    ]);
    let manager = ConnectionManager::new(
        Arc::new(factory),
        Arc::new(StaticConfig(ProviderSettings::default())),
    )
    .with_env(env.clone())
    .with_probe_timeout(Duration::from_millis(50));

    assert_eq!(manager.initialize().await.url(), Some(TESTNET_ENDPOINTS[0]));

    env.0.lock().unwrap().polygon_testnet_rpc_url = Some(operator.into());
    assert_eq!(manager.candidates()[0], operator);

    manager.reset();
    assert_eq!(manager.initialize().await.url(), Some(operator));
    assert_eq!(manager.get().unwrap().url(), operator);
}

#[tokio::test]
async fn fallback_that_cannot_be_built_leaves_manager_unbound() {
    let h = harness(
        ProviderSettings::default(),
        EnvOverrides::default(),
        &[(TESTNET_ENDPOINTS[0], Behavior::Malformed)],
    );

    let out = h.manager.initialize().await;

    assert_eq!(out, InitOutcome::Unbound);
    assert_eq!(out.url(), None);
    assert!(!h.manager.is_initialized());
    assert_eq!(h.manager.bound_url(), None);
    assert_eq!(h.manager.get().err(), Some(ProviderError::Uninitialized));
}
