//! Bounded-time endpoint health probe.
//!
//! A probe builds a throwaway handle and performs one `eth_chainId` round
//! trip, raced against a timer. Whichever settles first decides the outcome;
//! a round trip that loses the race is dropped and never observed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::error::TransportError;
use crate::transport::{ConnectionOptions, TransportFactory};

/// Default upper bound for one probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a probe did not succeed.
#[derive(Debug, Error)]
pub enum ProbeFailure {
    /// The transient handle could not be built.
    #[error("connect failed: {0}")]
    Connect(#[source] TransportError),
    /// The round trip returned an error.
    #[error("request failed: {0}")]
    Request(#[source] TransportError),
    /// The round trip did not finish in time.
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),
}

/// Result of probing one endpoint.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The endpoint answered `eth_chainId` within the timeout.
    Reachable { chain_id: u64, latency: Duration },
    /// The endpoint cannot be used right now.
    Failed(ProbeFailure),
}

/// Probes endpoints through a [`TransportFactory`].
#[derive(Clone)]
pub struct HealthProbe {
    factory: Arc<dyn TransportFactory>,
    options: ConnectionOptions,
    timeout: Duration,
}

impl HealthProbe {
    /// Build transient handles with `options` and give each round trip
    /// `timeout` to finish.
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        options: ConnectionOptions,
        timeout: Duration,
    ) -> Self {
        Self {
            factory,
            options,
            timeout,
        }
    }

    /// Probe `url`. Never returns an error; every failure is an outcome.
    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        let transport = match self.factory.connect(url, &self.options) {
            Ok(t) => t,
            Err(e) => return ProbeOutcome::Failed(ProbeFailure::Connect(e)),
        };

        let started = Instant::now();
        match tokio::time::timeout(self.timeout, transport.chain_id()).await {
            Ok(Ok(chain_id)) => ProbeOutcome::Reachable {
                chain_id,
                latency: started.elapsed(),
            },
            Ok(Err(e)) => ProbeOutcome::Failed(ProbeFailure::Request(e)),
            Err(_) => ProbeOutcome::Failed(ProbeFailure::TimedOut(self.timeout)),
        }
    }
}

impl std::fmt::Debug for HealthProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthProbe")
            .field("options", &self.options)
            .field("timeout", &self.timeout)
            .finish()
    }
}
