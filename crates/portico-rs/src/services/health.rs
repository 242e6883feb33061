//! Per-destination health monitoring with an integrated circuit breaker.
//!
//! The monitor keeps monotonic success/failure counters, a health flag
//! consumed by the load balancer, and a three-state breaker per upstream
//! destination. Probes run against `<destination>/health` under a fixed
//! deadline; the proxy completion hook feeds the same counters, so probe
//! traffic and live traffic drive one shared view of destination health.

use crate::models::settings::CircuitBreakerOptions;
use crate::services::route_table::RouteTable;
use crate::utils::url::probe_endpoint;
use ahash::HashMap as AHashMap;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::time::{interval, timeout};

/// State of a destination's circuit breaker.
///
/// # States
///
/// * `Closed` - normal operation, the destination receives traffic
/// * `Open` - the destination is skipped until the break elapses
/// * `HalfOpen` - one probe is allowed to test recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Read-only snapshot of a destination's health counters.
///
/// `total_requests` always equals `successful_requests + failed_requests`,
/// and `success_rate` is 0 when no observation has been recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub last_health_check: DateTime<Utc>,
    pub is_healthy: bool,
}

/// Live health state for one destination. Lifetime = process; entries are
/// created on first use and never removed.
#[derive(Debug)]
struct DestinationHealth {
    successful: AtomicU64,
    failed: AtomicU64,
    healthy: AtomicBool,
    last_check: Mutex<DateTime<Utc>>,
    /// The `(state, last_state_change)` pair is written and read under one
    /// lock so an observer never sees a state from one transition paired
    /// with a timestamp from another.
    circuit: Mutex<(CircuitState, DateTime<Utc>)>,
}

impl DestinationHealth {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
            last_check: Mutex::new(now),
            circuit: Mutex::new((CircuitState::Closed, now)),
        }
    }

    fn success_rate(&self) -> (u64, f64) {
        let successful = self.successful.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let total = successful + failed;
        let rate = if total == 0 {
            0.0
        } else {
            successful as f64 / total as f64
        };
        (total, rate)
    }
}

/// Health monitor and circuit breaker for upstream destinations.
///
/// # Probe semantics
///
/// `is_healthy` first reads the circuit pair atomically. An open circuit
/// inside the break window answers `false` without touching the network;
/// once the break has elapsed the circuit moves to half-open and a single
/// probe is issued. The probe is an HTTP GET to `<destination>/health`
/// (trailing slash stripped) under the configured probe deadline. Any 2xx
/// records a success and closes a half-open circuit; anything else records
/// a failure.
///
/// # Minimum-throughput rule
///
/// The breaker never opens before a destination has accumulated
/// `minimum_throughput` observations, so a transient failure at startup
/// cannot shed all traffic.
///
/// # Thread Safety
///
/// Counters are lock-free atomics; the circuit pair sits behind a small
/// mutex per destination. Safe to share via `Arc` across workers.
///
/// # Examples
///
/// ```
/// use portico_rs::models::settings::CircuitBreakerOptions;
/// use portico_rs::services::health::{CircuitState, HealthMonitor};
///
/// let monitor = HealthMonitor::new(CircuitBreakerOptions::default());
/// monitor.record_success("http://users-1:8080");
///
/// let stats = monitor.get_stats("http://users-1:8080");
/// assert_eq!(stats.total_requests, 1);
/// assert!(stats.is_healthy);
/// assert_eq!(monitor.circuit("http://users-1:8080").0, CircuitState::Closed);
/// ```
pub struct HealthMonitor {
    client: reqwest::Client,
    options: CircuitBreakerOptions,
    destinations: RwLock<AHashMap<String, Arc<DestinationHealth>>>,
}

impl HealthMonitor {
    /// Creates a monitor with its own pooled probe client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built, which indicates a system
    /// resource problem at startup.
    pub fn new(options: CircuitBreakerOptions) -> Self {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .expect("Failed to create health probe client");

        Self {
            client,
            options,
            destinations: RwLock::new(AHashMap::default()),
        }
    }

    fn entry(&self, destination: &str) -> Arc<DestinationHealth> {
        if let Some(entry) = self.destinations.read().unwrap().get(destination) {
            return entry.clone();
        }
        self.destinations
            .write()
            .unwrap()
            .entry(destination.to_string())
            .or_insert_with(|| Arc::new(DestinationHealth::new()))
            .clone()
    }

    /// Probes the destination and reports whether it is healthy.
    ///
    /// Returns `false` without probing while the circuit is open and the
    /// break has not elapsed. Cancellation is cooperative: dropping the
    /// returned future aborts the in-flight probe.
    pub async fn is_healthy(&self, destination: &str) -> bool {
        let entry = self.entry(destination);

        {
            let mut circuit = entry.circuit.lock().unwrap();
            if circuit.0 == CircuitState::Open {
                let break_duration =
                    ChronoDuration::seconds(self.options.break_duration_seconds as i64);
                if Utc::now().signed_duration_since(circuit.1) > break_duration {
                    *circuit = (CircuitState::HalfOpen, Utc::now());
                    info!("circuit for {destination} is half-open, probing");
                } else {
                    debug!("circuit for {destination} is open, skipping probe");
                    return false;
                }
            }
        }

        let url = probe_endpoint(destination);
        let deadline = Duration::from_secs(self.options.probe_timeout_seconds);

        match timeout(deadline, self.client.get(&url).send()).await {
            Ok(Ok(response)) if response.status().is_success() => {
                self.record_success(destination);
                true
            }
            Ok(Ok(response)) => {
                debug!("probe of {url} returned {}", response.status());
                self.record_failure(destination);
                false
            }
            Ok(Err(error)) => {
                warn!("probe of {url} failed: {error}");
                self.record_failure(destination);
                false
            }
            Err(_) => {
                warn!(
                    "probe of {url} timed out after {}s",
                    self.options.probe_timeout_seconds
                );
                self.record_failure(destination);
                false
            }
        }
    }

    /// Records a successful observation for the destination.
    ///
    /// Any success immediately re-marks the destination healthy, and a
    /// half-open circuit closes. An open circuit is left alone; it only
    /// moves through half-open once the break elapses.
    pub fn record_success(&self, destination: &str) {
        let entry = self.entry(destination);
        entry.successful.fetch_add(1, Ordering::Relaxed);
        entry.healthy.store(true, Ordering::Relaxed);
        *entry.last_check.lock().unwrap() = Utc::now();

        let mut circuit = entry.circuit.lock().unwrap();
        if circuit.0 == CircuitState::HalfOpen {
            *circuit = (CircuitState::Closed, Utc::now());
            info!("circuit for {destination} closed, destination recovered");
        }
    }

    /// Records a failed observation for the destination.
    ///
    /// The health flag becomes `success_rate >= failure_rate_threshold`.
    /// When the rate drops below the threshold and at least
    /// `minimum_throughput` observations exist, a closed or half-open
    /// circuit opens.
    pub fn record_failure(&self, destination: &str) {
        let entry = self.entry(destination);
        entry.failed.fetch_add(1, Ordering::Relaxed);

        let (total, rate) = entry.success_rate();
        entry
            .healthy
            .store(rate >= self.options.failure_rate_threshold, Ordering::Relaxed);
        *entry.last_check.lock().unwrap() = Utc::now();

        if rate < self.options.failure_rate_threshold && total >= self.options.minimum_throughput {
            let mut circuit = entry.circuit.lock().unwrap();
            if circuit.0 != CircuitState::Open {
                *circuit = (CircuitState::Open, Utc::now());
                warn!(
                    "circuit for {destination} opened (success rate {:.2} over {} observations)",
                    rate, total
                );
            }
        }
    }

    /// Read-only snapshot of the destination's health counters.
    pub fn get_stats(&self, destination: &str) -> HealthStats {
        let entry = self.entry(destination);
        let successful = entry.successful.load(Ordering::Relaxed);
        let failed = entry.failed.load(Ordering::Relaxed);
        let total = successful + failed;
        let stats = HealthStats {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64
            },
            last_health_check: *entry.last_check.lock().unwrap(),
            is_healthy: entry.healthy.load(Ordering::Relaxed),
        };
        stats
    }

    /// Whether the destination is currently flagged healthy, without
    /// probing or cloning a snapshot. Used by the load balancer's filter.
    pub fn is_marked_healthy(&self, destination: &str) -> bool {
        self.entry(destination).healthy.load(Ordering::Relaxed)
    }

    /// Consistent snapshot of the `(state, last_state_change)` pair.
    pub fn circuit(&self, destination: &str) -> (CircuitState, DateTime<Utc>) {
        *self.entry(destination).circuit.lock().unwrap()
    }

    /// Spawns the background probe loop.
    ///
    /// Every `probe_interval` the monitor probes each destination of every
    /// route whose policy enables circuit breaking. Probing is independent
    /// of request flow and feeds the same stats the proxy records into.
    pub fn start_probing(self: &Arc<Self>, table: Arc<RouteTable>, probe_interval: Duration) {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(probe_interval);
            loop {
                ticker.tick().await;
                let routes = table.get_all();
                for route in routes {
                    if !route.policy().enable_circuit_breaker {
                        continue;
                    }
                    for destination in route.destinations() {
                        let healthy = monitor.is_healthy(destination).await;
                        debug!(
                            "probe {destination}: {}",
                            if healthy { "healthy" } else { "unhealthy" }
                        );
                    }
                }
            }
        });
    }
}
