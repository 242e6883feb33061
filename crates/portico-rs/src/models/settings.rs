use crate::models::error::{codes, GatewayError};
use crate::models::route::{Route, RouteDefinition};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Options for the global fixed-window rate limiter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RateLimitOptions {
    /// Requests allowed per window per partition.
    #[serde(default = "default_rate_limit_permits")]
    pub permits: u64,

    /// Window length in seconds.
    #[serde(default = "default_rate_limit_window_seconds")]
    pub window_seconds: u64,

    /// Requests allowed to wait for the next window, oldest first.
    #[serde(default = "default_rate_limit_queue_limit")]
    pub queue_limit: usize,
}

fn default_rate_limit_permits() -> u64 {
    100
}

fn default_rate_limit_window_seconds() -> u64 {
    60
}

fn default_rate_limit_queue_limit() -> usize {
    10
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            permits: default_rate_limit_permits(),
            window_seconds: default_rate_limit_window_seconds(),
            queue_limit: default_rate_limit_queue_limit(),
        }
    }
}

/// Options for the per-destination circuit breaker and health probes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CircuitBreakerOptions {
    /// How long an open circuit stays open before a half-open probe is
    /// allowed, in seconds.
    #[serde(default = "default_break_duration_seconds")]
    pub break_duration_seconds: u64,

    /// Observations required before the breaker may open. Prevents a single
    /// transient failure at startup from shedding all traffic.
    #[serde(default = "default_minimum_throughput")]
    pub minimum_throughput: u64,

    /// Success rate below which a failing destination trips the breaker.
    #[serde(default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: f64,

    /// Deadline for a single health probe, in seconds.
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,
}

fn default_break_duration_seconds() -> u64 {
    30
}

fn default_minimum_throughput() -> u64 {
    10
}

fn default_failure_rate_threshold() -> f64 {
    0.5
}

fn default_probe_timeout_seconds() -> u64 {
    5
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        Self {
            break_duration_seconds: default_break_duration_seconds(),
            minimum_throughput: default_minimum_throughput(),
            failure_rate_threshold: default_failure_rate_threshold(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
        }
    }
}

/// Options consumed by the caching collaborator. The core parses and
/// exposes them but implements no cache layer itself.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheOptions {
    #[serde(default = "default_cache_duration_seconds")]
    pub duration_seconds: u64,
}

fn default_cache_duration_seconds() -> u64 {
    60
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            duration_seconds: default_cache_duration_seconds(),
        }
    }
}

/// Gateway-wide options block.
///
/// These knobs are read-only from the core's perspective; updated values
/// are observed through the route table's `reload()` operation.
///
/// # Examples
///
/// ```json
/// {
///   "enable_rate_limiting": true,
///   "enable_circuit_breaker": true,
///   "default_timeout_seconds": 30,
///   "max_concurrent_requests": 100,
///   "rate_limit": { "permits": 100, "window_seconds": 60, "queue_limit": 10 },
///   "circuit_breaker": { "break_duration_seconds": 30 }
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GatewayOptions {
    #[serde(default = "default_true")]
    pub enable_rate_limiting: bool,

    #[serde(default = "default_true")]
    pub enable_circuit_breaker: bool,

    #[serde(default)]
    pub enable_caching: bool,

    #[serde(default = "default_true")]
    pub enable_load_balancing: bool,

    #[serde(default = "default_true")]
    pub enable_authentication_forwarding: bool,

    /// Upstream deadline used when a route policy does not set one.
    /// Valid range: 1 to 300.
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,

    /// Upper bound on simultaneously served requests, applied by the
    /// server wiring. Valid range: 1 to 10000.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    #[serde(default)]
    pub rate_limit: RateLimitOptions,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerOptions,

    #[serde(default)]
    pub cache: CacheOptions,
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_concurrent_requests() -> usize {
    100
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            enable_rate_limiting: true,
            enable_circuit_breaker: true,
            enable_caching: false,
            enable_load_balancing: true,
            enable_authentication_forwarding: true,
            default_timeout_seconds: default_timeout_seconds(),
            max_concurrent_requests: default_max_concurrent_requests(),
            rate_limit: RateLimitOptions::default(),
            circuit_breaker: CircuitBreakerOptions::default(),
            cache: CacheOptions::default(),
        }
    }
}

impl GatewayOptions {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if !(1..=300).contains(&self.default_timeout_seconds) {
            return Err(GatewayError::validation(
                codes::CONFIG_INVALID,
                format!(
                    "default_timeout_seconds must be between 1 and 300, got {}",
                    self.default_timeout_seconds
                ),
            ));
        }
        if !(1..=10_000).contains(&self.max_concurrent_requests) {
            return Err(GatewayError::validation(
                codes::CONFIG_INVALID,
                format!(
                    "max_concurrent_requests must be between 1 and 10000, got {}",
                    self.max_concurrent_requests
                ),
            ));
        }
        if self.rate_limit.permits == 0 || self.rate_limit.window_seconds == 0 {
            return Err(GatewayError::validation(
                codes::CONFIG_INVALID,
                "rate_limit permits and window_seconds must be greater than 0",
            ));
        }
        if self.rate_limit.queue_limit as u64 > self.rate_limit.permits {
            return Err(GatewayError::validation(
                codes::CONFIG_INVALID,
                "rate_limit queue_limit must not exceed permits",
            ));
        }
        if !(0.0..=1.0).contains(&self.circuit_breaker.failure_rate_threshold) {
            return Err(GatewayError::validation(
                codes::CONFIG_INVALID,
                "circuit_breaker failure_rate_threshold must be within [0, 1]",
            ));
        }
        if self.circuit_breaker.probe_timeout_seconds == 0 {
            return Err(GatewayError::validation(
                codes::CONFIG_INVALID,
                "circuit_breaker probe_timeout_seconds must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Complete gateway configuration as loaded from disk.
///
/// # Configuration File Format
///
/// ```json
/// {
///   "version": 1,
///   "gateway": {
///     "default_timeout_seconds": 30,
///     "rate_limit": { "permits": 100, "window_seconds": 60 }
///   },
///   "routes": [
///     {
///       "route_id": "users",
///       "route_prefix": "/api/users",
///       "destinations": ["http://users-1:8080", "http://users-2:8080"],
///       "priority": 10,
///       "requires_authentication": true,
///       "policy": { "load_balancing": "least_connections" }
///     }
///   ]
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    /// Configuration schema version for compatibility checking.
    pub version: u8,

    /// Gateway-wide options block.
    #[serde(default)]
    pub gateway: GatewayOptions,

    /// Route definitions, validated through the `Route` factory.
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,
}

impl Settings {
    /// Validates the options block and proves that every route definition
    /// constructs. Returns the first error encountered.
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.gateway.validate()?;
        self.build_routes().map(|_| ())
    }

    /// Builds validated routes from the definitions, rejecting duplicate
    /// route ids.
    pub fn build_routes(&self) -> Result<Vec<Route>, GatewayError> {
        let mut seen = HashSet::new();
        let mut routes = Vec::with_capacity(self.routes.len());
        for definition in &self.routes {
            if !seen.insert(definition.route_id.clone()) {
                return Err(GatewayError::validation(
                    codes::CONFIG_DUPLICATE_ROUTE,
                    format!("duplicate route_id {:?}", definition.route_id),
                ));
            }
            routes.push(Route::new(definition.clone())?);
        }
        Ok(routes)
    }
}
