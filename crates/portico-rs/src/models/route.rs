use crate::models::error::{codes, GatewayError};
use serde::{Deserialize, Serialize};

/// Load balancing strategy for distributing requests across the
/// destinations of a route.
///
/// # Strategies
///
/// - **RoundRobin**: rotates through destinations in order (default)
/// - **LeastConnections**: picks the destination with the fewest active requests
/// - **Random**: uniform random selection
/// - **WeightedRoundRobin**: declared for configuration compatibility;
///   currently falls back to RoundRobin
/// - **PowerOfTwoChoices**: samples two destinations, keeps the less loaded one
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingStrategy {
    RoundRobin,
    LeastConnections,
    Random,
    WeightedRoundRobin,
    PowerOfTwoChoices,
}

impl Default for LoadBalancingStrategy {
    fn default() -> Self {
        Self::RoundRobin
    }
}

impl LoadBalancingStrategy {
    /// Stable string form used by the admin views.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::LeastConnections => "least_connections",
            Self::Random => "random",
            Self::WeightedRoundRobin => "weighted_round_robin",
            Self::PowerOfTwoChoices => "power_of_two_choices",
        }
    }
}

/// Per-route tuning knobs.
///
/// A policy is owned by exactly one [`Route`] after construction; it is
/// never shared between routes. Ranges are enforced by [`Route::new`], the
/// single validation chokepoint.
///
/// # Examples
///
/// ```json
/// {
///   "load_balancing": "least_connections",
///   "enable_rate_limiting": true,
///   "rate_limit_permits": 50,
///   "rate_limit_window_seconds": 60,
///   "enable_circuit_breaker": true,
///   "timeout_seconds": 10
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Policy {
    /// Strategy used to pick a destination for each request.
    #[serde(default)]
    pub load_balancing: LoadBalancingStrategy,

    /// Whether route-scoped rate limiting applies.
    #[serde(default)]
    pub enable_rate_limiting: bool,

    /// Requests allowed per window when rate limiting is enabled. Must be > 0.
    #[serde(default = "default_rate_limit_permits")]
    pub rate_limit_permits: u32,

    /// Window length in seconds for the rate limiter. Must be > 0.
    #[serde(default = "default_rate_limit_window_seconds")]
    pub rate_limit_window_seconds: u32,

    /// Whether destination circuit breaking applies to this route.
    #[serde(default = "default_true")]
    pub enable_circuit_breaker: bool,

    /// Whether a caching collaborator may cache responses for this route.
    /// The core itself never caches.
    #[serde(default)]
    pub enable_caching: bool,

    /// Cache entry lifetime in seconds, consumed by the caching collaborator.
    #[serde(default = "default_cache_duration_seconds")]
    pub cache_duration_seconds: u32,

    /// Upstream response deadline in seconds, within [1, 300].
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Extra attempts after a failed forward. Only idempotent methods are
    /// ever retried.
    #[serde(default)]
    pub max_retries: u32,
}

fn default_rate_limit_permits() -> u32 {
    100
}

fn default_rate_limit_window_seconds() -> u32 {
    60
}

fn default_cache_duration_seconds() -> u32 {
    60
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            load_balancing: LoadBalancingStrategy::default(),
            enable_rate_limiting: false,
            rate_limit_permits: default_rate_limit_permits(),
            rate_limit_window_seconds: default_rate_limit_window_seconds(),
            enable_circuit_breaker: true,
            enable_caching: false,
            cache_duration_seconds: default_cache_duration_seconds(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: 0,
        }
    }
}

impl Policy {
    fn validate(&self) -> Result<(), GatewayError> {
        if self.rate_limit_permits == 0 {
            return Err(GatewayError::validation(
                codes::ROUTE_INVALID_POLICY,
                "rate_limit_permits must be greater than 0",
            ));
        }
        if self.rate_limit_window_seconds == 0 {
            return Err(GatewayError::validation(
                codes::ROUTE_INVALID_POLICY,
                "rate_limit_window_seconds must be greater than 0",
            ));
        }
        if !(1..=300).contains(&self.timeout_seconds) {
            return Err(GatewayError::validation(
                codes::ROUTE_INVALID_POLICY,
                format!(
                    "timeout_seconds must be between 1 and 300, got {}",
                    self.timeout_seconds
                ),
            ));
        }
        Ok(())
    }
}

/// Wire/configuration shape of a route, before validation.
///
/// Definitions come from the configuration file or the admin API and are
/// turned into [`Route`] values through [`Route::new`]. Nothing else in the
/// gateway accepts a definition directly.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RouteDefinition {
    /// Stable identifier, unique within the route table.
    pub route_id: String,

    /// Inbound path prefix this route matches. Must start with `/`.
    pub route_prefix: String,

    /// Ordered list of absolute upstream URLs.
    pub destinations: Vec<String>,

    /// Tuning knobs; defaults apply when omitted.
    #[serde(default)]
    pub policy: Policy,

    /// Match precedence among overlapping prefixes; smaller wins.
    #[serde(default)]
    pub priority: u32,

    /// Whether the authentication collaborator must have established a
    /// principal before this route is served. The core only flags this.
    #[serde(default)]
    pub requires_authentication: bool,

    /// Roles allowed to use the route. Order is irrelevant; enforcement is
    /// the caller's job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_roles: Option<Vec<String>>,
}

/// A validated, immutable route.
///
/// Routes are constructed exclusively through [`Route::new`], which is the
/// sole validation chokepoint: lookup, selection, and forwarding all assume
/// a `Route` is valid and never revalidate. Two routes are equal when their
/// `(route_id, route_prefix)` pairs are equal; policy differences do not
/// affect identity.
///
/// # Examples
///
/// ```
/// use portico_rs::models::route::{Route, RouteDefinition, Policy};
///
/// let route = Route::new(RouteDefinition {
///     route_id: "users".to_string(),
///     route_prefix: "/api/users".to_string(),
///     destinations: vec!["http://users-1:8080".to_string()],
///     policy: Policy::default(),
///     priority: 10,
///     requires_authentication: true,
///     allowed_roles: None,
/// }).expect("valid route");
///
/// assert!(route.matches("/api/users/42"));
/// assert!(!route.matches("/api/orders"));
/// ```
#[derive(Debug, Clone)]
pub struct Route {
    route_id: String,
    route_prefix: String,
    destinations: Vec<String>,
    policy: Policy,
    priority: u32,
    requires_authentication: bool,
    allowed_roles: Option<Vec<String>>,
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.route_id == other.route_id && self.route_prefix == other.route_prefix
    }
}

impl Eq for Route {}

impl Route {
    /// Validates a definition and freezes it into a `Route`.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error with a stable code when:
    /// - `route_id` or `route_prefix` is empty or whitespace
    ///   (`Route.InvalidId`, `Route.InvalidPrefix`)
    /// - `route_prefix` does not start with `/` (`Route.InvalidPrefix`)
    /// - the destination list is empty (`Route.NoDestinations`)
    /// - a destination is not an absolute http(s) URL
    ///   (`Route.InvalidDestination`)
    /// - a policy knob is out of range (`Route.InvalidPolicy`)
    pub fn new(definition: RouteDefinition) -> Result<Self, GatewayError> {
        let RouteDefinition {
            route_id,
            route_prefix,
            destinations,
            policy,
            priority,
            requires_authentication,
            allowed_roles,
        } = definition;

        if route_id.trim().is_empty() {
            return Err(GatewayError::validation(
                codes::ROUTE_INVALID_ID,
                "route_id must not be empty",
            ));
        }

        if route_prefix.trim().is_empty() {
            return Err(GatewayError::validation(
                codes::ROUTE_INVALID_PREFIX,
                "route_prefix must not be empty",
            ));
        }

        if !route_prefix.starts_with('/') {
            return Err(GatewayError::validation(
                codes::ROUTE_INVALID_PREFIX,
                format!("route_prefix must start with '/', got {route_prefix:?}"),
            ));
        }

        if destinations.is_empty() {
            return Err(GatewayError::validation(
                codes::ROUTE_NO_DESTINATIONS,
                format!("route {route_id:?} has no destinations"),
            ));
        }

        for destination in &destinations {
            let url = reqwest::Url::parse(destination).map_err(|e| {
                GatewayError::validation(
                    codes::ROUTE_INVALID_DESTINATION,
                    format!("destination {destination:?} is not an absolute URL: {e}"),
                )
                .with_metadata("destination", destination.as_str())
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(GatewayError::validation(
                    codes::ROUTE_INVALID_DESTINATION,
                    format!("destination {destination:?} must use http or https"),
                )
                .with_metadata("destination", destination.as_str()));
            }
        }

        policy.validate()?;

        Ok(Self {
            route_id,
            route_prefix,
            destinations,
            policy,
            priority,
            requires_authentication,
            allowed_roles,
        })
    }

    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    pub fn route_prefix(&self) -> &str {
        &self.route_prefix
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn requires_authentication(&self) -> bool {
        self.requires_authentication
    }

    pub fn allowed_roles(&self) -> Option<&[String]> {
        self.allowed_roles.as_deref()
    }

    /// Whether this route's prefix matches the given request path.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.route_prefix)
    }

    /// Field-for-field admin view of the route.
    pub fn to_view(&self) -> RouteView {
        RouteView {
            route_id: self.route_id.clone(),
            route_prefix: self.route_prefix.clone(),
            destinations: self.destinations.clone(),
            priority: self.priority,
            requires_authentication: self.requires_authentication,
            allowed_roles: self.allowed_roles.clone(),
            policy: PolicyView {
                load_balancing: self.policy.load_balancing.as_str().to_string(),
                enable_rate_limiting: self.policy.enable_rate_limiting,
                rate_limit_permits: self.policy.rate_limit_permits,
                enable_circuit_breaker: self.policy.enable_circuit_breaker,
                enable_caching: self.policy.enable_caching,
                timeout_seconds: self.policy.timeout_seconds,
            },
        }
    }
}

/// Shape exposed to the admin surface for a single route.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RouteView {
    pub route_id: String,
    pub route_prefix: String,
    pub destinations: Vec<String>,
    pub priority: u32,
    pub requires_authentication: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_roles: Option<Vec<String>>,
    pub policy: PolicyView,
}

/// Policy subset exposed to the admin surface.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PolicyView {
    pub load_balancing: String,
    pub enable_rate_limiting: bool,
    pub rate_limit_permits: u32,
    pub enable_circuit_breaker: bool,
    pub enable_caching: bool,
    pub timeout_seconds: u64,
}
