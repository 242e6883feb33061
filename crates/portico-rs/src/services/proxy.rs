use crate::middleware::correlation::{CorrelationId, CORRELATION_HEADER};
use crate::middleware::identity::AuthenticatedUser;
use crate::models::error::{codes, GatewayError};
use crate::models::settings::GatewayOptions;
use crate::services::health::HealthMonitor;
use crate::services::load_balancer::LoadBalancer;
use crate::services::route_table::RouteTable;
use crate::utils::url::join_upstream;

use actix_web::{
    http::{Method as ActixMethod, StatusCode},
    web, Error as ActixError, HttpMessage, HttpRequest, HttpResponse,
};
use log::{debug, warn};
use reqwest::{
    header::HeaderMap as ReqwestHeaderMap, header::HeaderName, header::HeaderValue, Client,
    Method as ReqwestMethod,
};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

/// Base backoff between retry attempts.
const RETRY_BACKOFF_MS: u64 = 100;
/// Ceiling for the exponential retry backoff.
const RETRY_BACKOFF_CAP_MS: u64 = 5_000;

/// Proxy hot path of the gateway.
///
/// For each inbound request the handler matches a route by prefix, applies
/// the identity and correlation transforms, asks the load balancer for a
/// destination, forwards the request under the route's deadline, and
/// records completion against both the balancer's connection gauge and the
/// health monitor. All of that happens per attempt, so retries account for
/// every selection they make.
///
/// # Architecture
///
/// ```text
/// Client -> Correlation -> Rate Limit -> ProxyHandler -> Load Balancer -> Upstream
///                                             |                |
///                                        Route Table     Health Monitor
/// ```
///
/// # Thread Safety
///
/// The handler is `Clone`; clones share the HTTP client, the route table,
/// the balancer, and the monitor.
#[derive(Clone)]
pub struct ProxyHandler {
    /// HTTP client with connection pooling for upstream calls.
    client: Client,
    table: Arc<RouteTable>,
    balancer: Arc<LoadBalancer>,
    monitor: Arc<HealthMonitor>,
    options: Arc<GatewayOptions>,
}

impl ProxyHandler {
    /// Creates a proxy handler sharing the given core components.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built, which indicates a system
    /// resource problem at startup.
    pub fn new(
        table: Arc<RouteTable>,
        balancer: Arc<LoadBalancer>,
        monitor: Arc<HealthMonitor>,
        options: GatewayOptions,
    ) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            table,
            balancer,
            monitor,
            options: Arc::new(options),
        }
    }

    /// Forwards an inbound request to the selected upstream destination.
    ///
    /// # Request Processing Flow
    ///
    /// 1. Route match by prefix; lowest priority wins (404 otherwise)
    /// 2. Header conversion with hop-by-hop headers stripped
    /// 3. Correlation id attached to the upstream request
    /// 4. Identity claims forwarded when a principal is present
    /// 5. Destination selection through the load balancer
    /// 6. Forward under the route timeout, retrying idempotent methods up
    ///    to the policy's `max_retries` with exponential backoff
    /// 7. Completion accounting per attempt: connection gauge decrement
    ///    plus a success or failure observation for the destination
    ///
    /// A timeout surfaces as 504 problem+json. When the client disconnects
    /// first, actix drops this future and no response is produced.
    pub async fn handle_request(
        &self,
        req: HttpRequest,
        body: web::Bytes,
    ) -> Result<HttpResponse, ActixError> {
        let path = req.path().to_string();
        let route = self.table.match_route(&path).ok_or_else(|| {
            GatewayError::not_found(
                codes::ROUTE_TABLE_NOT_FOUND,
                format!("no route matches {path:?}"),
            )
        })?;

        let method = Self::parse_method(req.method());
        let mut headers = Self::build_upstream_headers(req.headers());

        // The correlation middleware has already adopted or generated the
        // id; attach it to the upstream request unconditionally.
        let correlation_id = req
            .extensions()
            .get::<CorrelationId>()
            .map(|id| id.value().to_string())
            .unwrap_or_else(|| CorrelationId::generate().value().to_string());
        if let Ok(value) = HeaderValue::from_str(&correlation_id) {
            headers.insert(HeaderName::from_static(CORRELATION_HEADER), value);
        }

        if self.options.enable_authentication_forwarding {
            if let Some(user) = req.extensions().get::<AuthenticatedUser>() {
                user.apply_headers(&mut headers);
            }
        }

        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| path.clone());

        let policy = route.policy();
        let timeout_seconds = policy.timeout_seconds;
        let attempts = if Self::is_idempotent(&method) {
            policy.max_retries as usize + 1
        } else {
            1
        };

        for attempt in 0..attempts {
            let destination = if self.options.enable_load_balancing {
                self.balancer.select(&route)?
            } else {
                self.balancer.select_primary(&route)?
            };
            let target_url = join_upstream(&destination, &path_and_query);

            if attempt > 0 {
                warn!("[{correlation_id}] retry attempt {attempt} for {target_url}");
            } else {
                debug!("[{correlation_id}] forwarding {method} {path} to {target_url}");
            }

            let forwarded = self
                .client
                .request(method.clone(), &target_url)
                .headers(headers.clone())
                .body(body.to_vec());

            let outcome = timeout(Duration::from_secs(timeout_seconds), forwarded.send()).await;

            // Completion accounting happens here, exactly once per select,
            // before any retry decision.
            self.balancer.record_completion(&destination);

            match outcome {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_server_error() {
                        self.monitor.record_failure(&destination);
                    } else {
                        self.monitor.record_success(&destination);
                    }

                    if Self::is_retryable_status(status) && attempt + 1 < attempts {
                        warn!(
                            "[{correlation_id}] upstream {target_url} returned {status}, retrying"
                        );
                        sleep(Self::backoff(attempt)).await;
                        continue;
                    }

                    return Ok(Self::build_response(response));
                }
                Ok(Err(error)) => {
                    self.monitor.record_failure(&destination);
                    if attempt + 1 < attempts {
                        warn!(
                            "[{correlation_id}] request to {target_url} failed ({error}), retrying"
                        );
                        sleep(Self::backoff(attempt)).await;
                        continue;
                    }
                    return Err(GatewayError::upstream(format!(
                        "request to {target_url} failed: {error}"
                    ))
                    .into());
                }
                Err(_elapsed) => {
                    self.monitor.record_failure(&destination);
                    if attempt + 1 < attempts {
                        warn!("[{correlation_id}] request to {target_url} timed out, retrying");
                        sleep(Self::backoff(attempt)).await;
                        continue;
                    }
                    return Err(GatewayError::upstream_timeout(timeout_seconds).into());
                }
            }
        }

        Err(GatewayError::upstream(format!("all {attempts} attempts to {path:?} exhausted")).into())
    }

    /// Converts the upstream response, streaming the body through.
    fn build_response(response: reqwest::Response) -> HttpResponse {
        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let mut builder = HttpResponse::build(status);

        // Hop-by-hop and framing headers are regenerated for the streamed
        // body rather than forwarded.
        for (key, value) in response.headers() {
            let name = key.as_str();
            if name.starts_with("connection")
                || name == "transfer-encoding"
                || name == "content-length"
            {
                continue;
            }
            if let Ok(header_value) =
                actix_web::http::header::HeaderValue::from_bytes(value.as_bytes())
            {
                builder.insert_header((name, header_value));
            }
        }

        builder.streaming(response.bytes_stream())
    }

    /// Converts and filters inbound headers for upstream forwarding.
    fn build_upstream_headers(
        original_headers: &actix_web::http::header::HeaderMap,
    ) -> ReqwestHeaderMap {
        let mut upstream_headers = ReqwestHeaderMap::with_capacity(original_headers.len());

        const SKIP_HEADERS: &[&str] = &["host", "connection", "upgrade", "proxy-connection"];

        for (key, value) in original_headers {
            let key_str = key.as_str().to_lowercase();
            if SKIP_HEADERS.iter().any(|&skip| key_str.starts_with(skip)) {
                continue;
            }

            if let (Ok(header_name), Ok(header_value)) = (
                HeaderName::from_bytes(key.as_ref()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                upstream_headers.insert(header_name, header_value);
            }
        }

        upstream_headers
            .entry("user-agent")
            .or_insert_with(|| {
                HeaderValue::from_static(concat!("portico-rs/", env!("CARGO_PKG_VERSION")))
            });

        upstream_headers
    }

    fn parse_method(method: &ActixMethod) -> ReqwestMethod {
        match *method {
            ActixMethod::GET => ReqwestMethod::GET,
            ActixMethod::POST => ReqwestMethod::POST,
            ActixMethod::PUT => ReqwestMethod::PUT,
            ActixMethod::DELETE => ReqwestMethod::DELETE,
            ActixMethod::HEAD => ReqwestMethod::HEAD,
            ActixMethod::OPTIONS => ReqwestMethod::OPTIONS,
            ActixMethod::CONNECT => ReqwestMethod::CONNECT,
            ActixMethod::PATCH => ReqwestMethod::PATCH,
            ActixMethod::TRACE => ReqwestMethod::TRACE,
            _ => ReqwestMethod::GET,
        }
    }

    /// Only idempotent methods are ever retried.
    fn is_idempotent(method: &ReqwestMethod) -> bool {
        matches!(
            *method,
            ReqwestMethod::GET
                | ReqwestMethod::HEAD
                | ReqwestMethod::OPTIONS
                | ReqwestMethod::PUT
                | ReqwestMethod::DELETE
                | ReqwestMethod::TRACE
        )
    }

    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        matches!(status.as_u16(), 502 | 503 | 504)
    }

    fn backoff(attempt: usize) -> Duration {
        let millis = RETRY_BACKOFF_MS
            .saturating_mul(1u64 << attempt.min(16))
            .min(RETRY_BACKOFF_CAP_MS);
        Duration::from_millis(millis)
    }
}
