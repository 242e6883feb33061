//! Global fixed-window rate limiting partitioned by correlation id.
//!
//! Each partition gets `permits` requests per window. When a window is
//! exhausted, up to `queue_limit` requests may wait for the next window
//! and are admitted oldest-first when it rolls; everything beyond the
//! queue is rejected with 429 and a suggested retry-after.

use crate::middleware::correlation::CorrelationId;
use crate::models::settings::RateLimitOptions;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error as ActixError, HttpMessage, HttpResponse,
};
use ahash::HashMap as AHashMap;
use futures::future::{ok, LocalBoxFuture, Ready};
use log::{debug, warn};
use std::rc::Rc;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Decision for one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request fits in the current window.
    Allowed,
    /// The window is exhausted; the request may wait `delay` for the next
    /// window and is then guaranteed admission.
    Queued { delay: Duration },
    /// Window and queue are both full.
    Rejected { retry_after_seconds: u64 },
}

/// Per-partition window state.
#[derive(Debug)]
struct Partition {
    window_start: Instant,
    count: u64,
    queued: usize,
    last_seen: Instant,
}

impl Partition {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
            queued: 0,
            last_seen: now,
        }
    }
}

/// Fixed-window limiter with a bounded wait queue per partition.
///
/// # Thread Safety
///
/// Partition entries live in an `RwLock` map and each partition has its
/// own mutex, so admissions for different partitions never contend.
///
/// # Examples
///
/// ```
/// use portico_rs::middleware::rate_limit::{Admission, FixedWindowLimiter};
/// use portico_rs::models::settings::RateLimitOptions;
///
/// let limiter = FixedWindowLimiter::new(RateLimitOptions {
///     permits: 2,
///     window_seconds: 60,
///     queue_limit: 1,
/// });
///
/// assert_eq!(limiter.check("client-a"), Admission::Allowed);
/// assert_eq!(limiter.check("client-a"), Admission::Allowed);
/// assert!(matches!(limiter.check("client-a"), Admission::Queued { .. }));
/// assert!(matches!(limiter.check("client-a"), Admission::Rejected { .. }));
/// // Other partitions are unaffected.
/// assert_eq!(limiter.check("client-b"), Admission::Allowed);
/// ```
pub struct FixedWindowLimiter {
    options: RateLimitOptions,
    partitions: RwLock<AHashMap<String, Arc<Mutex<Partition>>>>,
    last_sweep: Mutex<Instant>,
}

impl FixedWindowLimiter {
    pub fn new(options: RateLimitOptions) -> Self {
        Self {
            options,
            partitions: RwLock::new(AHashMap::default()),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.options.window_seconds)
    }

    fn partition(&self, key: &str) -> Arc<Mutex<Partition>> {
        if let Some(partition) = self.partitions.read().unwrap().get(key) {
            return partition.clone();
        }
        self.partitions
            .write()
            .unwrap()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Partition::new(Instant::now()))))
            .clone()
    }

    /// Attempts to admit one request for the partition.
    pub fn check(&self, key: &str) -> Admission {
        self.sweep();

        let partition = self.partition(key);
        let mut partition = partition.lock().unwrap();
        let now = Instant::now();
        partition.last_seen = now;

        let window = self.window();
        let elapsed = now.duration_since(partition.window_start);
        if elapsed >= window {
            partition.window_start = now;
            partition.count = 0;
        }

        if partition.count < self.options.permits {
            partition.count += 1;
            return Admission::Allowed;
        }

        let remaining = window.saturating_sub(now.duration_since(partition.window_start));
        if partition.queued < self.options.queue_limit {
            partition.queued += 1;
            return Admission::Queued { delay: remaining };
        }

        Admission::Rejected {
            retry_after_seconds: (remaining.as_secs_f64().ceil() as u64).max(1),
        }
    }

    /// Admits a previously queued request after its wait elapsed.
    ///
    /// The first waiter to redeem rolls the window; because the queue is
    /// capped at or below the window's permits, every queued request is
    /// guaranteed its slot.
    pub fn redeem(&self, key: &str) {
        let partition = self.partition(key);
        let mut partition = partition.lock().unwrap();
        let now = Instant::now();
        partition.last_seen = now;

        if now.duration_since(partition.window_start) >= self.window() {
            partition.window_start = now;
            partition.count = 0;
        }
        partition.queued = partition.queued.saturating_sub(1);
        partition.count += 1;
    }

    /// Drops partitions idle for more than two windows. Runs at most once
    /// per window to keep the hot path cheap.
    fn sweep(&self) {
        let now = Instant::now();
        {
            let mut last_sweep = self.last_sweep.lock().unwrap();
            if now.duration_since(*last_sweep) < self.window() {
                return;
            }
            *last_sweep = now;
        }

        let stale_after = self.window() * 2;
        let mut partitions = self.partitions.write().unwrap();
        let before = partitions.len();
        partitions.retain(|_, partition| {
            let partition = partition.lock().unwrap();
            partition.queued > 0 || now.duration_since(partition.last_seen) < stale_after
        });
        if partitions.len() < before {
            debug!(
                "rate limiter swept {} stale partitions, {} retained",
                before - partitions.len(),
                partitions.len()
            );
        }
    }
}

/// Rate limiting middleware factory.
///
/// Partitions requests by the correlation id established by the
/// correlation middleware, which therefore must be registered outside this
/// one.
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<FixedWindowLimiter>,
}

impl RateLimit {
    pub fn new(options: RateLimitOptions) -> Self {
        Self {
            limiter: Arc::new(FixedWindowLimiter::new(options)),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Transform = RateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddleware {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        })
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: Arc<FixedWindowLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();

        Box::pin(async move {
            let key = req
                .extensions()
                .get::<CorrelationId>()
                .map(|id| id.value().to_string())
                .unwrap_or_else(|| "anonymous".to_string());

            match limiter.check(&key) {
                Admission::Allowed => {}
                Admission::Queued { delay } => {
                    debug!("partition {key} queued for {}ms", delay.as_millis());
                    tokio::time::sleep(delay).await;
                    limiter.redeem(&key);
                }
                Admission::Rejected {
                    retry_after_seconds,
                } => {
                    // Rejection metrics belong to the observability
                    // collaborator; the core only logs.
                    warn!("rate limit exceeded for partition {key}");
                    let response = HttpResponse::TooManyRequests()
                        .insert_header(("retry-after", retry_after_seconds.to_string()))
                        .json(serde_json::json!({
                            "error": "Too Many Requests",
                            "message": "Request rate exceeded the configured limit. Please retry later.",
                            "retryAfter": retry_after_seconds,
                        }));
                    let (req, _) = req.into_parts();
                    return Ok(ServiceResponse::new(req, response).map_into_right_body());
                }
            }

            service
                .call(req)
                .await
                .map(|res| res.map_into_left_body())
        })
    }
}
