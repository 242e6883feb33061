//! Correlation-ID middleware.
//!
//! Adopts the inbound `X-Correlation-Id` header or generates a fresh id,
//! stores it in the request extensions for the proxy and the rate limiter,
//! and mirrors it on the response before headers are written.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error as ActixError, HttpMessage,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use log::debug;
use std::rc::Rc;

/// Header carrying the correlation id end-to-end across hops.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Correlation id attached to every request, stored in request extensions.
///
/// # Examples
///
/// ```
/// use portico_rs::middleware::correlation::CorrelationId;
///
/// let id = CorrelationId::generate();
/// assert!(!id.value().is_empty());
///
/// let adopted = CorrelationId::from("client-supplied-id");
/// assert_eq!(adopted.value(), "client-supplied-id");
/// ```
#[derive(Debug, Clone)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generates a fresh opaque identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Middleware factory propagating correlation ids.
///
/// Register this as the outermost middleware so every response, including
/// error responses produced further in, carries the id back to the client.
#[derive(Clone, Default)]
pub struct Correlation;

impl Correlation {
    pub fn new() -> Self {
        Self
    }
}

impl<S, B> Transform<S, ServiceRequest> for Correlation
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Transform = CorrelationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(CorrelationMiddleware {
            service: Rc::new(service),
        })
    }
}

pub struct CorrelationMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for CorrelationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(CORRELATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
            .map(CorrelationId::from)
            .unwrap_or_else(CorrelationId::generate);

        let id = correlation_id.value().to_string();
        req.extensions_mut().insert(correlation_id);

        // Span-level annotation for the observability collaborator.
        let user_id = req
            .extensions()
            .get::<crate::middleware::identity::AuthenticatedUser>()
            .and_then(|user| user.user_id.clone());
        debug!(
            "[{id}] {} {} user={}",
            req.method(),
            req.path(),
            user_id.as_deref().unwrap_or("-")
        );

        let service = self.service.clone();
        Box::pin(async move {
            let mut res = service.call(req).await?;
            if let Ok(value) = HeaderValue::from_str(&id) {
                res.headers_mut()
                    .insert(HeaderName::from_static(CORRELATION_HEADER), value);
            }
            Ok(res)
        })
    }
}
