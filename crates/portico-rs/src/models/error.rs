//! Gateway error type shared across the control plane and the proxy hot path.
//!
//! Errors are first-class values carrying a stable machine-readable `code`,
//! a human-readable `message`, a coarse `kind` used for HTTP status mapping,
//! and optional structured metadata that is surfaced as problem-details
//! extensions.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Stable error codes returned by the core components.
///
/// Codes are part of the external contract: the admin surface and clients
/// key on them, so they must not change between releases.
pub mod codes {
    pub const ROUTE_INVALID_ID: &str = "Route.InvalidId";
    pub const ROUTE_INVALID_PREFIX: &str = "Route.InvalidPrefix";
    pub const ROUTE_NO_DESTINATIONS: &str = "Route.NoDestinations";
    pub const ROUTE_INVALID_DESTINATION: &str = "Route.InvalidDestination";
    pub const ROUTE_INVALID_POLICY: &str = "Route.InvalidPolicy";
    pub const ROUTE_TABLE_NOT_FOUND: &str = "RouteTable.NotFound";
    pub const LOAD_BALANCER_NO_DESTINATIONS: &str = "LoadBalancer.NoDestinations";
    pub const GATEWAY_UPSTREAM: &str = "Gateway.Upstream";
    pub const GATEWAY_UPSTREAM_TIMEOUT: &str = "Gateway.UpstreamTimeout";
    pub const CONFIG_LOAD: &str = "Config.Load";
    pub const CONFIG_INVALID: &str = "Config.Invalid";
    pub const CONFIG_DUPLICATE_ROUTE: &str = "Config.DuplicateRoute";
}

/// Classification of a gateway error.
///
/// The kind drives the HTTP status returned at the boundary and tells
/// callers whether the error is recoverable (`Validation`, `NotFound`,
/// `Conflict`) or a runtime failure (`Failure`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input failed validation; never reaches the hot path.
    Validation,
    /// A referenced entity does not exist.
    NotFound,
    /// The operation conflicts with existing state.
    Conflict,
    /// A runtime failure (upstream transport, timeout).
    Failure,
    /// The caller is not authenticated.
    Unauthorized,
    /// The caller is authenticated but not allowed.
    Forbidden,
}

/// Error value used throughout the gateway core.
///
/// # Examples
///
/// ```
/// use portico_rs::models::error::{codes, ErrorKind, GatewayError};
///
/// let err = GatewayError::not_found(codes::ROUTE_TABLE_NOT_FOUND, "no route with id 'users'");
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// assert_eq!(err.code(), "RouteTable.NotFound");
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct GatewayError {
    code: String,
    message: String,
    kind: ErrorKind,
    metadata: Option<BTreeMap<String, Value>>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            kind,
            metadata: None,
        }
    }

    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, code, message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, code, message)
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, code, message)
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Failure, code, message)
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, code, message)
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, code, message)
    }

    /// Attaches a metadata entry surfaced as a problem-details extension.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Upstream transport failure while proxying.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::failure(codes::GATEWAY_UPSTREAM, message)
    }

    /// Route timeout elapsed while waiting for the upstream response.
    pub fn upstream_timeout(timeout_seconds: u64) -> Self {
        Self::failure(
            codes::GATEWAY_UPSTREAM_TIMEOUT,
            format!("upstream did not respond within {timeout_seconds} seconds"),
        )
        .with_metadata("timeout", timeout_seconds)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn metadata(&self) -> Option<&BTreeMap<String, Value>> {
        self.metadata.as_ref()
    }
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Failure => {
                if self.code == codes::GATEWAY_UPSTREAM_TIMEOUT {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
        }
    }

    /// Renders the error as an RFC 7807 problem-details document.
    ///
    /// Metadata entries become top-level extensions, so a timeout error
    /// carries `timeout` next to the standard `type`/`title`/`status`/
    /// `detail` members. A `timestamp` extension is always present.
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = Map::new();
        body.insert(
            "type".to_string(),
            json!(format!("https://httpstatuses.com/{}", status.as_u16())),
        );
        body.insert(
            "title".to_string(),
            json!(status.canonical_reason().unwrap_or("Error")),
        );
        body.insert("status".to_string(), json!(status.as_u16()));
        body.insert("detail".to_string(), json!(self.message));
        body.insert("code".to_string(), json!(self.code));
        if let Some(metadata) = &self.metadata {
            for (key, value) in metadata {
                body.insert(key.clone(), value.clone());
            }
        }
        body.insert(
            "timestamp".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );

        HttpResponse::build(status)
            .content_type("application/problem+json")
            .json(Value::Object(body))
    }
}
