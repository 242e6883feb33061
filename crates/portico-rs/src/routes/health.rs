use actix_web::{web, HttpResponse, Result};
use serde_json::json;

/// General health check for the gateway process itself.
///
/// # Response Format
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.3.0",
///   "timestamp": "2026-03-15T10:30:00Z"
/// }
/// ```
pub async fn health_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

/// Readiness probe endpoint.
///
/// Answers 200 once the server is accepting traffic. Upstream availability
/// is intentionally not part of readiness: a degraded upstream is handled
/// by the circuit breaker, not by taking the gateway out of rotation.
pub async fn readiness_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ready",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

/// Liveness probe endpoint. Fails only when the process is truly broken.
pub async fn liveness_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "alive",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

/// Registers the gateway's own health endpoints.
///
/// These must be configured before the proxy catch-all so they are served
/// locally instead of being forwarded upstream.
pub fn configure_health(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check))
        .route("/live", web::get().to(liveness_check));
}
