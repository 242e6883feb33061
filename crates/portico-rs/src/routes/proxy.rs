use crate::services::proxy::ProxyHandler;
use actix_web::{web, HttpRequest};

/// Configures the catch-all proxy route.
///
/// The `/{tail:.*}` pattern matches any path not claimed by an earlier
/// registration (health and admin routes), so the gateway forwards every
/// remaining request through the proxy pipeline. Payload sizes are capped
/// at 1 MiB to bound memory use; inbound bodies are buffered so idempotent
/// retries can resend them.
///
/// # Examples
///
/// ```no_run
/// use actix_web::App;
/// use std::sync::Arc;
/// use portico_rs::models::settings::{CircuitBreakerOptions, GatewayOptions};
/// use portico_rs::routes::proxy::configure_proxy;
/// use portico_rs::services::health::HealthMonitor;
/// use portico_rs::services::load_balancer::LoadBalancer;
/// use portico_rs::services::proxy::ProxyHandler;
/// use portico_rs::services::route_table::RouteTable;
///
/// let table = Arc::new(RouteTable::new(vec![]));
/// let monitor = Arc::new(HealthMonitor::new(CircuitBreakerOptions::default()));
/// let balancer = Arc::new(LoadBalancer::new(monitor.clone()));
/// let handler = ProxyHandler::new(table, balancer, monitor, GatewayOptions::default());
///
/// let app = App::new().configure(|cfg| configure_proxy(cfg, handler));
/// ```
pub fn configure_proxy(cfg: &mut web::ServiceConfig, handler: ProxyHandler) {
    cfg.app_data(web::PayloadConfig::new(1024 * 1024))
        .app_data(web::JsonConfig::default().limit(1024 * 1024))
        .service(
            web::resource("/{tail:.*}").to(move |req: HttpRequest, body: web::Bytes| {
                let handler = handler.clone();
                async move { handler.handle_request(req, body).await }
            }),
        );
}
