//! Portico Gateway Server
//!
//! Binary entry point for the Portico reverse-proxy gateway: loads and
//! validates configuration, wires the middleware stack and the HTTP
//! server, spawns the background health prober, and handles graceful
//! shutdown.

use portico_rs::config::settings::{config_path, load_settings};
use portico_rs::config::validation::ConfigValidator;
use portico_rs::logs::logger::configure_logger;
use portico_rs::middleware::correlation::Correlation;
use portico_rs::middleware::rate_limit::RateLimit;
use portico_rs::routes::{admin, health, proxy};
use portico_rs::services::health::HealthMonitor;
use portico_rs::services::load_balancer::LoadBalancer;
use portico_rs::services::proxy::ProxyHandler;
use portico_rs::services::route_table::RouteTable;

use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{
    middleware::{Compress, Logger},
    web, App, HttpServer,
};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

/// Cadence of the background health prober.
const PROBE_INTERVAL: Duration = Duration::from_secs(15);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(err) => {
            error!("Failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    info!("Starting Portico Gateway v{}", env!("CARGO_PKG_VERSION"));

    let validation_result = ConfigValidator::validate_comprehensive(&settings);
    if !validation_result.is_valid {
        error!("Configuration validation failed:");
        for err in &validation_result.errors {
            error!("  - {err}");
        }
        std::process::exit(1);
    }

    let routes = settings
        .build_routes()
        .expect("validated configuration must build");
    info!("Loaded {} routes", routes.len());

    let gateway = settings.gateway.clone();
    let table = Arc::new(RouteTable::with_config_path(routes, config_path()));
    let monitor = Arc::new(HealthMonitor::new(gateway.circuit_breaker.clone()));
    let balancer = Arc::new(LoadBalancer::new(monitor.clone()));
    let handler = ProxyHandler::new(
        table.clone(),
        balancer.clone(),
        monitor.clone(),
        gateway.clone(),
    );

    if gateway.enable_circuit_breaker {
        monitor.start_probing(table.clone(), PROBE_INTERVAL);
        info!("Health prober running every {}s", PROBE_INTERVAL.as_secs());
    }

    // Coarse per-peer fallback when the partitioned limiter is disabled.
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(100)
        .burst_size(200)
        .finish()
        .unwrap();

    let host = std::env::var("PORTICO_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORTICO_PORT")
        .unwrap_or_else(|_| "5900".to_string())
        .parse::<u16>()
        .unwrap_or(5900);

    info!("Starting server on {host}:{port}");

    let max_connections = gateway.max_concurrent_requests;
    let server = if gateway.enable_rate_limiting {
        let rate_limit = RateLimit::new(gateway.rate_limit.clone());
        info!(
            "Rate limiting {} requests per {}s per correlation id",
            gateway.rate_limit.permits, gateway.rate_limit.window_seconds
        );
        HttpServer::new({
            let table = table.clone();
            let monitor = monitor.clone();
            move || {
                App::new()
                    .app_data(web::Data::new(table.clone()))
                    .app_data(web::Data::new(monitor.clone()))
                    .wrap(Logger::new(r#"%a "%r" %s %b "%{User-Agent}i" %T"#))
                    .wrap(Compress::default())
                    .wrap(rate_limit.clone())
                    .wrap(Correlation::new())
                    .configure(health::configure_health)
                    .configure(admin::configure_admin)
                    .configure(|cfg| proxy::configure_proxy(cfg, handler.clone()))
            }
        })
        .max_connections(max_connections)
        .bind((host.as_str(), port))?
        .run()
    } else {
        info!("Using basic rate limiting (100 req/sec per peer, 200 burst)");
        HttpServer::new({
            let table = table.clone();
            let monitor = monitor.clone();
            move || {
                App::new()
                    .app_data(web::Data::new(table.clone()))
                    .app_data(web::Data::new(monitor.clone()))
                    .wrap(Logger::new(r#"%a "%r" %s %b "%{User-Agent}i" %T"#))
                    .wrap(Compress::default())
                    .wrap(Governor::new(&governor_conf))
                    .wrap(Correlation::new())
                    .configure(health::configure_health)
                    .configure(admin::configure_admin)
                    .configure(|cfg| proxy::configure_proxy(cfg, handler.clone()))
            }
        })
        .max_connections(max_connections)
        .bind((host.as_str(), port))?
        .run()
    };

    info!("Server started successfully");

    tokio::select! {
        result = server => {
            match result {
                Ok(_) => info!("Server stopped gracefully"),
                Err(err) => error!("Server error: {err}"),
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping server...");
        }
    }

    Ok(())
}
