//! # Portico Gateway
//!
//! A smart HTTP reverse-proxy gateway built with Rust and Actix Web.
//! Portico is the single ingress point in front of a fleet of backend
//! services: it matches requests to routes by path prefix, selects a
//! healthy upstream destination per the route's load-balancing policy,
//! forwards the request while propagating trust context, and tracks
//! per-destination health so failing upstreams are temporarily excluded
//! from selection.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use portico_rs::config::settings::load_settings;
//! use portico_rs::services::health::HealthMonitor;
//! use portico_rs::services::load_balancer::LoadBalancer;
//! use portico_rs::services::proxy::ProxyHandler;
//! use portico_rs::services::route_table::RouteTable;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = load_settings()?;
//! settings.validate()?;
//!
//! let table = Arc::new(RouteTable::new(settings.build_routes()?));
//! let monitor = Arc::new(HealthMonitor::new(settings.gateway.circuit_breaker.clone()));
//! let balancer = Arc::new(LoadBalancer::new(monitor.clone()));
//! let handler = ProxyHandler::new(table, balancer, monitor, settings.gateway.clone());
//!
//! // The handler is now ready to be mounted on the catch-all route.
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Subsystems
//!
//! - **Route table**: hot-reloadable, keyed by route id; concurrent reads
//!   with serialized writes and an atomic `reload` swap
//! - **Load balancer**: round robin, least connections, random, and
//!   power-of-two-choices with live connection accounting
//! - **Health monitor**: per-destination stats plus a three-state circuit
//!   breaker fed by probes and by proxy completions
//! - **Proxy pipeline**: correlation propagation, rate-limit admission,
//!   timeout enforcement, identity forwarding, completion accounting
//!
//! ## Request Flow
//!
//! ```text
//! Client -> Correlation -> Rate Limit -> Route Match -> Select -> Forward -> Upstream
//!                                              |           |          |
//!                                         Route Table   Balancer   Health Monitor
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - configuration loading and validation
//! - [`models`] - domain types, validation logic, and the error model
//! - [`services`] - route table, health monitor, load balancer, proxy
//! - [`routes`] - HTTP route registration (proxy catch-all, health, admin)
//! - [`middleware`] - correlation, identity forwarding, rate limiting
//! - [`logs`] - logging configuration
//! - [`utils`] - URL helpers
//!
//! ## Environment Variables
//!
//! - `PORTICO_CONFIG_PATH`: configuration file path (default `./config.json`)
//! - `PORTICO_HOST`: server bind address (default `0.0.0.0`)
//! - `PORTICO_PORT`: server port (default `5900`)
//! - `NO_COLOR`: disable colored log output

pub mod config;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;
