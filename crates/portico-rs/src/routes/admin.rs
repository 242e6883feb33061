//! Control-plane endpoints for route management and destination health.
//!
//! The management surface drives the core exclusively through the route
//! table operations and the health monitor's read-only snapshots. Admin
//! mutations change the live table only; the gateway never persists
//! configuration, and `reload` re-reads the configuration file instead.

use actix_web::{delete, get, post, put, web, HttpResponse, Responder, ResponseError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::route::{Route, RouteDefinition, RouteView};
use crate::services::health::{HealthMonitor, HealthStats};
use crate::services::route_table::RouteTable;

/// Response envelope for route management operations.
#[derive(Serialize, Deserialize)]
pub struct RouteResponse {
    /// Whether the operation completed successfully
    pub success: bool,
    /// Human-readable message describing the result
    pub message: String,
    /// Single route view (get/upsert operations)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteView>,
    /// Route view list (list operations)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<RouteView>>,
}

/// Health view for one destination.
#[derive(Serialize, Deserialize)]
pub struct DestinationHealthView {
    pub destination: String,
    pub stats: HealthStats,
}

/// List all routes ordered by priority.
///
/// # Endpoint
///
/// `GET /admin/routes`
#[get("/admin/routes")]
pub async fn list_routes(table: web::Data<Arc<RouteTable>>) -> impl Responder {
    let views: Vec<RouteView> = table.get_all().iter().map(|route| route.to_view()).collect();

    HttpResponse::Ok().json(RouteResponse {
        success: true,
        message: format!("Found {} routes", views.len()),
        route: None,
        routes: Some(views),
    })
}

/// Get a single route by id.
///
/// # Endpoint
///
/// `GET /admin/routes/{route_id}`
#[get("/admin/routes/{route_id}")]
pub async fn get_route(
    table: web::Data<Arc<RouteTable>>,
    path: web::Path<String>,
) -> impl Responder {
    let route_id = path.into_inner();
    match table.get(&route_id) {
        Ok(route) => HttpResponse::Ok().json(RouteResponse {
            success: true,
            message: "Route found".to_string(),
            route: Some(route.to_view()),
            routes: None,
        }),
        Err(error) => error.error_response(),
    }
}

/// Create or replace a route.
///
/// The definition is validated through the route factory before the table
/// is touched; an invalid body never reaches the table.
///
/// # Endpoint
///
/// `PUT /admin/routes/{route_id}`
///
/// # Example
///
/// ```bash
/// curl -X PUT http://localhost:5900/admin/routes/users \
///   -H "Content-Type: application/json" \
///   -d '{
///     "route_id": "users",
///     "route_prefix": "/api/users",
///     "destinations": ["http://users-1:8080", "http://users-2:8080"],
///     "priority": 10,
///     "policy": { "load_balancing": "least_connections" }
///   }'
/// ```
#[put("/admin/routes/{route_id}")]
pub async fn upsert_route(
    table: web::Data<Arc<RouteTable>>,
    path: web::Path<String>,
    definition: web::Json<RouteDefinition>,
) -> impl Responder {
    let route_id = path.into_inner();
    let definition = definition.into_inner();

    if definition.route_id != route_id {
        return HttpResponse::BadRequest().json(RouteResponse {
            success: false,
            message: "Route route_id must match the URL parameter".to_string(),
            route: None,
            routes: None,
        });
    }

    let route = match Route::new(definition) {
        Ok(route) => route,
        Err(error) => return error.error_response(),
    };
    let view = route.to_view();

    match table.upsert(route) {
        Ok(()) => HttpResponse::Ok().json(RouteResponse {
            success: true,
            message: "Route stored".to_string(),
            route: Some(view),
            routes: None,
        }),
        Err(error) => error.error_response(),
    }
}

/// Delete a route by id.
///
/// Answers 204 with no body on success, 404 when the route is unknown.
///
/// # Endpoint
///
/// `DELETE /admin/routes/{route_id}`
#[delete("/admin/routes/{route_id}")]
pub async fn delete_route(
    table: web::Data<Arc<RouteTable>>,
    path: web::Path<String>,
) -> impl Responder {
    let route_id = path.into_inner();
    match table.remove(&route_id) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(error) => error.error_response(),
    }
}

/// Re-read the configuration file and atomically swap the route table.
///
/// # Endpoint
///
/// `POST /admin/reload`
#[post("/admin/reload")]
pub async fn reload_routes(table: web::Data<Arc<RouteTable>>) -> impl Responder {
    match table.reload() {
        Ok(count) => HttpResponse::Ok().json(RouteResponse {
            success: true,
            message: format!("Configuration reloaded, {count} routes active"),
            route: None,
            routes: None,
        }),
        Err(error) => error.error_response(),
    }
}

/// Health snapshots for every destination known to the route table.
///
/// # Endpoint
///
/// `GET /admin/destinations`
#[get("/admin/destinations")]
pub async fn list_destinations(
    table: web::Data<Arc<RouteTable>>,
    monitor: web::Data<Arc<HealthMonitor>>,
) -> impl Responder {
    let mut seen = HashSet::new();
    let mut views = Vec::new();
    for route in table.get_all() {
        for destination in route.destinations() {
            if seen.insert(destination.clone()) {
                views.push(DestinationHealthView {
                    destination: destination.clone(),
                    stats: monitor.get_stats(destination),
                });
            }
        }
    }
    HttpResponse::Ok().json(views)
}

/// Registers the control-plane endpoints.
pub fn configure_admin(cfg: &mut web::ServiceConfig) {
    cfg.service(list_routes)
        .service(get_route)
        .service(upsert_route)
        .service(delete_route)
        .service(reload_routes)
        .service(list_destinations);
}
