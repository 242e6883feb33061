//! Hot-reloadable route table keyed by route id.
//!
//! The table is the single source of truth the proxy consults on every
//! request. Reads are cheap snapshots under a shared lock; all mutations
//! (upsert, remove, reload) serialize through the exclusive lock, so a
//! reader always observes either the state before or after a mutation,
//! never a partial one.

use crate::config::settings::load_settings_from_path;
use crate::models::error::{codes, GatewayError};
use crate::models::route::Route;
use ahash::HashMap as AHashMap;
use log::{debug, info};
use std::sync::{Arc, RwLock};

/// Keyed container mapping `route_id` to a validated [`Route`].
///
/// # Thread Safety
///
/// Many readers, writers serialized through one `RwLock`. None of the
/// critical sections suspend, so the std lock is used rather than an async
/// one and every operation short of `reload` is synchronous.
///
/// # Examples
///
/// ```
/// use portico_rs::models::route::{Route, RouteDefinition, Policy};
/// use portico_rs::services::route_table::RouteTable;
///
/// let route = Route::new(RouteDefinition {
///     route_id: "users".to_string(),
///     route_prefix: "/api/users".to_string(),
///     destinations: vec!["http://users-1:8080".to_string()],
///     policy: Policy::default(),
///     priority: 10,
///     requires_authentication: false,
///     allowed_roles: None,
/// }).unwrap();
///
/// let table = RouteTable::new(vec![route]);
/// assert!(table.get("users").is_ok());
/// assert!(table.match_route("/api/users/7").is_some());
/// ```
pub struct RouteTable {
    routes: RwLock<AHashMap<String, Arc<Route>>>,
    config_path: Option<String>,
}

impl RouteTable {
    /// Creates a table seeded with the given routes and no reload source.
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes: RwLock::new(Self::index(routes)),
            config_path: None,
        }
    }

    /// Creates a table seeded with the given routes that can `reload` from
    /// the configuration file at `config_path`.
    pub fn with_config_path(routes: Vec<Route>, config_path: String) -> Self {
        Self {
            routes: RwLock::new(Self::index(routes)),
            config_path: Some(config_path),
        }
    }

    fn index(routes: Vec<Route>) -> AHashMap<String, Arc<Route>> {
        let mut map = AHashMap::default();
        for route in routes {
            map.insert(route.route_id().to_string(), Arc::new(route));
        }
        map
    }

    /// Snapshot of all routes ordered by ascending priority.
    ///
    /// Ties are broken by route id so the ordering is deterministic. The
    /// snapshot reflects only completed mutations; it is safe to call
    /// concurrently with any writer.
    pub fn get_all(&self) -> Vec<Arc<Route>> {
        let routes = self.routes.read().unwrap();
        let mut snapshot: Vec<Arc<Route>> = routes.values().cloned().collect();
        snapshot.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.route_id().cmp(b.route_id()))
        });
        snapshot
    }

    /// Looks up a single route by id.
    ///
    /// # Errors
    ///
    /// `RouteTable.NotFound` when no route has the given id.
    pub fn get(&self, route_id: &str) -> Result<Arc<Route>, GatewayError> {
        self.routes
            .read()
            .unwrap()
            .get(route_id)
            .cloned()
            .ok_or_else(|| {
                GatewayError::not_found(
                    codes::ROUTE_TABLE_NOT_FOUND,
                    format!("no route with id {route_id:?}"),
                )
            })
    }

    /// Inserts or replaces the route with the same `route_id`.
    pub fn upsert(&self, route: Route) -> Result<(), GatewayError> {
        let mut routes = self.routes.write().unwrap();
        let replaced = routes
            .insert(route.route_id().to_string(), Arc::new(route))
            .is_some();
        debug!(
            "route table upsert ({}), {} routes configured",
            if replaced { "replaced" } else { "inserted" },
            routes.len()
        );
        Ok(())
    }

    /// Removes the route with the given id.
    ///
    /// # Errors
    ///
    /// `RouteTable.NotFound` when no route has the given id.
    pub fn remove(&self, route_id: &str) -> Result<(), GatewayError> {
        let mut routes = self.routes.write().unwrap();
        if routes.remove(route_id).is_none() {
            return Err(GatewayError::not_found(
                codes::ROUTE_TABLE_NOT_FOUND,
                format!("no route with id {route_id:?}"),
            ));
        }
        debug!("route table removed {route_id:?}, {} routes remain", routes.len());
        Ok(())
    }

    /// Re-reads the configuration source and atomically swaps the table.
    ///
    /// The file is read, parsed, and fully validated before the write lock
    /// is taken; the swap itself is a single assignment under the lock, so
    /// concurrent readers see either the pre-reload or post-reload table.
    ///
    /// # Errors
    ///
    /// - `Config.Load` when the table has no configuration source or the
    ///   file cannot be read
    /// - any validation error from the settings or a route definition
    pub fn reload(&self) -> Result<usize, GatewayError> {
        let path = self.config_path.as_ref().ok_or_else(|| {
            GatewayError::failure(
                codes::CONFIG_LOAD,
                "route table has no configuration source to reload from",
            )
        })?;

        let settings = load_settings_from_path(path)?;
        settings.gateway.validate()?;
        let routes = settings.build_routes()?;
        let count = routes.len();
        let rebuilt = Self::index(routes);

        *self.routes.write().unwrap() = rebuilt;
        info!("route table reloaded from {path}: {count} routes");
        Ok(count)
    }

    /// Picks the route for a request path: among routes whose prefix
    /// matches, the lowest priority wins; ties go to the longest prefix.
    pub fn match_route(&self, path: &str) -> Option<Arc<Route>> {
        let routes = self.routes.read().unwrap();
        routes
            .values()
            .filter(|route| route.matches(path))
            .min_by(|a, b| {
                a.priority()
                    .cmp(&b.priority())
                    .then_with(|| b.route_prefix().len().cmp(&a.route_prefix().len()))
                    .then_with(|| a.route_id().cmp(b.route_id()))
            })
            .cloned()
    }

    /// Number of routes currently configured.
    pub fn len(&self) -> usize {
        self.routes.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().unwrap().is_empty()
    }
}
