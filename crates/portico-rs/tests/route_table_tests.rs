//! Tests for the hot-reloadable route table.

use portico_rs::models::error::{codes, ErrorKind};
use portico_rs::models::route::{Policy, Route, RouteDefinition};
use portico_rs::services::route_table::RouteTable;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

fn route(route_id: &str, route_prefix: &str, priority: u32) -> Route {
    Route::new(RouteDefinition {
        route_id: route_id.to_string(),
        route_prefix: route_prefix.to_string(),
        destinations: vec!["http://backend:8080".to_string()],
        policy: Policy::default(),
        priority,
        requires_authentication: false,
        allowed_roles: None,
    })
    .unwrap()
}

#[test]
fn test_get_all_sorted_by_priority() {
    let table = RouteTable::new(vec![
        route("c", "/c", 30),
        route("a", "/a", 10),
        route("b", "/b", 20),
    ]);

    let snapshot = table.get_all();
    let ids: Vec<&str> = snapshot.iter().map(|r| r.route_id()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn test_get_by_id() {
    let table = RouteTable::new(vec![route("users", "/api/users", 0)]);
    assert_eq!(table.get("users").unwrap().route_prefix(), "/api/users");

    let err = table.get("missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.code(), codes::ROUTE_TABLE_NOT_FOUND);
}

#[test]
fn test_upsert_inserts_and_replaces() {
    let table = RouteTable::new(vec![]);
    table.upsert(route("users", "/api/users", 10)).unwrap();
    assert_eq!(table.len(), 1);

    // Same id replaces rather than duplicates.
    table.upsert(route("users", "/api/users", 99)).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get("users").unwrap().priority(), 99);
}

#[test]
fn test_remove() {
    let table = RouteTable::new(vec![route("users", "/api/users", 0)]);
    table.remove("users").unwrap();
    assert!(table.is_empty());

    let err = table.remove("users").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_match_route_lowest_priority_wins() {
    let table = RouteTable::new(vec![
        route("catchall", "/", 100),
        route("api", "/api", 20),
        route("users", "/api/users", 10),
    ]);

    assert_eq!(
        table.match_route("/api/users/42").unwrap().route_id(),
        "users"
    );
    assert_eq!(table.match_route("/api/orders").unwrap().route_id(), "api");
    assert_eq!(table.match_route("/other").unwrap().route_id(), "catchall");
}

#[test]
fn test_match_route_tie_prefers_longer_prefix() {
    let table = RouteTable::new(vec![
        route("broad", "/api", 10),
        route("narrow", "/api/users", 10),
    ]);
    assert_eq!(
        table.match_route("/api/users/1").unwrap().route_id(),
        "narrow"
    );
}

#[test]
fn test_match_route_none_when_no_prefix_matches() {
    let table = RouteTable::new(vec![route("api", "/api", 0)]);
    assert!(table.match_route("/metrics").is_none());
}

#[test]
fn test_reload_swaps_table_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "version": 1,
            "routes": [
                {{
                    "route_id": "orders",
                    "route_prefix": "/api/orders",
                    "destinations": ["http://orders-1:8080"],
                    "priority": 5
                }},
                {{
                    "route_id": "users",
                    "route_prefix": "/api/users",
                    "destinations": ["http://users-1:8080"]
                }}
            ]
        }}"#
    )
    .unwrap();

    let table = RouteTable::with_config_path(
        vec![route("stale", "/stale", 0)],
        file.path().to_string_lossy().to_string(),
    );

    let count = table.reload().unwrap();
    assert_eq!(count, 2);
    assert_eq!(table.len(), 2);
    assert!(table.get("stale").is_err());
    assert_eq!(table.get("orders").unwrap().priority(), 5);
}

#[test]
fn test_reload_failure_leaves_table_untouched() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not valid json").unwrap();

    let table = RouteTable::with_config_path(
        vec![route("keep", "/keep", 0)],
        file.path().to_string_lossy().to_string(),
    );

    let err = table.reload().unwrap_err();
    assert_eq!(err.code(), codes::CONFIG_INVALID);
    // The failed reload must not have swapped anything.
    assert_eq!(table.len(), 1);
    assert!(table.get("keep").is_ok());
}

#[test]
fn test_reload_without_source_fails() {
    let table = RouteTable::new(vec![route("users", "/api/users", 0)]);
    let err = table.reload().unwrap_err();
    assert_eq!(err.code(), codes::CONFIG_LOAD);
    assert_eq!(table.len(), 1);
}

#[test]
fn test_concurrent_upserts_and_snapshots() {
    let table = Arc::new(RouteTable::new(vec![]));
    let writers = 4;
    let per_writer = 250;

    let mut handles = Vec::new();
    for writer in 0..writers {
        let table = table.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..per_writer {
                let id = format!("w{writer}-r{i}");
                let prefix = format!("/w{writer}/r{i}");
                table.upsert(route(&id, &prefix, i as u32)).unwrap();
            }
        }));
    }

    let reader = {
        let table = table.clone();
        std::thread::spawn(move || {
            for _ in 0..1000 {
                let snapshot = table.get_all();
                // Every snapshot is internally consistent: unique ids and
                // non-decreasing priorities.
                let mut ids = HashSet::new();
                for route in &snapshot {
                    assert!(ids.insert(route.route_id().to_string()));
                }
                let priorities: Vec<u32> = snapshot.iter().map(|r| r.priority()).collect();
                let mut sorted = priorities.clone();
                sorted.sort();
                assert_eq!(priorities, sorted);
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    // The final snapshot contains exactly the distinct ids written.
    assert_eq!(table.len(), writers * per_writer);
}
