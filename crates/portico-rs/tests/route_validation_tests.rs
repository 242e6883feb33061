//! Tests for route construction and validation.

use portico_rs::models::error::{codes, ErrorKind};
use portico_rs::models::route::{LoadBalancingStrategy, Policy, Route, RouteDefinition};

fn definition(route_id: &str, route_prefix: &str, destinations: Vec<&str>) -> RouteDefinition {
    RouteDefinition {
        route_id: route_id.to_string(),
        route_prefix: route_prefix.to_string(),
        destinations: destinations.into_iter().map(String::from).collect(),
        policy: Policy::default(),
        priority: 0,
        requires_authentication: false,
        allowed_roles: None,
    }
}

#[test]
fn test_valid_route_constructs() {
    let route = Route::new(definition(
        "users",
        "/api/users",
        vec!["http://users-1:8080", "https://users-2:8443"],
    ))
    .unwrap();

    assert_eq!(route.route_id(), "users");
    assert_eq!(route.route_prefix(), "/api/users");
    assert_eq!(route.destinations().len(), 2);
    assert_eq!(route.priority(), 0);
    assert!(!route.requires_authentication());
    assert!(route.allowed_roles().is_none());
}

#[test]
fn test_empty_id_rejected() {
    let err = Route::new(definition("", "/api", vec!["http://backend:8080"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.code(), codes::ROUTE_INVALID_ID);
}

#[test]
fn test_whitespace_id_rejected() {
    let err = Route::new(definition("   ", "/api", vec!["http://backend:8080"])).unwrap_err();
    assert_eq!(err.code(), codes::ROUTE_INVALID_ID);
}

#[test]
fn test_empty_prefix_rejected() {
    let err = Route::new(definition("r", "", vec!["http://backend:8080"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.code(), codes::ROUTE_INVALID_PREFIX);
}

#[test]
fn test_prefix_must_start_with_slash() {
    let err = Route::new(definition("r", "api/users", vec!["http://backend:8080"])).unwrap_err();
    assert_eq!(err.code(), codes::ROUTE_INVALID_PREFIX);
}

#[test]
fn test_empty_destinations_rejected() {
    let err = Route::new(definition("r", "/api", vec![])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.code(), codes::ROUTE_NO_DESTINATIONS);
}

#[test]
fn test_relative_destination_rejected() {
    let err = Route::new(definition("r", "/api", vec!["backend:8080"])).unwrap_err();
    assert_eq!(err.code(), codes::ROUTE_INVALID_DESTINATION);

    let err = Route::new(definition("r", "/api", vec!["/just/a/path"])).unwrap_err();
    assert_eq!(err.code(), codes::ROUTE_INVALID_DESTINATION);
}

#[test]
fn test_non_http_scheme_rejected() {
    let err = Route::new(definition("r", "/api", vec!["ftp://backend:21"])).unwrap_err();
    assert_eq!(err.code(), codes::ROUTE_INVALID_DESTINATION);
}

#[test]
fn test_one_bad_destination_poisons_the_route() {
    let err = Route::new(definition(
        "r",
        "/api",
        vec!["http://good:8080", "not a url"],
    ))
    .unwrap_err();
    assert_eq!(err.code(), codes::ROUTE_INVALID_DESTINATION);
}

#[test]
fn test_policy_zero_permits_rejected() {
    let mut def = definition("r", "/api", vec!["http://backend:8080"]);
    def.policy.rate_limit_permits = 0;
    let err = Route::new(def).unwrap_err();
    assert_eq!(err.code(), codes::ROUTE_INVALID_POLICY);
}

#[test]
fn test_policy_zero_window_rejected() {
    let mut def = definition("r", "/api", vec!["http://backend:8080"]);
    def.policy.rate_limit_window_seconds = 0;
    let err = Route::new(def).unwrap_err();
    assert_eq!(err.code(), codes::ROUTE_INVALID_POLICY);
}

#[test]
fn test_policy_timeout_range() {
    let mut def = definition("r", "/api", vec!["http://backend:8080"]);
    def.policy.timeout_seconds = 0;
    assert_eq!(
        Route::new(def.clone()).unwrap_err().code(),
        codes::ROUTE_INVALID_POLICY
    );

    def.policy.timeout_seconds = 301;
    assert_eq!(
        Route::new(def.clone()).unwrap_err().code(),
        codes::ROUTE_INVALID_POLICY
    );

    def.policy.timeout_seconds = 300;
    assert!(Route::new(def).is_ok());
}

#[test]
fn test_policy_defaults() {
    let policy = Policy::default();
    assert_eq!(policy.load_balancing, LoadBalancingStrategy::RoundRobin);
    assert_eq!(policy.timeout_seconds, 30);
    assert_eq!(policy.rate_limit_permits, 100);
    assert_eq!(policy.rate_limit_window_seconds, 60);
    assert_eq!(policy.max_retries, 0);
    assert!(policy.enable_circuit_breaker);
    assert!(!policy.enable_rate_limiting);
    assert!(!policy.enable_caching);
}

#[test]
fn test_equality_by_id_and_prefix_only() {
    let a = Route::new(definition("r", "/api", vec!["http://one:8080"])).unwrap();

    let mut other = definition("r", "/api", vec!["http://two:8080", "http://three:8080"]);
    other.priority = 99;
    other.policy.load_balancing = LoadBalancingStrategy::Random;
    let b = Route::new(other).unwrap();

    // Same identity despite different destinations, priority, and policy.
    assert_eq!(a, b);

    let c = Route::new(definition("r", "/other", vec!["http://one:8080"])).unwrap();
    assert_ne!(a, c);

    let d = Route::new(definition("r2", "/api", vec!["http://one:8080"])).unwrap();
    assert_ne!(a, d);
}

#[test]
fn test_prefix_matching() {
    let route = Route::new(definition("r", "/api/users", vec!["http://backend:8080"])).unwrap();
    assert!(route.matches("/api/users"));
    assert!(route.matches("/api/users/42"));
    assert!(!route.matches("/api/user"));
    assert!(!route.matches("/other"));
}

#[test]
fn test_route_view_shape() {
    let mut def = definition("users", "/api/users", vec!["http://backend:8080"]);
    def.priority = 5;
    def.requires_authentication = true;
    def.allowed_roles = Some(vec!["admin".to_string()]);
    def.policy.load_balancing = LoadBalancingStrategy::PowerOfTwoChoices;
    def.policy.timeout_seconds = 15;

    let view = Route::new(def).unwrap().to_view();
    assert_eq!(view.route_id, "users");
    assert_eq!(view.route_prefix, "/api/users");
    assert_eq!(view.destinations, vec!["http://backend:8080".to_string()]);
    assert_eq!(view.priority, 5);
    assert!(view.requires_authentication);
    assert_eq!(view.allowed_roles, Some(vec!["admin".to_string()]));
    assert_eq!(view.policy.load_balancing, "power_of_two_choices");
    assert_eq!(view.policy.timeout_seconds, 15);
}

#[test]
fn test_definition_serde_defaults() {
    let def: RouteDefinition = serde_json::from_str(
        r#"{
            "route_id": "users",
            "route_prefix": "/api/users",
            "destinations": ["http://backend:8080"]
        }"#,
    )
    .unwrap();

    assert_eq!(def.priority, 0);
    assert!(!def.requires_authentication);
    assert!(def.allowed_roles.is_none());
    assert!(Route::new(def).is_ok());
}
