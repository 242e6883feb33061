//! Tests for configuration loading, defaults, and validation.

use portico_rs::config::settings::load_settings_from_path;
use portico_rs::config::validation::ConfigValidator;
use portico_rs::models::error::{codes, ErrorKind};
use portico_rs::models::settings::Settings;
use std::io::Write;

fn parse(json: &str) -> Settings {
    serde_json::from_str(json).unwrap()
}

#[test]
fn test_gateway_defaults() {
    let settings = parse(r#"{"version": 1}"#);
    let gateway = &settings.gateway;

    assert!(gateway.enable_rate_limiting);
    assert!(gateway.enable_circuit_breaker);
    assert!(gateway.enable_load_balancing);
    assert!(gateway.enable_authentication_forwarding);
    assert!(!gateway.enable_caching);
    assert_eq!(gateway.default_timeout_seconds, 30);
    assert_eq!(gateway.max_concurrent_requests, 100);

    assert_eq!(gateway.rate_limit.permits, 100);
    assert_eq!(gateway.rate_limit.window_seconds, 60);
    assert_eq!(gateway.rate_limit.queue_limit, 10);

    assert_eq!(gateway.circuit_breaker.break_duration_seconds, 30);
    assert_eq!(gateway.circuit_breaker.minimum_throughput, 10);
    assert_eq!(gateway.circuit_breaker.failure_rate_threshold, 0.5);
    assert_eq!(gateway.circuit_breaker.probe_timeout_seconds, 5);

    assert_eq!(gateway.cache.duration_seconds, 60);
    assert!(settings.routes.is_empty());
    assert!(settings.validate().is_ok());
}

#[test]
fn test_default_timeout_range_enforced() {
    let mut settings = parse(r#"{"version": 1}"#);

    settings.gateway.default_timeout_seconds = 0;
    let err = settings.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.code(), codes::CONFIG_INVALID);

    settings.gateway.default_timeout_seconds = 301;
    assert!(settings.validate().is_err());

    settings.gateway.default_timeout_seconds = 300;
    assert!(settings.validate().is_ok());
}

#[test]
fn test_max_concurrent_requests_range_enforced() {
    let mut settings = parse(r#"{"version": 1}"#);

    settings.gateway.max_concurrent_requests = 0;
    assert!(settings.validate().is_err());

    settings.gateway.max_concurrent_requests = 10_001;
    assert!(settings.validate().is_err());

    settings.gateway.max_concurrent_requests = 10_000;
    assert!(settings.validate().is_ok());
}

#[test]
fn test_queue_limit_bounded_by_permits() {
    let mut settings = parse(r#"{"version": 1}"#);
    settings.gateway.rate_limit.permits = 5;
    settings.gateway.rate_limit.queue_limit = 6;
    assert!(settings.validate().is_err());

    settings.gateway.rate_limit.queue_limit = 5;
    assert!(settings.validate().is_ok());
}

#[test]
fn test_routes_are_validated_through_the_factory() {
    let settings = parse(
        r#"{
            "version": 1,
            "routes": [
                {
                    "route_id": "bad",
                    "route_prefix": "no-slash",
                    "destinations": ["http://backend:8080"]
                }
            ]
        }"#,
    );

    let err = settings.validate().unwrap_err();
    assert_eq!(err.code(), codes::ROUTE_INVALID_PREFIX);
}

#[test]
fn test_duplicate_route_ids_rejected() {
    let settings = parse(
        r#"{
            "version": 1,
            "routes": [
                {
                    "route_id": "users",
                    "route_prefix": "/api/users",
                    "destinations": ["http://users-1:8080"]
                },
                {
                    "route_id": "users",
                    "route_prefix": "/api/users/v2",
                    "destinations": ["http://users-2:8080"]
                }
            ]
        }"#,
    );

    let err = settings.build_routes().unwrap_err();
    assert_eq!(err.code(), codes::CONFIG_DUPLICATE_ROUTE);
}

#[test]
fn test_load_settings_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "version": 1,
            "gateway": {{ "default_timeout_seconds": 10 }},
            "routes": [
                {{
                    "route_id": "users",
                    "route_prefix": "/api/users",
                    "destinations": ["http://users-1:8080"],
                    "policy": {{ "load_balancing": "power_of_two_choices" }}
                }}
            ]
        }}"#
    )
    .unwrap();

    let settings = load_settings_from_path(&file.path().to_string_lossy()).unwrap();
    assert_eq!(settings.gateway.default_timeout_seconds, 10);
    let routes = settings.build_routes().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].route_id(), "users");
}

#[test]
fn test_missing_file_is_load_error() {
    let err = load_settings_from_path("/definitely/not/here.json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Failure);
    assert_eq!(err.code(), codes::CONFIG_LOAD);
}

#[test]
fn test_malformed_json_is_invalid_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ this is not json").unwrap();

    let err = load_settings_from_path(&file.path().to_string_lossy()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.code(), codes::CONFIG_INVALID);
}

#[test]
fn test_validator_flags_empty_route_set() {
    let settings = parse(r#"{"version": 1, "routes": []}"#);
    let result = ConfigValidator::validate_comprehensive(&settings);
    assert!(result.is_valid);
    assert!(result
        .warnings
        .iter()
        .any(|warning| warning.contains("No routes configured")));
}

#[test]
fn test_validator_flags_shadowed_routes() {
    let settings = parse(
        r#"{
            "version": 1,
            "routes": [
                {
                    "route_id": "broad",
                    "route_prefix": "/api",
                    "destinations": ["http://a:8080"],
                    "priority": 1
                },
                {
                    "route_id": "narrow",
                    "route_prefix": "/api/users",
                    "destinations": ["http://b:8080"],
                    "priority": 10
                }
            ]
        }"#,
    );

    let result = ConfigValidator::validate_comprehensive(&settings);
    assert!(result.is_valid);
    assert!(result
        .warnings
        .iter()
        .any(|warning| warning.contains("shadowed")));
}

#[test]
fn test_validator_reports_invalid_config_as_error() {
    let settings = parse(
        r#"{
            "version": 1,
            "gateway": { "default_timeout_seconds": 0 }
        }"#,
    );

    let result = ConfigValidator::validate_comprehensive(&settings);
    assert!(!result.is_valid);
    assert!(!result.errors.is_empty());
}
