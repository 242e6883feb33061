//! Tests for health stats, the healthy flag, and the circuit state machine.

use portico_rs::models::settings::CircuitBreakerOptions;
use portico_rs::services::health::{CircuitState, HealthMonitor};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn monitor() -> HealthMonitor {
    HealthMonitor::new(CircuitBreakerOptions::default())
}

/// Break duration of zero lets tests cross the Open window immediately.
fn monitor_with_zero_break() -> HealthMonitor {
    HealthMonitor::new(CircuitBreakerOptions {
        break_duration_seconds: 0,
        ..CircuitBreakerOptions::default()
    })
}

#[test]
fn test_stats_invariants() {
    let monitor = monitor();
    let dest = "http://svc:8080";

    for _ in 0..7 {
        monitor.record_success(dest);
    }
    for _ in 0..3 {
        monitor.record_failure(dest);
    }

    let stats = monitor.get_stats(dest);
    assert_eq!(stats.total_requests, 10);
    assert_eq!(stats.successful_requests, 7);
    assert_eq!(stats.failed_requests, 3);
    assert_eq!(
        stats.total_requests,
        stats.successful_requests + stats.failed_requests
    );
    assert!((stats.success_rate - 0.7).abs() < 1e-9);
    assert!(stats.success_rate >= 0.0 && stats.success_rate <= 1.0);
}

#[test]
fn test_fresh_destination_has_zero_rate_but_is_healthy() {
    let monitor = monitor();
    let stats = monitor.get_stats("http://new:8080");
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.success_rate, 0.0);
    assert!(stats.is_healthy);
}

#[test]
fn test_healthy_flag_is_asymmetric() {
    let monitor = monitor();
    let dest = "http://svc:8080";

    // A failing streak marks the destination unhealthy.
    for _ in 0..9 {
        monitor.record_failure(dest);
    }
    assert!(!monitor.get_stats(dest).is_healthy);

    // A single success re-admits it immediately, even at a 10% rate.
    monitor.record_success(dest);
    let stats = monitor.get_stats(dest);
    assert!(stats.is_healthy);
    assert!(stats.success_rate < 0.5);

    // The next failure re-evaluates the rate and unflags it again.
    monitor.record_failure(dest);
    assert!(!monitor.get_stats(dest).is_healthy);
}

#[test]
fn test_breaker_never_opens_below_minimum_throughput() {
    let monitor = monitor();
    let dest = "http://svc:8080";

    for _ in 0..9 {
        monitor.record_failure(dest);
        assert_eq!(monitor.circuit(dest).0, CircuitState::Closed);
    }
}

#[test]
fn test_breaker_opens_at_minimum_throughput() {
    let monitor = monitor();
    let dest = "http://svc:8080";

    for _ in 0..10 {
        monitor.record_failure(dest);
    }
    assert_eq!(monitor.circuit(dest).0, CircuitState::Open);
}

#[test]
fn test_breaker_stays_closed_while_rate_is_good() {
    let monitor = monitor();
    let dest = "http://svc:8080";

    // 12 successes, 8 failures: rate 0.6 stays above the threshold.
    for _ in 0..12 {
        monitor.record_success(dest);
    }
    for _ in 0..8 {
        monitor.record_failure(dest);
    }
    assert_eq!(monitor.circuit(dest).0, CircuitState::Closed);
}

#[test]
fn test_transition_stamps_last_state_change() {
    let monitor = monitor();
    let dest = "http://svc:8080";

    let (state, stamped_at) = monitor.circuit(dest);
    assert_eq!(state, CircuitState::Closed);

    for _ in 0..10 {
        monitor.record_failure(dest);
    }
    let (state, opened_at) = monitor.circuit(dest);
    assert_eq!(state, CircuitState::Open);
    assert!(opened_at >= stamped_at);
}

#[actix_web::test]
async fn test_open_circuit_short_circuits_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let monitor = monitor();
    let dest = server.uri();

    for _ in 0..10 {
        monitor.record_failure(&dest);
    }
    assert_eq!(monitor.circuit(&dest).0, CircuitState::Open);

    // Inside the 30s break the probe is skipped entirely: the counters do
    // not move and the answer is false even though the upstream is fine.
    assert!(!monitor.is_healthy(&dest).await);
    assert_eq!(monitor.get_stats(&dest).total_requests, 10);
    assert_eq!(monitor.circuit(&dest).0, CircuitState::Open);
}

#[actix_web::test]
async fn test_probe_success_closes_half_open_circuit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let monitor = monitor_with_zero_break();
    let dest = server.uri();

    for _ in 0..10 {
        monitor.record_failure(&dest);
    }
    assert_eq!(monitor.circuit(&dest).0, CircuitState::Open);

    // The break has elapsed, so the circuit half-opens, probes, and the
    // 2xx closes it.
    assert!(monitor.is_healthy(&dest).await);
    assert_eq!(monitor.circuit(&dest).0, CircuitState::Closed);
    assert!(monitor.get_stats(&dest).is_healthy);
}

#[actix_web::test]
async fn test_probe_failure_reopens_half_open_circuit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let monitor = monitor_with_zero_break();
    let dest = server.uri();

    for _ in 0..10 {
        monitor.record_failure(&dest);
    }

    assert!(!monitor.is_healthy(&dest).await);
    // Half-open plus a failure under the throughput rule goes back to Open.
    assert_eq!(monitor.circuit(&dest).0, CircuitState::Open);
    assert_eq!(monitor.get_stats(&dest).failed_requests, 11);
}

#[actix_web::test]
async fn test_probe_non_2xx_records_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let monitor = monitor();
    let dest = server.uri();

    assert!(!monitor.is_healthy(&dest).await);
    let stats = monitor.get_stats(&dest);
    assert_eq!(stats.failed_requests, 1);
    assert!(!stats.is_healthy);
    // A single failure is far below the minimum throughput.
    assert_eq!(monitor.circuit(&dest).0, CircuitState::Closed);
}

#[actix_web::test]
async fn test_probe_2xx_records_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let monitor = monitor();
    let dest = server.uri();

    assert!(monitor.is_healthy(&dest).await);
    let stats = monitor.get_stats(&dest);
    assert_eq!(stats.successful_requests, 1);
    assert!(stats.is_healthy);
}

#[actix_web::test]
async fn test_probe_strips_trailing_slash() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let monitor = monitor();
    let dest = format!("{}/", server.uri());

    // `<dest>/health`, not `<dest>//health`.
    assert!(monitor.is_healthy(&dest).await);
}

#[actix_web::test]
async fn test_probe_transport_error_records_failure() {
    let monitor = monitor();
    // Nothing listens on port 9; the connection is refused.
    let dest = "http://127.0.0.1:9";

    assert!(!monitor.is_healthy(dest).await);
    let stats = monitor.get_stats(dest);
    assert_eq!(stats.failed_requests, 1);
    assert!(!stats.is_healthy);
}
