//! Load balancing across a route's destinations with live connection
//! accounting.
//!
//! Selection filters the destination list down to those the health monitor
//! currently flags healthy, applies the route policy's strategy, and
//! increments the winner's connection gauge. Completion accounting
//! decrements the gauge with a clamp at zero.

use crate::models::error::{codes, GatewayError};
use crate::models::route::{LoadBalancingStrategy, Route};
use crate::services::health::HealthMonitor;
use ahash::HashMap as AHashMap;
use log::debug;
use rand::Rng;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Active-request gauge for one destination.
///
/// Increments happen on selection and decrements on completion. A
/// decrement that would drop the gauge below zero clamps to zero via a
/// compare-and-swap loop, so the observed value is always one that some
/// real sequence of increments and decrements produced.
#[derive(Debug, Default)]
pub struct ConnectionCounter {
    active: AtomicU64,
}

impl ConnectionCounter {
    pub fn new() -> Self {
        Self {
            active: AtomicU64::new(0),
        }
    }

    /// Increments the gauge and returns the new value.
    pub fn increment(&self) -> u64 {
        self.active.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrements the gauge, clamping at zero. Returns the new value.
    pub fn decrement(&self) -> u64 {
        match self
            .active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(1)
            }) {
            Ok(previous) => previous - 1,
            Err(_) => 0,
        }
    }

    pub fn get(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }
}

/// Destination selector implementing the route policy strategies.
///
/// # Algorithm
///
/// 1. Filter the route's destinations to those flagged healthy; when the
///    filtered set is empty, fall back to the full list so a blown-up
///    destination set is still attempted rather than refusing all traffic.
/// 2. Apply the policy's strategy to the candidate list observed this
///    call.
/// 3. Increment the selected destination's connection gauge.
///
/// Round-robin counters are kept per route id and connection gauges per
/// destination; both maps create entries on first use and never drop them
/// for the life of the process.
///
/// # Thread Safety
///
/// Counter updates are atomic; map access takes a short `RwLock` read in
/// the common case. Safe to share via `Arc` across workers.
pub struct LoadBalancer {
    monitor: Arc<HealthMonitor>,
    round_robin: RwLock<AHashMap<String, Arc<AtomicUsize>>>,
    connections: RwLock<AHashMap<String, Arc<ConnectionCounter>>>,
}

impl LoadBalancer {
    pub fn new(monitor: Arc<HealthMonitor>) -> Self {
        Self {
            monitor,
            round_robin: RwLock::new(AHashMap::default()),
            connections: RwLock::new(AHashMap::default()),
        }
    }

    /// Selects a destination for the route and increments its gauge.
    ///
    /// The caller must invoke [`LoadBalancer::record_completion`] exactly
    /// once for the returned destination, on success and error paths
    /// alike.
    ///
    /// # Errors
    ///
    /// `LoadBalancer.NoDestinations` when the route has no destinations at
    /// all. Routes built through the validating factory always have at
    /// least one, so this guards reload races and hand-rolled callers.
    pub fn select(&self, route: &Route) -> Result<String, GatewayError> {
        let destinations = route.destinations();
        if destinations.is_empty() {
            return Err(GatewayError::failure(
                codes::LOAD_BALANCER_NO_DESTINATIONS,
                format!("route {:?} has no destinations", route.route_id()),
            ));
        }

        let healthy: Vec<&String> = destinations
            .iter()
            .filter(|destination| self.monitor.is_marked_healthy(destination))
            .collect();

        // Fall back to the full list when nothing is marked healthy.
        let candidates: Vec<&String> = if healthy.is_empty() {
            debug!(
                "no healthy destination for route {:?}, falling back to full list",
                route.route_id()
            );
            destinations.iter().collect()
        } else {
            healthy
        };

        let index = match route.policy().load_balancing {
            LoadBalancingStrategy::RoundRobin => self.round_robin_index(route.route_id(), &candidates),
            LoadBalancingStrategy::WeightedRoundRobin => {
                // Declared but not implemented; behaves as round robin.
                debug!(
                    "weighted_round_robin not implemented for route {:?}, using round_robin",
                    route.route_id()
                );
                self.round_robin_index(route.route_id(), &candidates)
            }
            LoadBalancingStrategy::LeastConnections => self.least_connections_index(&candidates),
            LoadBalancingStrategy::Random => rand::thread_rng().gen_range(0..candidates.len()),
            LoadBalancingStrategy::PowerOfTwoChoices => self.power_of_two_index(&candidates),
        };

        let selected = candidates[index].clone();
        self.connection(&selected).increment();
        Ok(selected)
    }

    /// Selects the route's first destination, bypassing the policy
    /// strategy and the health filter. Used when load balancing is
    /// disabled gateway-wide; the gauge is still incremented so completion
    /// accounting stays uniform.
    pub fn select_primary(&self, route: &Route) -> Result<String, GatewayError> {
        let destination = route.destinations().first().cloned().ok_or_else(|| {
            GatewayError::failure(
                codes::LOAD_BALANCER_NO_DESTINATIONS,
                format!("route {:?} has no destinations", route.route_id()),
            )
        })?;
        self.connection(&destination).increment();
        Ok(destination)
    }

    /// Decrements the destination's gauge, clamped at zero.
    pub fn record_completion(&self, destination: &str) {
        self.connection(destination).decrement();
    }

    /// Current active-request gauge for a destination.
    pub fn active_connections(&self, destination: &str) -> u64 {
        self.connection(destination).get()
    }

    /// Per-route rotating index. The modulo is taken against the candidate
    /// list observed in this call, so the index stays in range even when a
    /// concurrent reload shrinks the list.
    fn round_robin_index(&self, route_id: &str, candidates: &[&String]) -> usize {
        let counter = self.rr_counter(route_id);
        counter.fetch_add(1, Ordering::Relaxed) % candidates.len()
    }

    /// Minimal gauge wins; the first occurrence takes ties.
    fn least_connections_index(&self, candidates: &[&String]) -> usize {
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, destination)| self.active_connections(destination))
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    /// Samples two indices with replacement and keeps the less loaded one;
    /// ties go to the first pick.
    fn power_of_two_index(&self, candidates: &[&String]) -> usize {
        let mut rng = rand::thread_rng();
        let first = rng.gen_range(0..candidates.len());
        let second = rng.gen_range(0..candidates.len());
        if self.active_connections(candidates[second])
            < self.active_connections(candidates[first])
        {
            second
        } else {
            first
        }
    }

    fn rr_counter(&self, route_id: &str) -> Arc<AtomicUsize> {
        if let Some(counter) = self.round_robin.read().unwrap().get(route_id) {
            return counter.clone();
        }
        self.round_robin
            .write()
            .unwrap()
            .entry(route_id.to_string())
            .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
            .clone()
    }

    fn connection(&self, destination: &str) -> Arc<ConnectionCounter> {
        if let Some(counter) = self.connections.read().unwrap().get(destination) {
            return counter.clone();
        }
        self.connections
            .write()
            .unwrap()
            .entry(destination.to_string())
            .or_insert_with(|| Arc::new(ConnectionCounter::new()))
            .clone()
    }
}
