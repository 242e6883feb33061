//! HTTP route definitions: the proxy catch-all, the gateway's own health
//! endpoints, and the admin control plane.

pub mod admin;
pub mod health;
pub mod proxy;
