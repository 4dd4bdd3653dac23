//! hls-relay: an HLS reverse proxy.
//!
//! Fetches a base64-addressed target with a fixed browser-like header set,
//! rewrites HLS manifests so every reference loops back through `/proxy`,
//! and streams everything else straight through.

pub mod config;
pub mod error;
pub mod hls;
pub mod metrics;
pub mod proxy;
pub mod server;
