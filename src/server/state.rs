use crate::{config::Config, error::Result, proxy::ProxyService, proxy::upstream::Upstream};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across all handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Proxy pipeline; holds the pooled upstream client
    pub proxy: ProxyService,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState backed by the real HTTP upstream
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_proxy(ProxyService::from_config(config)?))
    }

    /// Create a new AppState with a custom upstream (tests, alternative hosts)
    pub fn with_upstream(config: &Config, upstream: Arc<dyn Upstream>) -> Self {
        Self::with_proxy(ProxyService::new(upstream, config))
    }

    fn with_proxy(proxy: ProxyService) -> Self {
        Self {
            proxy,
            started_at: Instant::now(),
        }
    }
}
