//! Rate Limiting Middleware using GCRA Algorithm
//!
//! Throttles sensor ingestion per peer IP using tower_governor.
//! A misbehaving device (or a stuck retry loop) cannot flood the sheet.

use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;

use crate::error::ServerError;

/// Governor config keyed by peer IP, with X-RateLimit-* headers
pub type DefaultGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Seconds it takes to replenish one request
    pub per_second: u64,
    /// Burst size (max requests that can be made immediately)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // ESP32 firmware posts every few seconds
        Self {
            per_second: 1,
            burst_size: 10,
        }
    }
}

/// Create a rate limiting governor config
///
/// Requires the service to be served with
/// `into_make_service_with_connect_info::<SocketAddr>()` for IP extraction.
pub fn create_governor_config(
    config: &RateLimitConfig,
) -> Result<Arc<DefaultGovernorConfig>, ServerError> {
    GovernorConfigBuilder::default()
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()
        .finish()
        .map(Arc::new)
        .ok_or_else(|| {
            ServerError::RateLimit(format!(
                "period and burst must be non-zero (got {}s, {})",
                config.per_second, config.burst_size
            ))
        })
}
