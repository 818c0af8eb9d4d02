//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Buckets are per client address; see [`ClientIpKeyExtractor`] for how the
//! address is chosen behind reverse proxies.
//!
//! - `auth_rate_limiter`: login and sign-up (~10/min per IP)
//! - `checkout_rate_limiter`: payment intent creation and confirmation (~30/min per IP)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Key extractor for the client address.
///
/// Keys on the socket peer unless `trusted_hops` reverse proxies sit in front
/// of the server. Each trusted proxy appends the address it saw to
/// `X-Forwarded-For`, so the client is the entry `trusted_hops` from the right;
/// anything further left was sent by the client and is ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientIpKeyExtractor {
    trusted_hops: usize,
}

impl ClientIpKeyExtractor {
    /// Extractor for a server behind `trusted_hops` reverse proxies.
    #[must_use]
    pub const fn new(trusted_hops: usize) -> Self {
        Self { trusted_hops }
    }

    fn forwarded_client<T>(&self, req: &Request<T>) -> Option<IpAddr> {
        let hops: Vec<&str> = req
            .headers()
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .collect();

        let index = hops.len().checked_sub(self.trusted_hops)?;
        hops.get(index)?.parse().ok()
    }
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        if self.trusted_hops > 0 {
            if let Some(ip) = self.forwarded_client(req) {
                return Ok(ip);
            }

            if let Some(ip) = req
                .headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
            {
                return Ok(ip);
            }
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(
    key: ClientIpKeyExtractor,
    replenish_every_secs: u64,
    burst: u32,
) -> Option<RateLimiterLayer> {
    GovernorConfigBuilder::default()
        .key_extractor(key)
        .per_second(replenish_every_secs)
        .burst_size(burst)
        .finish()
        .map(|config| GovernorLayer::new(Arc::new(config)))
}

/// Create rate limiter for auth endpoints: ~10 requests per minute per IP.
///
/// 1 token every 6 seconds, burst of 5. Slows password guessing.
///
/// # Panics
///
/// Does not panic: `per_second(6)` and `burst_size(5)` are both non-zero,
/// which is all `GovernorConfigBuilder::finish` checks.
#[must_use]
pub fn auth_rate_limiter(key: ClientIpKeyExtractor) -> RateLimiterLayer {
    limiter(key, 6, 5).expect("non-zero rate limiter parameters are valid")
}

/// Create rate limiter for checkout endpoints: ~30 requests per minute per IP.
///
/// 1 token every 2 seconds, burst of 10. Each token may cost a round trip to
/// the payment provider.
///
/// # Panics
///
/// Does not panic: both parameters are non-zero.
#[must_use]
pub fn checkout_rate_limiter(key: ClientIpKeyExtractor) -> RateLimiterLayer {
    limiter(key, 2, 10).expect("non-zero rate limiter parameters are valid")
}
