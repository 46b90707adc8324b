//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Join rate limit across all clients
pub const JOIN_RATE_LIMIT: u32 = 50;

/// Throttles new players entering the game
#[derive(Clone)]
pub struct JoinLimiter {
    limiter: Arc<Limiter>,
}

impl JoinLimiter {
    pub fn new(per_second: u32) -> Self {
        Self {
            limiter: create_limiter(per_second),
        }
    }

    /// Returns true if a join is allowed right now
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for JoinLimiter {
    fn default() -> Self {
        Self::new(JOIN_RATE_LIMIT)
    }
}
