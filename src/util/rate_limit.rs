//! Inbound frame throttling for a single connection

use std::num::NonZeroU32;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

/// Default cap on inbound frames per second per connection
pub const INPUT_RATE_LIMIT: u32 = 120;

/// Token bucket over one connection's inbound frames.
///
/// Owned by the connection's reader task, so it needs no sharing.
pub struct FrameRateLimiter {
    bucket: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    dropped: u64,
}

impl FrameRateLimiter {
    /// Allow `frames_per_second` frames, bursting up to the same amount.
    /// A zero rate still lets one frame per second through.
    pub fn new(frames_per_second: u32) -> Self {
        let rate = NonZeroU32::new(frames_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            bucket: RateLimiter::direct(Quota::per_second(rate)),
            dropped: 0,
        }
    }

    /// Take a token for the next frame. False means drop it.
    pub fn admit(&mut self) -> bool {
        let admitted = self.bucket.check().is_ok();
        if !admitted {
            self.dropped += 1;
        }
        admitted
    }

    /// Frames refused so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
