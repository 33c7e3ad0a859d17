//! Time utilities for the broadcast loop

use std::time::{Duration, Instant};

/// Default position broadcast rate
pub const DEFAULT_BROADCAST_HZ: u32 = 60;

/// Fastest broadcast rate the scheduler supports (1 ms period)
pub const MAX_BROADCAST_HZ: u32 = 1_000;

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Period between two ticks of a loop running at `hz`, clamped to
/// `1..=MAX_BROADCAST_HZ` so the period is never zero
pub fn tick_duration(hz: u32) -> Duration {
    Duration::from_micros(1_000_000 / hz.clamp(1, MAX_BROADCAST_HZ) as u64)
}
