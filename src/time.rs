use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// The instant the runtime's monotonic clock started ticking. All deadlines
/// are absolute milliseconds measured from this point.
fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Current monotonic time in milliseconds.
pub(crate) fn now_ms() -> u64 {
    epoch().elapsed().as_millis() as u64
}

/// Current wall-clock time in seconds.
///
/// This is a human-facing clock; it is unrelated to the monotonic clock that
/// drives timers and timeouts.
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
