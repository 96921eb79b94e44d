//! Request spacing for devices sharing an address

use std::time::Duration;

use rand::Rng;

/// Cap on how many base delays a request can be pushed back
pub const MAX_DELAY_MULTIPLIER: usize = 5;

/// Jitter applied around the nominal delay (±30%)
pub const JITTER_RATIO: f64 = 0.3;

/// Floor for any non-zero delay, as a fraction of the base
pub const MIN_INTERVAL_RATIO: f64 = 0.5;

/// Delay before the `index`-th request (1-based) to one address
///
/// The first request goes out immediately. Later ones wait
/// `base * min(index - 1, 5)` with ±30% jitter, never less than half of `base`.
pub fn calculate_request_delay(index: usize, base: Duration) -> Duration {
    if index <= 1 {
        return Duration::ZERO;
    }

    let multiplier = (index - 1).min(MAX_DELAY_MULTIPLIER) as f64;
    let nominal = base.as_secs_f64() * multiplier;
    let factor: f64 = rand::rng().random_range(-1.0..=1.0);
    let jittered = nominal + factor * nominal * JITTER_RATIO;

    let floor = base.as_secs_f64() * MIN_INTERVAL_RATIO;
    Duration::from_secs_f64(jittered.max(floor))
}
