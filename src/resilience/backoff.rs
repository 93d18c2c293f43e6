//! Exponential backoff with optional jitter.

use std::time::Duration;
use rand::Rng;

/// Calculate the wait before retry `attempt` (1-based).
///
/// The delay is `base * multiplier^(attempt - 1)`, capped at `max`. When
/// `jitter_ratio` is positive, up to that fraction of the delay is added at
/// random, still never exceeding `max`.
pub fn calculate_backoff(
    attempt: u32,
    base: Duration,
    max: Duration,
    multiplier: f64,
    jitter_ratio: f64,
) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let factor = multiplier.max(1.0).powi(exponent);
    let raw_ms = base.as_millis() as f64 * factor;
    let max_ms = max.as_millis() as f64;
    let capped_ms = if raw_ms.is_finite() { raw_ms.min(max_ms) } else { max_ms };

    let jitter_ms = if jitter_ratio > 0.0 && capped_ms >= 1.0 {
        let range = capped_ms * jitter_ratio.min(1.0);
        rand::thread_rng().gen_range(0.0..=range)
    } else {
        0.0
    };

    Duration::from_millis((capped_ms + jitter_ms).min(max_ms) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_millis(1000);

    #[test]
    fn test_backoff_growth() {
        assert_eq!(calculate_backoff(1, BASE, MAX, 2.0, 0.0), Duration::from_millis(100));
        assert_eq!(calculate_backoff(2, BASE, MAX, 2.0, 0.0), Duration::from_millis(200));
        assert_eq!(calculate_backoff(3, BASE, MAX, 2.0, 0.0), Duration::from_millis(400));
        assert_eq!(calculate_backoff(3, BASE, MAX, 3.0, 0.0), Duration::from_millis(900));
    }

    #[test]
    fn test_backoff_capped() {
        assert_eq!(calculate_backoff(10, BASE, MAX, 2.0, 0.0), MAX);
        assert_eq!(calculate_backoff(u32::MAX, BASE, MAX, 2.0, 0.0), MAX);
        assert_eq!(calculate_backoff(0, BASE, MAX, 2.0, 0.0), Duration::ZERO);
    }

    #[test]
    fn test_jitter_stays_under_cap() {
        for _ in 0..50 {
            let d = calculate_backoff(2, BASE, MAX, 2.0, 0.5);
            assert!(d >= Duration::from_millis(200));
            assert!(d <= Duration::from_millis(300));

            let capped = calculate_backoff(8, BASE, MAX, 2.0, 0.5);
            assert_eq!(capped, MAX);
        }
    }
}
