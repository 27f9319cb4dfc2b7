//! Delay strategies between retry attempts.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Highest multiplier drawn by [`BackOff::Random`].
pub const RANDOM_FACTOR_MAX: u64 = 10;

/// How the base delay grows with the number of attempts already made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackOff {
    /// Same delay every retry.
    #[default]
    Static,
    /// `attempt * delay`.
    Linear,
    /// `attempt^attempt * delay`, saturating.
    Exponential,
    /// `delay * k` with `k` drawn uniformly from `1..=10` per retry.
    Random,
}

impl BackOff {
    /// Sleep before the retry that follows `attempt` completed attempts.
    ///
    /// `attempt` is at least 1 whenever a retry is possible. Results that do
    /// not fit in a [`Duration`] saturate.
    pub fn delay(&self, attempt: u32, base: Duration) -> Duration {
        if base.is_zero() {
            return Duration::ZERO;
        }

        let factor = match self {
            BackOff::Static => 1,
            BackOff::Linear => u64::from(attempt),
            BackOff::Exponential => {
                let n = u64::from(attempt);
                n.checked_pow(attempt).unwrap_or(u64::MAX)
            }
            BackOff::Random => rand::thread_rng().gen_range(1..=RANDOM_FACTOR_MAX),
        };
        scale(base, factor)
    }
}

impl std::fmt::Display for BackOff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackOff::Static => "static",
            BackOff::Linear => "linear",
            BackOff::Exponential => "exponential",
            BackOff::Random => "random",
        };
        f.write_str(name)
    }
}

fn scale(base: Duration, factor: u64) -> Duration {
    let nanos = base.as_nanos().saturating_mul(u128::from(factor));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(100);

    #[test]
    fn test_static_delay() {
        for attempt in 1..5 {
            assert_eq!(BackOff::Static.delay(attempt, BASE), BASE);
        }
    }

    #[test]
    fn test_linear_delay() {
        assert_eq!(BackOff::Linear.delay(1, BASE), Duration::from_millis(100));
        assert_eq!(BackOff::Linear.delay(3, BASE), Duration::from_millis(300));
    }

    #[test]
    fn test_exponential_delay() {
        assert_eq!(BackOff::Exponential.delay(1, BASE), Duration::from_millis(100));
        assert_eq!(BackOff::Exponential.delay(2, BASE), Duration::from_millis(400));
        assert_eq!(BackOff::Exponential.delay(3, BASE), Duration::from_millis(2_700));
    }

    #[test]
    fn test_exponential_saturates() {
        let delay = BackOff::Exponential.delay(40, Duration::from_secs(1));
        assert_eq!(delay, Duration::from_nanos(u64::MAX));
    }

    #[test]
    fn test_random_within_bounds() {
        for _ in 0..200 {
            let delay = BackOff::Random.delay(2, BASE);
            assert!(delay >= BASE);
            assert!(delay <= BASE * RANDOM_FACTOR_MAX as u32);
            assert_eq!(delay.as_millis() % 100, 0);
        }
    }

    #[test]
    fn test_zero_base_is_zero() {
        assert_eq!(BackOff::Exponential.delay(5, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&BackOff::Exponential).unwrap();
        assert_eq!(json, "\"exponential\"");
        let parsed: BackOff = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(parsed, BackOff::Random);
    }
}
