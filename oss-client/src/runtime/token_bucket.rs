/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Token bucket used for pacing transfer bandwidth
///
/// One token is one byte. The bucket refills at `rate` tokens per second and holds at most one
/// second worth of tokens. Callers consume tokens after moving data and wait out any resulting
/// debt before moving more, so a single large read is never split but sustained throughput
/// converges to `rate`.
#[derive(Debug)]
pub(crate) struct TokenBucket {
    rate: u64,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    // may go negative while a consumer is in debt
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a new full token bucket refilling at `bytes_per_sec`
    pub(crate) fn new(bytes_per_sec: u64) -> Self {
        let rate = bytes_per_sec.max(1);
        Self {
            rate,
            state: Mutex::new(State {
                tokens: rate as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Consume `n` tokens, returning how long the caller has to wait before the bucket is out
    /// of debt again.
    pub(crate) fn consume(&self, n: u64) -> Duration {
        let mut state = self.state.lock().expect("lock valid");
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.last_refill = now;

        let rate = self.rate as f64;
        state.tokens = (state.tokens + elapsed * rate).min(rate);
        state.tokens -= n as f64;

        if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.tokens / rate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TokenBucket;
    use std::time::Duration;

    #[test]
    fn test_burst_then_debt() {
        let bucket = TokenBucket::new(1000);
        // a full bucket absorbs one second worth of data
        assert_eq!(Duration::ZERO, bucket.consume(1000));

        let wait = bucket.consume(500);
        assert!(wait > Duration::from_millis(400), "{wait:?}");
        assert!(wait <= Duration::from_millis(500), "{wait:?}");
    }

    #[test]
    fn test_zero_rate_clamped() {
        // behaves like one byte per second
        let bucket = TokenBucket::new(0);
        assert_eq!(Duration::ZERO, bucket.consume(1));
        let wait = bucket.consume(1);
        assert!(wait > Duration::from_millis(900), "{wait:?}");
        assert!(wait <= Duration::from_secs(1), "{wait:?}");
    }
}
