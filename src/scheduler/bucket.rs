//! Per-bucket runtime state and backoff period computation

use std::time::Duration;

use tokio::time::Instant;

use crate::core::types::{BucketSpec, ChannelSpec};

/// Runtime state of one registered scan bucket
///
/// Created on scan start, mutated on each firing, dropped on stop.
#[derive(Debug, Clone)]
pub(crate) struct BucketState {
    pub spec: BucketSpec,
    /// Channel list resolved from the band or the explicit spec
    pub channels: Vec<ChannelSpec>,
    pub next_due: Instant,
    /// Firings performed so far; drives the backoff exponent
    pub elapsed_steps: u32,
}

impl BucketState {
    /// Register a bucket, due immediately
    pub fn new(spec: BucketSpec, channels: Vec<ChannelSpec>, now: Instant) -> Self {
        Self {
            spec,
            channels,
            next_due: now,
            elapsed_steps: 0,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due <= now
    }

    /// Effective period for the next interval
    ///
    /// Fixed-period buckets always use `period_ms`. Backoff buckets grow as
    /// `period * exponent^(steps / (step_count + 1))`, so the period is held
    /// for `step_count + 1` firings before the exponent is applied again,
    /// and never exceeds `max_period_ms`.
    pub fn current_period_ms(&self) -> u64 {
        let period = self.spec.period_ms;
        match self.spec.backoff {
            None => period,
            Some(backoff) => {
                let exp = self.elapsed_steps / (backoff.step_count + 1);
                let grown = period.saturating_mul(u64::from(backoff.exponent).saturating_pow(exp));
                grown.min(backoff.max_period_ms)
            }
        }
    }

    /// Advance the bucket after one firing
    ///
    /// A period below the achievable scan cadence still schedules the next
    /// firing; the dispatch loop simply fires it as fast as it can.
    pub fn fire(&mut self, now: Instant) {
        let period_ms = self.current_period_ms().max(1);
        self.next_due = now + Duration::from_millis(period_ms);
        if self.spec.backoff.is_some() {
            self.elapsed_steps += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::types::{BackoffParams, Band, ReportPolicy};

    fn spec(period_ms: u64, backoff: Option<BackoffParams>) -> BucketSpec {
        BucketSpec {
            index: 0,
            band: Band::Unspecified,
            channels: vec![ChannelSpec {
                channel_mhz: 2412,
                dwell_time_ms: 20,
                passive: false,
            }],
            period_ms,
            report: ReportPolicy::BufferOnly,
            backoff,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_period_bucket_keeps_cadence() {
        let now = Instant::now();
        let mut bucket = BucketState::new(spec(500, None), vec![], now);
        assert!(bucket.is_due(now));

        bucket.fire(now);
        assert_eq!(bucket.current_period_ms(), 500);
        assert!(!bucket.is_due(now));
        assert!(bucket.is_due(now + Duration::from_millis(500)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_every_step_count_plus_one_firings() {
        let now = Instant::now();
        let mut bucket = BucketState::new(
            spec(
                1000,
                Some(BackoffParams {
                    max_period_ms: 8000,
                    exponent: 2,
                    step_count: 1,
                }),
            ),
            vec![],
            now,
        );

        // period=1000, exponent=2, step_count=1: the period doubles every
        // two firings and is capped at 8000
        let mut periods = Vec::new();
        for _ in 0..9 {
            periods.push(bucket.current_period_ms());
            bucket.fire(now);
        }
        assert_eq!(
            periods,
            vec![1000, 1000, 2000, 2000, 4000, 4000, 8000, 8000, 8000]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_never_exceeds_max_period() {
        let now = Instant::now();
        let mut bucket = BucketState::new(
            spec(
                100,
                Some(BackoffParams {
                    max_period_ms: 1500,
                    exponent: 4,
                    step_count: 0,
                }),
            ),
            vec![],
            now,
        );

        for _ in 0..32 {
            assert!(bucket.current_period_ms() <= 1500);
            bucket.fire(now);
        }
        assert_eq!(bucket.current_period_ms(), 1500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_still_schedules() {
        // Sub-cadence periods fire as fast as possible instead of failing
        let now = Instant::now();
        let mut bucket = BucketState::new(spec(0, None), vec![], now);
        bucket.fire(now);
        assert!(bucket.next_due > now);
        assert!(bucket.is_due(now + Duration::from_millis(1)));
    }
}
