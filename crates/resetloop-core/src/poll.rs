//! Interval polling with an optional time budget.

use std::time::Duration;

use crate::clock::Clock;
use crate::error::{ResetError, Result};
use crate::types::Phase;

/// What to do when a bounded wait runs out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// Log and carry on as if the condition had been met.
    Continue,
    /// Return [`ResetError::WaitTimedOut`].
    Fail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollSpec {
    pub phase: Phase,
    pub interval: Duration,
    pub timeout: Option<Duration>,
    pub on_timeout: TimeoutPolicy,
    /// Sleep one interval before the first check instead of after it.
    pub delay_first: bool,
}

impl PollSpec {
    pub fn unbounded(phase: Phase, interval: Duration) -> Self {
        Self {
            phase,
            interval,
            timeout: None,
            on_timeout: TimeoutPolicy::Fail,
            delay_first: false,
        }
    }

    pub fn timeout(mut self, timeout: Option<Duration>, on_timeout: TimeoutPolicy) -> Self {
        self.timeout = timeout;
        self.on_timeout = on_timeout;
        self
    }

    pub fn delay_first(mut self) -> Self {
        self.delay_first = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Satisfied { elapsed: Duration, attempts: u32 },
    GaveUp { elapsed: Duration, attempts: u32 },
}

impl PollOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            PollOutcome::Satisfied { elapsed, .. } | PollOutcome::GaveUp { elapsed, .. } => *elapsed,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollOutcome::Satisfied { .. })
    }
}

/// Call `check` every `spec.interval` until it returns `Ok(true)`.
///
/// Errors from `check` end the wait immediately. Without a timeout the loop
/// only ends when the condition is met.
pub fn poll_until<C, F>(clock: &C, spec: &PollSpec, mut check: F) -> Result<PollOutcome>
where
    C: Clock + ?Sized,
    F: FnMut() -> Result<bool>,
{
    let start = clock.now();
    let mut attempts = 0u32;
    // Never sleep past the limit, so a bounded wait ends exactly on it.
    let pause = || {
        let step = match spec.timeout {
            Some(limit) => spec.interval.min(limit.saturating_sub(clock.now() - start)),
            None => spec.interval,
        };
        clock.sleep(step);
    };
    loop {
        if spec.delay_first {
            pause();
        }
        attempts = attempts.saturating_add(1);
        if check()? {
            return Ok(PollOutcome::Satisfied {
                elapsed: clock.now() - start,
                attempts,
            });
        }

        let elapsed = clock.now() - start;
        if let Some(limit) = spec.timeout {
            if elapsed >= limit {
                return match spec.on_timeout {
                    TimeoutPolicy::Continue => {
                        tracing::debug!(phase = %spec.phase, attempts, "poll budget spent, continuing");
                        Ok(PollOutcome::GaveUp { elapsed, attempts })
                    }
                    TimeoutPolicy::Fail => Err(ResetError::WaitTimedOut {
                        phase: spec.phase,
                        waited: elapsed,
                    }),
                };
            }
        }

        if !spec.delay_first {
            pause();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn check_first_succeeds_without_sleeping() {
        let clock = ManualClock::new();
        let spec = PollSpec::unbounded(Phase::AwaitBootCompleted, secs(5));
        let outcome = poll_until(&clock, &spec, || Ok(true)).unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Satisfied {
                elapsed: Duration::ZERO,
                attempts: 1
            }
        );
        assert_eq!(clock.total_slept(), Duration::ZERO);
    }

    #[test]
    fn delay_first_sleeps_before_each_check() {
        let clock = ManualClock::new();
        let spec = PollSpec::unbounded(Phase::AwaitReachable, secs(5)).delay_first();
        let mut calls = 0;
        let outcome = poll_until(&clock, &spec, || {
            calls += 1;
            Ok(calls == 3)
        })
        .unwrap();
        assert_eq!(outcome.elapsed(), secs(15));
        assert!(outcome.is_satisfied());
    }

    #[test]
    fn unbounded_wait_keeps_going_past_any_budget() {
        let clock = ManualClock::new();
        let spec = PollSpec::unbounded(Phase::AwaitSetupScreen, secs(5));
        let mut calls = 0;
        let outcome = poll_until(&clock, &spec, || {
            calls += 1;
            Ok(calls > 1_000)
        })
        .unwrap();
        assert_eq!(outcome.elapsed(), secs(5_000));
    }

    #[test]
    fn soft_timeout_gives_up_and_continues() {
        let clock = ManualClock::new();
        let spec = PollSpec::unbounded(Phase::AwaitOffline, secs(2))
            .timeout(Some(secs(60)), TimeoutPolicy::Continue)
            .delay_first();
        let outcome = poll_until(&clock, &spec, || Ok(false)).unwrap();
        assert_eq!(
            outcome,
            PollOutcome::GaveUp {
                elapsed: secs(60),
                attempts: 30
            }
        );
    }

    #[test]
    fn hard_timeout_reports_phase() {
        let clock = ManualClock::new();
        let spec = PollSpec::unbounded(Phase::AwaitBootCompleted, secs(5))
            .timeout(Some(secs(20)), TimeoutPolicy::Fail);
        let err = poll_until(&clock, &spec, || Ok(false)).unwrap_err();
        match err {
            ResetError::WaitTimedOut { phase, waited } => {
                assert_eq!(phase, Phase::AwaitBootCompleted);
                assert_eq!(waited, secs(20));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn last_sleep_is_clamped_to_the_limit() {
        let clock = ManualClock::new();
        let spec = PollSpec::unbounded(Phase::AwaitBootCompleted, secs(7))
            .timeout(Some(secs(10)), TimeoutPolicy::Fail);
        let mut attempts = 0;
        let err = poll_until(&clock, &spec, || {
            attempts += 1;
            Ok(false)
        })
        .unwrap_err();
        match err {
            ResetError::WaitTimedOut { waited, .. } => assert_eq!(waited, secs(10)),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(attempts, 3);
        assert_eq!(clock.elapsed(), secs(10));
    }

    #[test]
    fn delay_first_soft_limit_is_not_overshot() {
        let clock = ManualClock::new();
        let spec = PollSpec::unbounded(Phase::AwaitOffline, secs(7))
            .timeout(Some(secs(10)), TimeoutPolicy::Continue)
            .delay_first();
        let outcome = poll_until(&clock, &spec, || Ok(false)).unwrap();
        assert_eq!(
            outcome,
            PollOutcome::GaveUp {
                elapsed: secs(10),
                attempts: 2
            }
        );
    }

    #[test]
    fn check_errors_stop_the_wait() {
        let clock = ManualClock::new();
        let spec = PollSpec::unbounded(Phase::AwaitReachable, secs(5));
        let err = poll_until(&clock, &spec, || {
            Err(ResetError::BridgeSpawnFailed("adb vanished".into()))
        })
        .unwrap_err();
        assert!(matches!(err, ResetError::BridgeSpawnFailed(_)));
    }
}
