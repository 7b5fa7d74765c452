use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Measures samples per second over a trailing wall-clock window.
///
/// Diagnostic only; a stalled device shows up here as a falling rate.
#[derive(Debug)]
pub struct RateMeter {
    window: Duration,
    state: Mutex<RateState>,
}

#[derive(Debug, Default)]
struct RateState {
    since: Option<Instant>,
    arrivals: VecDeque<(Instant, u64)>,
    in_window: u64,
}

impl RateState {
    fn expire(&mut self, now: Instant, window: Duration) {
        while let Some(&(at, count)) = self.arrivals.front() {
            if now.duration_since(at) <= window {
                break;
            }
            self.in_window -= count;
            self.arrivals.pop_front();
        }
    }
}

impl RateMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(RateState::default()),
        }
    }

    /// Start measuring from `now`, forgetting earlier arrivals.
    pub fn restart_at(&self, now: Instant) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = RateState {
            since: Some(now),
            ..Default::default()
        };
    }

    pub fn restart(&self) {
        self.restart_at(Instant::now());
    }

    pub fn record_at(&self, now: Instant, samples: usize) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.since.get_or_insert(now);
        state.arrivals.push_back((now, samples as u64));
        state.in_window += samples as u64;
        state.expire(now, self.window);
    }

    pub fn record(&self, samples: usize) {
        self.record_at(Instant::now(), samples);
    }

    /// Samples per second over `min(window, time since restart)` ending at `now`.
    pub fn rate_at(&self, now: Instant) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.expire(now, self.window);

        let Some(since) = state.since else {
            return 0.0;
        };
        let elapsed = now.saturating_duration_since(since).min(self.window);
        if elapsed.is_zero() {
            return 0.0;
        }
        state.in_window as f64 / elapsed.as_secs_f64()
    }

    pub fn rate(&self) -> f64 {
        self.rate_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_over_partial_window() {
        let meter = RateMeter::new(Duration::from_secs(2));
        let t0 = Instant::now();
        meter.restart_at(t0);

        meter.record_at(t0 + Duration::from_millis(500), 500);
        meter.record_at(t0 + Duration::from_millis(1000), 500);

        let rate = meter.rate_at(t0 + Duration::from_secs(1));
        assert!((rate - 1000.0).abs() < 1e-6, "rate was {rate}");
    }

    #[test]
    fn test_old_arrivals_expire() {
        let meter = RateMeter::new(Duration::from_secs(1));
        let t0 = Instant::now();
        meter.restart_at(t0);

        meter.record_at(t0 + Duration::from_millis(100), 10_000);
        meter.record_at(t0 + Duration::from_millis(2900), 200);

        let rate = meter.rate_at(t0 + Duration::from_secs(3));
        assert!((rate - 200.0).abs() < 1e-6, "rate was {rate}");
    }

    #[test]
    fn test_idle_meter_reports_zero() {
        let meter = RateMeter::new(Duration::from_secs(1));
        assert_eq!(meter.rate(), 0.0);
    }
}
