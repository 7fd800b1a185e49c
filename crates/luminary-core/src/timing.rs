//! Wall-clock epoch budget and smoothed phase timings.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Weight kept by the running averages on each new sample.
pub const DEFAULT_SMOOTHING: f64 = 0.99;
/// Share of the epoch budget usable for compute, draw, and input polling.
pub const DEFAULT_USABLE_FRACTION: f64 = 0.6;

/// Durations measured inside [`crate::Engine::run_epoch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EpochReport {
    pub epoch: u64,
    /// False while the engine is still initializing.
    pub rendered: bool,
    /// Cells the sink reported as changed on flush.
    pub dirty: usize,
    pub compute: Duration,
    pub draw: Duration,
    pub refresh: Duration,
}

/// Full breakdown of one epoch, including the wait and sleep phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseSample {
    pub compute: Duration,
    pub draw: Duration,
    pub refresh: Duration,
    pub wait: Duration,
    pub sleep: Duration,
    pub total: Duration,
}

/// Fixed epoch duration plus the portion usable before sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochBudget {
    epoch: Duration,
    usable: Duration,
}

impl EpochBudget {
    /// Budget for `base_hz * speedup` epochs per second.
    #[must_use]
    pub fn new(base_hz: u32, speedup: u32, usable_fraction: f64) -> Self {
        let epochs_per_second = u64::from(base_hz.max(1)) * u64::from(speedup.max(1));
        let epoch = Duration::from_micros(1_000_000 / epochs_per_second);
        Self {
            epoch,
            usable: epoch.mul_f64(usable_fraction.clamp(0.0, 1.0)),
        }
    }

    #[must_use]
    pub const fn epoch(&self) -> Duration {
        self.epoch
    }

    #[must_use]
    pub const fn usable(&self) -> Duration {
        self.usable
    }

    /// Time left for input polling, or `None` once the usable share is spent.
    #[must_use]
    pub fn poll_timeout(&self, elapsed: Duration) -> Option<Duration> {
        self.usable
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }

    /// Sleep needed to fill out the epoch; zero on overrun.
    #[must_use]
    pub fn sleep_for(&self, elapsed: Duration) -> Duration {
        self.epoch.saturating_sub(elapsed)
    }
}

/// Exponentially smoothed per-phase averages, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseTimings {
    #[serde(skip)]
    smoothing: f64,
    pub compute_us: f64,
    pub draw_us: f64,
    pub refresh_us: f64,
    pub wait_us: f64,
    pub sleep_us: f64,
    pub total_us: f64,
    pub samples: u64,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING)
    }
}

impl PhaseTimings {
    #[must_use]
    pub const fn new(smoothing: f64) -> Self {
        Self {
            smoothing,
            compute_us: 0.0,
            draw_us: 0.0,
            refresh_us: 0.0,
            wait_us: 0.0,
            sleep_us: 0.0,
            total_us: 0.0,
            samples: 0,
        }
    }

    /// Fold one epoch into the averages.
    pub fn record(&mut self, sample: &PhaseSample) {
        let keep = self.smoothing;
        let blend = |average: &mut f64, value: Duration| {
            *average = keep * *average + (1.0 - keep) * value.as_secs_f64() * 1e6;
        };
        blend(&mut self.compute_us, sample.compute);
        blend(&mut self.draw_us, sample.draw);
        blend(&mut self.refresh_us, sample.refresh);
        blend(&mut self.wait_us, sample.wait);
        blend(&mut self.sleep_us, sample.sleep);
        blend(&mut self.total_us, sample.total);
        self.samples += 1;
    }

    /// Effective epochs per second implied by the smoothed total.
    #[must_use]
    pub fn hz(&self) -> f64 {
        if self.total_us > 0.0 {
            1e6 / self.total_us
        } else {
            0.0
        }
    }
}

/// Paces the epoch loop: polls for input inside the usable budget, then
/// sleeps off the rest of the epoch.
#[derive(Debug, Clone)]
pub struct FrameBudgeter {
    budget: EpochBudget,
    timings: PhaseTimings,
    paced: bool,
}

impl FrameBudgeter {
    #[must_use]
    pub fn new(budget: EpochBudget, smoothing: f64) -> Self {
        Self {
            budget,
            timings: PhaseTimings::new(smoothing),
            paced: true,
        }
    }

    /// A budgeter that never waits or sleeps (headless runs, benchmarks).
    #[must_use]
    pub fn unpaced(budget: EpochBudget, smoothing: f64) -> Self {
        Self {
            paced: false,
            ..Self::new(budget, smoothing)
        }
    }

    #[must_use]
    pub const fn budget(&self) -> &EpochBudget {
        &self.budget
    }

    #[must_use]
    pub const fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    #[must_use]
    pub const fn is_paced(&self) -> bool {
        self.paced
    }

    /// Finish an epoch that began at `started`.
    ///
    /// Rendered epochs hand `poll` whatever remains of the usable budget and
    /// then sleep to the end of the epoch. Initialization epochs run flat out.
    /// Overruns simply skip the wait and the sleep.
    pub fn settle<R>(
        &mut self,
        started: Instant,
        report: &EpochReport,
        poll: impl FnOnce(Duration) -> R,
    ) -> (PhaseSample, Option<R>) {
        let handled_from = Instant::now();
        let mut polled = None;
        let mut sleep = Duration::ZERO;
        if self.paced && report.rendered {
            if let Some(timeout) = self.budget.poll_timeout(started.elapsed()) {
                polled = Some(poll(timeout));
            }
            sleep = self.budget.sleep_for(started.elapsed());
        }
        let wait = handled_from.elapsed();
        if !sleep.is_zero() {
            std::thread::sleep(sleep);
        }
        let sample = PhaseSample {
            compute: report.compute,
            draw: report.draw,
            refresh: report.refresh,
            wait,
            sleep,
            total: started.elapsed(),
        };
        self.timings.record(&sample);
        (sample, polled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_matches_forty_hertz() {
        let budget = EpochBudget::new(10, 4, DEFAULT_USABLE_FRACTION);
        assert_eq!(budget.epoch(), Duration::from_micros(25_000));
        assert_eq!(budget.usable(), Duration::from_micros(15_000));
    }

    #[test]
    fn overrun_yields_no_wait_or_sleep() {
        let budget = EpochBudget::new(10, 4, 0.6);
        assert_eq!(budget.poll_timeout(Duration::from_millis(20)), None);
        assert_eq!(budget.sleep_for(Duration::from_millis(40)), Duration::ZERO);
        assert_eq!(
            budget.poll_timeout(Duration::from_millis(5)),
            Some(Duration::from_millis(10))
        );
        assert_eq!(
            budget.sleep_for(Duration::from_millis(5)),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn smoothing_converges_toward_samples() {
        let mut timings = PhaseTimings::new(0.5);
        let sample = PhaseSample {
            compute: Duration::from_micros(1000),
            total: Duration::from_micros(4000),
            ..PhaseSample::default()
        };
        timings.record(&sample);
        assert!((timings.compute_us - 500.0).abs() < 1e-6);
        for _ in 0..40 {
            timings.record(&sample);
        }
        assert!((timings.compute_us - 1000.0).abs() < 1e-3);
        assert!((timings.hz() - 250.0).abs() < 1e-3);
        assert_eq!(timings.samples, 41);
    }

    #[test]
    fn unpaced_budgeter_never_polls() {
        let mut budgeter = FrameBudgeter::unpaced(EpochBudget::new(10, 4, 0.6), 0.99);
        let report = EpochReport {
            rendered: true,
            ..EpochReport::default()
        };
        let (sample, polled) = budgeter.settle(Instant::now(), &report, |_| ());
        assert!(polled.is_none());
        assert_eq!(sample.sleep, Duration::ZERO);
    }

    #[test]
    fn paced_budgeter_skips_polling_during_initialization() {
        let mut budgeter = FrameBudgeter::new(EpochBudget::new(10, 4, 0.6), 0.99);
        let (sample, polled) = budgeter.settle(Instant::now(), &EpochReport::default(), |_| ());
        assert!(polled.is_none());
        assert_eq!(sample.sleep, Duration::ZERO);

        let report = EpochReport {
            rendered: true,
            ..EpochReport::default()
        };
        let (sample, polled) = budgeter.settle(Instant::now(), &report, |timeout| timeout);
        let timeout = polled.expect("poll runs inside the usable budget");
        assert!(timeout <= budgeter.budget().usable());
        assert!(sample.total >= sample.sleep);
    }
}
