//! Progress reporting for the bootstrap loop (`progress` feature).
//!
//! Components
//! -----------------
//! * [`IterTimer`] – per-iteration durations smoothed by an **exponential moving average**
//!   (`ema ← α·dt + (1–α)·ema`, `α ∈ (0,1]`; the first tick initializes the average).
//! * [`fmt_dur`] – compact [`Duration`] formatter (`"253µs"`, `"42ms"`, `"3.14s"`).
//! * [`BootstrapProgress`] – an `indicatif` bar counting replicas and failures, with the last
//!   and average replica time in its message.
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec} | ETA {eta_precise} | {msg}";

/// Smoothing factor of the replica timer
const EMA_ALPHA: f64 = 0.2;

pub struct IterTimer {
    last: Instant,
    ema_ns: f64,
    alpha: f64,
    count: u64,
}

impl IterTimer {
    pub fn new(alpha: f64) -> Self {
        Self {
            last: Instant::now(),
            ema_ns: 0.0,
            alpha,
            count: 0,
        }
    }

    #[inline]
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now.duration_since(self.last);
        self.last = now;
        self.count += 1;

        let dt_ns = dt.as_nanos() as f64;
        self.ema_ns = if self.count == 1 {
            dt_ns
        } else {
            self.alpha * dt_ns + (1.0 - self.alpha) * self.ema_ns
        };

        dt
    }

    #[inline]
    pub fn avg(&self) -> Duration {
        if self.count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.ema_ns as u64)
        }
    }
}

#[inline]
pub fn fmt_dur(d: Duration) -> String {
    let us = d.as_micros();
    if us < 1_000 {
        format!("{us}µs")
    } else {
        let ms = d.as_millis();
        if ms < 1_000 {
            format!("{ms}ms")
        } else {
            let s = d.as_secs_f32();
            format!("{s:.2}s")
        }
    }
}

/// Progress bar over the bootstrap replicas.
pub struct BootstrapProgress {
    bar: ProgressBar,
    timer: IterTimer,
    failed: usize,
}

impl BootstrapProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new((total as u64).max(1));
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(200));
        BootstrapProgress {
            bar,
            timer: IterTimer::new(EMA_ALPHA),
            failed: 0,
        }
    }

    /// Record one finished replica
    pub fn replica_done(&mut self, succeeded: bool) {
        if !succeeded {
            self.failed += 1;
        }
        let last = self.timer.tick();
        let avg = self.timer.avg();
        self.bar.set_message(format!(
            "last: {}, avg: {}, failed: {}",
            fmt_dur(last),
            fmt_dur(avg),
            self.failed
        ));
        self.bar.inc(1);
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod progress_bar_test {
    use super::*;

    #[test]
    fn test_fmt_dur_scales() {
        assert_eq!(fmt_dur(Duration::from_micros(253)), "253µs");
        assert_eq!(fmt_dur(Duration::from_millis(42)), "42ms");
        assert_eq!(fmt_dur(Duration::from_millis(3140)), "3.14s");
    }

    #[test]
    fn test_iter_timer_first_tick_initializes_average() {
        let mut timer = IterTimer::new(0.5);
        assert_eq!(timer.avg(), Duration::from_nanos(0));
        let dt = timer.tick();
        let avg = timer.avg();
        assert!(avg.as_nanos().abs_diff(dt.as_nanos()) <= 1);
    }
}
