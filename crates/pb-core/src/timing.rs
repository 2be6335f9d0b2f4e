//! Lightweight performance timing utilities.
//!
//! Synthesis runs inside the control tick, so its cost is worth watching.
//! Timing is off unless enabled programmatically or through the
//! `PB_TIMING` environment variable.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable performance timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Disable performance timing globally.
pub fn disable_timing() {
    ENABLED.store(false, Ordering::Relaxed);
}

/// Check if timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("PB_TIMING").is_ok()
}

/// A simple timer that measures elapsed time.
pub struct Timer {
    label: &'static str,
    start: Instant,
    enabled: bool,
}

impl Timer {
    /// Create and start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
            enabled: is_enabled(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Stop the timer and return elapsed time in seconds.
    /// If timing is disabled, returns None.
    pub fn stop(self) -> Option<f64> {
        if self.enabled {
            Some(self.start.elapsed().as_secs_f64())
        } else {
            None
        }
    }

    /// Stop the timer and fold the elapsed time into an accumulator.
    pub fn stop_into(self, acc: &AccumulatingTimer) -> Option<f64> {
        let elapsed = self.stop();
        if let Some(dt) = elapsed {
            acc.record(dt);
        }
        elapsed
    }
}

/// Accumulating timer for tracking total time across multiple calls.
pub struct AccumulatingTimer {
    total_ns: AtomicU64,
    count: AtomicU64,
}

impl Default for AccumulatingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatingTimer {
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a timing measurement.
    pub fn record(&self, duration_s: f64) {
        let nanos = (duration_s * 1e9) as u64;
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total time spent (in seconds).
    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    /// Get number of calls.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get average time per call (in seconds).
    pub fn average_seconds(&self) -> f64 {
        let count = self.count();
        if count > 0 {
            self.total_seconds() / count as f64
        } else {
            0.0
        }
    }

    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Accumulators for the stages of one LQR synthesis.
pub mod synthesis_timing {
    use super::AccumulatingTimer;

    /// Finite-difference linearization of the plant
    pub static LINEARIZE: AccumulatingTimer = AccumulatingTimer::new();
    /// Riccati solve (Hamiltonian build + invariant subspace)
    pub static CARE: AccumulatingTimer = AccumulatingTimer::new();
    /// Gain assembly and closed-loop check
    pub static GAIN: AccumulatingTimer = AccumulatingTimer::new();

    pub fn reset_all() {
        LINEARIZE.reset();
        CARE.reset();
        GAIN.reset();
    }

    /// Print synthesis timing summary.
    pub fn print_summary() {
        use super::is_enabled;
        if !is_enabled() {
            return;
        }

        println!("\n=== Synthesis Breakdown ===");
        for (label, timer) in [
            ("linearize", &LINEARIZE),
            ("care", &CARE),
            ("gain", &GAIN),
        ] {
            let count = timer.count();
            if count > 0 {
                println!(
                    "{:<10} {} calls, {:.3}s total, {:.4}ms avg",
                    label,
                    count,
                    timer.total_seconds(),
                    timer.average_seconds() * 1000.0
                );
            }
        }
        println!("===========================\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulating_timer_average() {
        let acc = AccumulatingTimer::new();
        assert_eq!(acc.average_seconds(), 0.0);
        acc.record(0.002);
        acc.record(0.004);
        assert_eq!(acc.count(), 2);
        assert!((acc.average_seconds() - 0.003).abs() < 1e-9);
        acc.reset();
        assert_eq!(acc.count(), 0);
    }

    #[test]
    fn enabled_timer_records_into_accumulator() {
        enable_timing();
        let acc = AccumulatingTimer::new();
        let timer = Timer::start("probe");
        assert_eq!(timer.label(), "probe");
        assert!(timer.stop_into(&acc).is_some());
        assert_eq!(acc.count(), 1);
        disable_timing();
    }
}
