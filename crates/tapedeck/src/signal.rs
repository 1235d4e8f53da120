//! Run-scoped signals shared between the test driver and the recorder.
//!
//! Two flags describe the outside world: whether the automation driver came
//! up, and whether the test run is still going. The driving side holds the
//! writable half; the recording session only ever reads, and only by
//! polling. There are no callbacks or wakeups here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Writable half, held by whoever drives the test run.
#[derive(Debug, Clone)]
pub struct RunSignals {
    driver_ready: Arc<AtomicBool>,
    run_alive: Arc<AtomicBool>,
}

/// Read-only view handed to the recording session.
#[derive(Debug, Clone)]
pub struct RunObserver {
    driver_ready: Arc<AtomicBool>,
    run_alive: Arc<AtomicBool>,
}

impl RunSignals {
    /// A fresh run: driver not yet up, run in progress.
    pub fn new() -> Self {
        Self {
            driver_ready: Arc::new(AtomicBool::new(false)),
            run_alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// The automation driver finished booting. Set once, never cleared.
    pub fn mark_driver_ready(&self) {
        self.driver_ready.store(true, Ordering::Relaxed);
    }

    /// The test run has ended, for whatever reason.
    pub fn finish_run(&self) {
        self.run_alive.store(false, Ordering::Relaxed);
    }

    pub fn observer(&self) -> RunObserver {
        RunObserver {
            driver_ready: self.driver_ready.clone(),
            run_alive: self.run_alive.clone(),
        }
    }
}

impl Default for RunSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl RunObserver {
    pub fn driver_ready(&self) -> bool {
        self.driver_ready.load(Ordering::Relaxed)
    }

    pub fn run_alive(&self) -> bool {
        self.run_alive.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_signals_mean_run_started_driver_pending() {
        let signals = RunSignals::new();
        let observer = signals.observer();
        assert!(!observer.driver_ready());
        assert!(observer.run_alive());
    }

    #[test]
    fn observer_sees_writer_updates() {
        let signals = RunSignals::new();
        let observer = signals.observer();

        signals.mark_driver_ready();
        assert!(observer.driver_ready());

        signals.finish_run();
        assert!(!observer.run_alive());
    }

    #[test]
    fn observers_share_one_set_of_flags() {
        let signals = RunSignals::new();
        let first = signals.observer();
        let second = signals.observer();

        signals.mark_driver_ready();
        assert!(first.driver_ready());
        assert!(second.driver_ready());
    }
}
