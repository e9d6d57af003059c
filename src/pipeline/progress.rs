//! Throughput estimation for long-running extraction jobs.

use std::collections::VecDeque;
use std::time::Duration;

/// Bounded running average over `(elapsed, items processed)` samples.
///
/// The observer thread feeds one sample per tick; keeping a window rather
/// than a global average lets the estimate track the current image mix
/// instead of being dragged by an unrepresentative start. The window is
/// large enough that single slow images do not dominate.
pub struct ThroughputWindow {
    samples: VecDeque<(Duration, usize)>,
    total_time: Duration,
    total_items: usize,
    capacity: usize,
}

/// Window size used by the pipeline's progress observer.
pub const PROGRESS_WINDOW: usize = 100;

impl ThroughputWindow {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            total_time: Duration::ZERO,
            total_items: 0,
            capacity,
        }
    }

    /// Record that `items` finished during `elapsed`.
    ///
    /// Ticks where nothing finished are skipped by the caller so an idle
    /// stretch does not flush the window.
    pub fn record(&mut self, elapsed: Duration, items: usize) {
        self.samples.push_back((elapsed, items));
        self.total_time += elapsed;
        self.total_items += items;
        if self.samples.len() > self.capacity {
            if let Some((time, count)) = self.samples.pop_front() {
                self.total_time -= time;
                self.total_items -= count;
            }
        }
    }

    /// Average milliseconds per item over the window, if any items landed.
    #[must_use]
    pub fn ms_per_item(&self) -> Option<f64> {
        if self.total_items == 0 {
            return None;
        }
        Some(self.total_time.as_secs_f64() * 1000.0 / self.total_items as f64)
    }

    /// Estimated time to process `remaining` more items.
    #[must_use]
    pub fn eta(&self, remaining: usize) -> Option<Duration> {
        let ms = self.ms_per_item()?;
        Some(Duration::from_secs_f64(ms * remaining as f64 / 1000.0))
    }
}

/// A progress snapshot handed to the observer callback.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// Images claimed so far.
    pub processed: usize,
    /// Total images in the run.
    pub total: usize,
    /// Current throughput estimate, if enough samples landed.
    pub ms_per_item: Option<f64>,
    /// Estimated remaining time, if a throughput estimate exists.
    pub eta: Option<Duration>,
}
