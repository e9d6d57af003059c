//! Parallel, order-preserving descriptor extraction.
//!
//! The pipeline applies one [`DescriptorGenerator`] to every image in a
//! file list with up to `T` computations in flight and writes each declared
//! output stream to a property file **in file-list order**, regardless of
//! completion order. The moving parts:
//!
//! - a monotonic atomic cursor workers claim indices from,
//! - a shared error flag sampled between images (cooperative cancel),
//! - one [`OrderedSink`] reorder buffer per output stream,
//! - a sampling observer estimating throughput and ETA.
//!
//! Record `i` of every output file equals what a single-threaded run would
//! have produced for image `i`; this is what lets feature ids double as
//! file-list indices downstream.

mod progress;
mod reorder;

pub use progress::{PROGRESS_WINDOW, Progress, ThroughputWindow};
pub use reorder::OrderedSink;

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::descriptor::{DescriptorGenerator, StreamWriter};
use crate::{Result, RetrievalError};

/// Callback invoked by the progress observer.
pub type ProgressFn = Box<dyn Fn(Progress) + Send + Sync>;

/// Extraction run over a file list.
pub struct Pipeline<'a> {
    generator: &'a dyn DescriptorGenerator,
    files: &'a [PathBuf],
    sinks: Vec<OrderedSink>,
    progress_interval: Duration,
    progress_fn: Option<ProgressFn>,
}

/// Summary of a completed extraction run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineReport {
    /// Images processed (equals the file-list length on success).
    pub images: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline with no sinks attached yet.
    pub fn new(generator: &'a dyn DescriptorGenerator, files: &'a [PathBuf]) -> Self {
        Self {
            generator,
            files,
            sinks: Vec::new(),
            progress_interval: Duration::from_secs(3),
            progress_fn: None,
        }
    }

    /// Create a pipeline with one sink per declared stream, writing to
    /// `<prefix><stream name>`.
    ///
    /// This is the standard wiring: a generator declaring `features` and
    /// `numfeatures` with prefix `/data/shog.` produces
    /// `/data/shog.features` and `/data/shog.numfeatures`.
    pub fn with_output_prefix(
        generator: &'a dyn DescriptorGenerator,
        files: &'a [PathBuf],
        prefix: impl AsRef<Path>,
    ) -> Result<Self> {
        let mut pipeline = Self::new(generator, files);
        let prefix = prefix.as_ref();
        for stream in generator.schema() {
            let mut path = prefix.as_os_str().to_owned();
            path.push(stream.name);
            let writer = StreamWriter::create(stream.kind, PathBuf::from(path))?;
            pipeline.add_sink(OrderedSink::new(stream.name, writer));
        }
        Ok(pipeline)
    }

    /// Attach an ordered sink for one output stream.
    pub fn add_sink(&mut self, sink: OrderedSink) -> &mut Self {
        self.sinks.push(sink);
        self
    }

    /// How often the observer samples the cursor (default 3s).
    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Install a callback receiving each progress snapshot.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressFn) -> Self {
        self.progress_fn = Some(callback);
        self
    }

    /// Run with `threads` workers, blocking until every image is processed
    /// or the first error stops the run.
    ///
    /// On error no partial output is finished: sinks are dropped, the
    /// error that stopped the run is returned. On success all sinks are
    /// drained and their property files finished.
    pub fn run(self, threads: usize) -> Result<PipelineReport> {
        if threads == 0 {
            return Err(RetrievalError::Config(
                "pipeline needs at least one worker thread".to_string(),
            ));
        }

        let started = Instant::now();
        let cursor = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let observer_done = AtomicBool::new(false);
        let first_error: Mutex<Option<RetrievalError>> = Mutex::new(None);

        let generator = self.generator;
        let files = self.files;
        let sinks = &self.sinks;
        let interval = self.progress_interval;
        let progress_fn = self.progress_fn.as_deref();

        info!(
            generator = generator.name(),
            images = files.len(),
            threads,
            streams = sinks.len(),
            "starting descriptor extraction"
        );

        std::thread::scope(|scope| {
            let workers: Vec<_> = (0..threads)
                .map(|_| {
                    scope.spawn(|| {
                        worker(generator, files, sinks, &cursor, &failed, &first_error);
                    })
                })
                .collect();

            // Observer samples the shared cursor; it holds no locks the
            // workers contend on.
            let observer = scope.spawn(|| {
                observe(files.len(), interval, &cursor, &observer_done, progress_fn);
            });

            for handle in workers {
                let _ = handle.join();
            }
            observer_done.store(true, Ordering::SeqCst);
            let _ = observer.join();
        });

        if let Some(error) = first_error
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            return Err(error);
        }

        for sink in self.sinks {
            sink.finish()?;
        }

        let elapsed = started.elapsed();
        info!(images = files.len(), ?elapsed, "descriptor extraction finished");
        Ok(PipelineReport {
            images: files.len(),
            elapsed,
        })
    }
}

fn worker(
    generator: &dyn DescriptorGenerator,
    files: &[PathBuf],
    sinks: &[OrderedSink],
    cursor: &AtomicUsize,
    failed: &AtomicBool,
    first_error: &Mutex<Option<RetrievalError>>,
) {
    loop {
        if failed.load(Ordering::SeqCst) {
            return;
        }
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        if index >= files.len() {
            return;
        }
        let path = &files[index];

        let mut outputs = match generator.compute(path) {
            Ok(outputs) => outputs,
            Err(error) => {
                warn!(path = %path.display(), %error, "descriptor computation failed");
                record_error(failed, first_error, error);
                return;
            }
        };

        for sink in sinks {
            let Some(value) = outputs.remove(sink.name()) else {
                record_error(
                    failed,
                    first_error,
                    RetrievalError::Compute {
                        path: path.clone(),
                        reason: format!("generator produced no '{}' stream", sink.name()),
                    },
                );
                return;
            };
            if let Err(error) = sink.push(index, value) {
                record_error(failed, first_error, error);
                return;
            }
        }
    }
}

fn record_error(
    failed: &AtomicBool,
    first_error: &Mutex<Option<RetrievalError>>,
    error: RetrievalError,
) {
    failed.store(true, Ordering::SeqCst);
    let mut slot = first_error
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    slot.get_or_insert(error);
}

fn observe(
    total: usize,
    interval: Duration,
    cursor: &AtomicUsize,
    done: &AtomicBool,
    callback: Option<&(dyn Fn(Progress) + Send + Sync)>,
) {
    let mut window = ThroughputWindow::new(PROGRESS_WINDOW);
    let mut last_index = 0usize;
    let mut last_tick = Instant::now();

    loop {
        // Sleep in short steps so a finished run is noticed promptly.
        let tick_end = Instant::now() + interval;
        while Instant::now() < tick_end {
            if done.load(Ordering::SeqCst) {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        let index = cursor.load(Ordering::SeqCst).min(total);
        let processed = index.saturating_sub(last_index);
        if processed > 0 {
            window.record(last_tick.elapsed(), processed);
        }
        last_tick = Instant::now();
        last_index = index;

        let snapshot = Progress {
            processed: index,
            total,
            ms_per_item: window.ms_per_item(),
            eta: window.eta(total - index),
        };
        debug!(
            processed = snapshot.processed,
            total = snapshot.total,
            ms_per_item = ?snapshot.ms_per_item,
            eta = ?snapshot.eta,
            "extraction progress"
        );
        if let Some(callback) = callback {
            callback(snapshot);
        }
    }
}
