//! Run counters and progress output

use crate::migrate::copier::TransferTiming;
use crate::migrate::size::format_size;
use crate::s3::S3Error;
use crate::storage::ObjectDescriptor;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Counters for the whole run
#[derive(Debug, Default)]
pub struct RunTally {
    total_copied: AtomicU64,
    abandoned: AtomicU64,
    bytes_copied: AtomicU64,
}

impl RunTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a successful copy, returning the new total
    pub fn record_copied(&self, bytes: u64) -> u64 {
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
        self.total_copied.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_abandoned(&self) -> u64 {
        self.abandoned.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn total_copied(&self) -> u64 {
        self.total_copied.load(Ordering::Relaxed)
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    pub fn bytes_copied(&self) -> u64 {
        self.bytes_copied.load(Ordering::Relaxed)
    }
}

/// One line of per-object output
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub timing: TransferTiming,
    /// Time since the run started
    pub elapsed: Duration,
}

impl fmt::Display for ObjectSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) download {:.3}s, upload {:.3}s, total {:.3}s, elapsed {:.1}s",
            self.key,
            format_size(self.size),
            self.timing.download.as_secs_f64(),
            self.timing.upload.as_secs_f64(),
            self.timing.total().as_secs_f64(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub total_copied: u64,
    pub abandoned: u64,
    pub bytes_copied: u64,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "All files copied: {} object(s), {} in {:.1}s",
            self.total_copied,
            format_size(self.bytes_copied),
            self.elapsed.as_secs_f64()
        )?;
        if self.abandoned > 0 {
            write!(f, ", {} abandoned", self.abandoned)?;
        }
        Ok(())
    }
}

/// Emits progress lines and owns the run tally
#[derive(Debug)]
pub struct ProgressReporter {
    tally: RunTally,
    started: Instant,
    checkpoint_interval: u64,
    checkpoints: AtomicU64,
}

impl ProgressReporter {
    /// `checkpoint_interval` of 0 disables checkpoint lines
    pub fn new(checkpoint_interval: u64) -> Self {
        Self {
            tally: RunTally::new(),
            started: Instant::now(),
            checkpoint_interval,
            checkpoints: AtomicU64::new(0),
        }
    }

    pub fn tally(&self) -> &RunTally {
        &self.tally
    }

    /// Checkpoint lines emitted so far
    pub fn checkpoints(&self) -> u64 {
        self.checkpoints.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn record_success(&self, object: &ObjectDescriptor, timing: TransferTiming) -> ObjectSummary {
        let total = self.tally.record_copied(object.size);
        let summary = ObjectSummary {
            key: object.key.clone(),
            size: object.size,
            timing,
            elapsed: self.elapsed(),
        };
        info!("copy success: {}", summary);

        if self.checkpoint_interval > 0 && total % self.checkpoint_interval == 0 {
            self.checkpoints.fetch_add(1, Ordering::Relaxed);
            info!(
                total_copied = total,
                bytes = %format_size(self.tally.bytes_copied()),
                elapsed_secs = summary.elapsed.as_secs(),
                "checkpoint: {} objects copied",
                total
            );
        }
        summary
    }

    pub fn record_abandoned(&self, object: &ObjectDescriptor, attempts: u32, last_error: &S3Error) {
        self.tally.record_abandoned();
        warn!(
            key = %object.key,
            size = object.size,
            attempts,
            error = %last_error,
            "giving up on object"
        );
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total_copied: self.tally.total_copied(),
            abandoned: self.tally.abandoned(),
            bytes_copied: self.tally.bytes_copied(),
            elapsed: self.elapsed(),
        }
    }

    /// Log and return the final summary
    pub fn finish(&self) -> RunSummary {
        let summary = self.summary();
        info!("{}", summary);
        summary
    }
}
