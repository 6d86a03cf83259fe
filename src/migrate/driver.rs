//! Migration run: list, copy each object with retries, report

use crate::error::{MigrateError, Result};
use crate::migrate::copier::{copy_one, TransferOutcome};
use crate::migrate::lister::{list_objects, survey, ListingSummary};
use crate::migrate::progress::{ProgressReporter, RunSummary};
use crate::migrate::retry::RetryPolicy;
use crate::storage::{ObjectDescriptor, ObjectSink, ObjectSource};
use futures::TryStreamExt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Knobs for a run
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    /// Attempt budget and backoff, shared by listing pages and objects
    pub retry: RetryPolicy,
    /// Upper bound for opening and for uploading, per attempt
    pub attempt_timeout: Option<Duration>,
    /// Objects in flight at once
    pub workers: usize,
    pub page_size: u32,
    pub checkpoint_interval: u64,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            attempt_timeout: None,
            workers: 1,
            page_size: 1000,
            checkpoint_interval: 1000,
        }
    }
}

/// Terminal state of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectResult {
    Copied { attempts: u32 },
    Abandoned { attempts: u32 },
}

pub struct MigrationDriver<S, D> {
    source: S,
    dest: D,
    settings: MigrationSettings,
    reporter: ProgressReporter,
}

impl<S, D> MigrationDriver<S, D>
where
    S: ObjectSource,
    D: ObjectSink,
{
    pub fn new(source: S, dest: D, settings: MigrationSettings) -> Self {
        let reporter = ProgressReporter::new(settings.checkpoint_interval);
        Self {
            source,
            dest,
            settings,
            reporter,
        }
    }

    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    pub fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    /// Copy every listed object, then return the run totals.
    ///
    /// Objects that exhaust their attempts are skipped; only a listing
    /// failure ends the run early.
    pub async fn run(&self) -> Result<RunSummary> {
        let workers = self.settings.workers.max(1);
        info!(
            dest_bucket = self.dest.bucket(),
            workers,
            max_attempts = self.settings.retry.max_attempts,
            "starting migration"
        );

        let result = list_objects(&self.source, self.settings.page_size, &self.settings.retry)
            .try_for_each_concurrent(workers, |object| async move {
                self.migrate_object(&object).await;
                Ok::<(), MigrateError>(())
            })
            .await;

        if let Err(e) = result {
            let partial = self.reporter.summary();
            error!(
                total_copied = partial.total_copied,
                abandoned = partial.abandoned,
                "migration aborted: {}",
                e
            );
            return Err(e);
        }

        Ok(self.reporter.finish())
    }

    /// Drive one object to a terminal state.
    pub async fn migrate_object(&self, object: &ObjectDescriptor) -> ObjectResult {
        let policy = &self.settings.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut failures = 0u32;

        loop {
            let (phase, error) =
                match copy_one(&self.source, &self.dest, object, self.settings.attempt_timeout).await {
                    TransferOutcome::Success(timing) => {
                        self.reporter.record_success(object, timing);
                        return ObjectResult::Copied {
                            attempts: failures + 1,
                        };
                    }
                    TransferOutcome::DownloadFailed(e) => ("download", e),
                    TransferOutcome::UploadFailed(e) => ("upload", e),
                };

            failures += 1;
            if failures >= max_attempts {
                self.reporter.record_abandoned(object, failures, &error);
                return ObjectResult::Abandoned { attempts: failures };
            }

            let backoff = policy.backoff(failures);
            warn!(
                key = %object.key,
                attempt = failures,
                phase,
                error = %error,
                backoff_ms = backoff.as_millis() as u64,
                "copy attempt failed, retrying"
            );
            sleep(backoff).await;
        }
    }

    /// List the source without copying; used for dry runs.
    pub async fn survey(&self) -> Result<ListingSummary> {
        let summary = survey(&self.source, self.settings.page_size, &self.settings.retry).await?;
        info!(objects = summary.objects, bytes = summary.bytes, "source listing complete");
        Ok(summary)
    }
}
