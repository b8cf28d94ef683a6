use std::time::{Duration, Instant};

use records_core::{
    BatchResult, ChangeNotifier, ChangeSubject, FetchError, PatientStore, RecordsConfig,
    RemotePatientSource, StorageError,
};

use crate::plan::{plan_merge, SyncStats};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("fetching remote patients failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("updating local store failed: {0}")]
    Storage(#[from] StorageError),
    #[error("a reconciliation pass is already running")]
    AlreadyRunning,
}

/// Outcome of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub stats: SyncStats,
    pub applied: BatchResult,
    pub elapsed: Duration,
}

/// Runs fetch-diff-apply passes that keep the local patient table in line
/// with the remote source. Only one pass runs at a time per store, however
/// many reconcilers share it.
pub struct Reconciler<R, S, N> {
    remote: R,
    store: S,
    notifier: N,
    fetch_timeout: Duration,
}

impl<R, S, N> Reconciler<R, S, N>
where
    R: RemotePatientSource,
    S: PatientStore,
    N: ChangeNotifier,
{
    pub fn new(remote: R, store: S, notifier: N, config: &RecordsConfig) -> Self {
        Self {
            remote,
            store,
            notifier,
            fetch_timeout: config.fetch_timeout(),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one reconciliation pass.
    ///
    /// Nothing is written unless the fetch completed in time. The batch is
    /// applied atomically, so a failed pass leaves the store unchanged and
    /// can simply be retried.
    pub fn sync(&self) -> Result<SyncReport, SyncError> {
        let Some(_pass) = self.store.begin_pass() else {
            tracing::warn!("patient synchronization already running for this store");
            return Err(SyncError::AlreadyRunning);
        };

        let started = Instant::now();
        tracing::info!("beginning patient synchronization");

        let result = self.run_pass(started);
        match &result {
            Ok(report) => tracing::info!(
                inserts = report.stats.inserts,
                updates = report.stats.updates,
                deletes = report.stats.deletes,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "patient synchronization complete"
            ),
            Err(err) => tracing::error!("patient synchronization failed: {err}"),
        }
        result
    }

    fn run_pass(&self, started: Instant) -> Result<SyncReport, SyncError> {
        let remote = self.remote.fetch_patients(self.fetch_timeout)?;
        if started.elapsed() > self.fetch_timeout {
            return Err(FetchError::Timeout(self.fetch_timeout).into());
        }

        tracing::debug!("fetching local entries for merge");
        let local = self.store.read_all_patients()?;
        tracing::debug!(
            local = local.len(),
            remote = remote.len(),
            "computing merge solution"
        );

        let plan = plan_merge(&local, remote);
        tracing::debug!(
            operations = plan.operations.len(),
            "merge solution ready, applying batch"
        );
        let applied = self.store.apply_batch(&plan.operations)?;
        self.notifier.notify_change(ChangeSubject::Patients);

        Ok(SyncReport {
            stats: plan.stats,
            applied,
            elapsed: started.elapsed(),
        })
    }
}
