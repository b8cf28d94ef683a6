//! Interfaces to the collaborators around the core: the remote patient
//! feed, the local store and change observers.

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FetchError, StorageResult};
use crate::patient::{BatchOperation, BatchResult, LocalPatient, RemotePatient};

/// Source of the complete, authoritative patient list.
pub trait RemotePatientSource {
    /// Fetch every patient. Implementations should give up after `timeout`.
    fn fetch_patients(&self, timeout: Duration) -> Result<Vec<RemotePatient>, FetchError>;
}

/// Local patient table. `apply_batch` is its only mutation entry point.
pub trait PatientStore {
    fn read_all_patients(&self) -> StorageResult<Vec<LocalPatient>>;

    /// Apply every operation or none of them.
    fn apply_batch(&self, operations: &[BatchOperation]) -> StorageResult<BatchResult>;

    /// Claim the store for one read-diff-apply pass. `None` means another
    /// pass over the same store is in flight. Handles sharing the
    /// underlying table must share the claim.
    fn begin_pass(&self) -> Option<PassGuard<'_>>;
}

/// Held for the length of a reconciliation pass; dropping it releases the
/// store.
#[derive(Debug)]
pub struct PassGuard<'a> {
    _held: MutexGuard<'a, ()>,
}

impl<'a> PassGuard<'a> {
    /// Take `lock` without waiting, or `None` when it is already held.
    pub fn try_acquire(lock: &'a Mutex<()>) -> Option<Self> {
        let held = match lock.try_lock() {
            Ok(held) => held,
            // A panicked pass never applied a partial batch.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(Self { _held: held })
    }
}

/// Which localized observation rows to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartQuery {
    /// A patient's observations laid out by the chart's groups.
    Chart {
        chart_uuid: String,
        patient_uuid: String,
        locale: String,
    },
    /// Every observation for a patient in stored order, ungrouped.
    PatientObservations { patient_uuid: String, locale: String },
    /// Chart layout only, no values.
    EmptyChart { chart_uuid: String, locale: String },
}

/// Read side of the local observation cache.
///
/// Rows are JSON objects with `_id`, `encounter_time_millis`,
/// `group_name`, `concept_uuid`, `concept_name`, `value` and
/// `localized_value`.
pub trait ObservationSource {
    fn query_observations(&self, query: &ChartQuery) -> StorageResult<Vec<Value>>;
}

/// What changed in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSubject {
    Patients,
    Observations,
}

/// Fire-and-forget notification of store changes.
pub trait ChangeNotifier {
    fn notify_change(&self, subject: ChangeSubject);
}

impl<T: RemotePatientSource + ?Sized> RemotePatientSource for &T {
    fn fetch_patients(&self, timeout: Duration) -> Result<Vec<RemotePatient>, FetchError> {
        (**self).fetch_patients(timeout)
    }
}

impl<T: PatientStore + ?Sized> PatientStore for &T {
    fn read_all_patients(&self) -> StorageResult<Vec<LocalPatient>> {
        (**self).read_all_patients()
    }

    fn apply_batch(&self, operations: &[BatchOperation]) -> StorageResult<BatchResult> {
        (**self).apply_batch(operations)
    }

    fn begin_pass(&self) -> Option<PassGuard<'_>> {
        (**self).begin_pass()
    }
}

impl<T: ObservationSource + ?Sized> ObservationSource for &T {
    fn query_observations(&self, query: &ChartQuery) -> StorageResult<Vec<Value>> {
        (**self).query_observations(query)
    }
}

impl<T: ChangeNotifier + ?Sized> ChangeNotifier for &T {
    fn notify_change(&self, subject: ChangeSubject) {
        (**self).notify_change(subject)
    }
}
