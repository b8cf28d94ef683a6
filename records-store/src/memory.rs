use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use records_core::{
    BatchOperation, BatchResult, ChartQuery, LocalPatient, Observation, ObservationSource,
    PassGuard, PatientStore, StorageError, StorageResult,
};
use serde_json::Value;

use crate::rows;
use crate::snapshot::{StoreSnapshot, StoredObservation};

/// In-memory local store.
///
/// Readers share a read lock. A patient batch is applied to a copy of the
/// patient table under the write lock and swapped in only when every
/// operation succeeded, so readers see the table before or after a batch
/// and never in between. Clones share the table and the pass claim.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreState>>,
    pass_lock: Arc<Mutex<()>>,
}

#[derive(Debug)]
struct StoreState {
    data: StoreSnapshot,
    /// `None` once the id space is used up.
    next_patient_id: Option<i64>,
}

impl MemoryStore {
    pub fn new(data: StoreSnapshot) -> Self {
        let next_patient_id = data
            .patients
            .iter()
            .map(|p| p.id)
            .max()
            .unwrap_or(0)
            .checked_add(1);
        Self {
            inner: Arc::new(RwLock::new(StoreState {
                data,
                next_patient_id,
            })),
            pass_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn load_json(path: &Path) -> StorageResult<Self> {
        let data = StoreSnapshot::from_json_file(path)?;
        tracing::debug!(
            patients = data.patients.len(),
            observations = data.observations.len(),
            "loaded local store from {}",
            path.display()
        );
        Ok(Self::new(data))
    }

    /// Persist the store. The file is replaced atomically.
    pub fn save_json(&self, path: &Path) -> StorageResult<()> {
        self.read()?.data.write_json_file(path)
    }

    /// Copy of the whole store as it is right now.
    pub fn snapshot(&self) -> StorageResult<StoreSnapshot> {
        Ok(self.read()?.data.clone())
    }

    /// Append observations for one patient.
    pub fn record_observations(
        &self,
        patient_uuid: &str,
        observations: &[Observation],
    ) -> StorageResult<usize> {
        let mut state = self.write()?;
        state.data.observations.extend(
            observations
                .iter()
                .map(|obs| StoredObservation::from_observation(patient_uuid, obs)),
        );
        Ok(observations.len())
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, StoreState>> {
        self.inner
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreSnapshot::default())
    }
}

impl PatientStore for MemoryStore {
    fn read_all_patients(&self) -> StorageResult<Vec<LocalPatient>> {
        Ok(self.read()?.data.patients.clone())
    }

    fn apply_batch(&self, operations: &[BatchOperation]) -> StorageResult<BatchResult> {
        let mut state = self.write()?;
        let mut table = PatientTable::new(&state.data.patients, state.next_patient_id);
        let mut result = BatchResult::default();

        for operation in operations {
            table.apply(operation, &mut result)?;
        }

        state.next_patient_id = table.next_id;
        state.data.patients = table.into_patients();
        Ok(result)
    }

    fn begin_pass(&self) -> Option<PassGuard<'_>> {
        PassGuard::try_acquire(&self.pass_lock)
    }
}

/// Working copy of the patient table for one batch, indexed by surrogate
/// id and by business id. Deleted rows leave a hole until the batch ends.
struct PatientTable {
    rows: Vec<Option<LocalPatient>>,
    slots: HashMap<i64, usize>,
    patient_ids: HashSet<String>,
    next_id: Option<i64>,
}

impl PatientTable {
    fn new(patients: &[LocalPatient], next_id: Option<i64>) -> Self {
        Self {
            rows: patients.iter().cloned().map(Some).collect(),
            slots: patients
                .iter()
                .enumerate()
                .map(|(slot, p)| (p.id, slot))
                .collect(),
            patient_ids: patients.iter().map(|p| p.patient_id.clone()).collect(),
            next_id,
        }
    }

    fn apply(&mut self, operation: &BatchOperation, result: &mut BatchResult) -> StorageResult<()> {
        match operation {
            BatchOperation::Insert { patient_id, fields } => {
                if self.patient_ids.contains(patient_id) {
                    return Err(StorageError::Constraint(format!(
                        "patient_id {patient_id} already exists"
                    )));
                }
                let id = self.next_id.ok_or_else(|| {
                    StorageError::Constraint("local patient ids exhausted".to_string())
                })?;
                self.next_id = id.checked_add(1);
                self.slots.insert(id, self.rows.len());
                self.patient_ids.insert(patient_id.clone());
                self.rows.push(Some(LocalPatient {
                    id,
                    patient_id: patient_id.clone(),
                    fields: fields.clone(),
                }));
                result.inserted += 1;
            }
            BatchOperation::Update { id, fields } => {
                let row = self.row_mut(*id)?;
                row.fields = fields.clone();
                result.updated += 1;
            }
            BatchOperation::Delete { id } => {
                let slot = self.slots.remove(id).ok_or(StorageError::MissingRow(*id))?;
                if let Some(row) = self.rows[slot].take() {
                    self.patient_ids.remove(&row.patient_id);
                }
                result.deleted += 1;
            }
        }
        Ok(())
    }

    fn row_mut(&mut self, id: i64) -> StorageResult<&mut LocalPatient> {
        self.slots
            .get(&id)
            .and_then(|&slot| self.rows[slot].as_mut())
            .ok_or(StorageError::MissingRow(id))
    }

    fn into_patients(self) -> Vec<LocalPatient> {
        self.rows.into_iter().flatten().collect()
    }
}

impl ObservationSource for MemoryStore {
    fn query_observations(&self, query: &ChartQuery) -> StorageResult<Vec<Value>> {
        let state = self.read()?;
        let data = &state.data;

        let rows = match query {
            ChartQuery::Chart {
                chart_uuid,
                patient_uuid,
                locale,
            } => match data.chart(chart_uuid) {
                Some(chart) => rows::chart_rows(data, chart, patient_uuid, locale),
                None => {
                    tracing::debug!("no chart layout {chart_uuid} in local store");
                    Vec::new()
                }
            },
            ChartQuery::PatientObservations {
                patient_uuid,
                locale,
            } => rows::patient_rows(data, patient_uuid, locale),
            ChartQuery::EmptyChart { chart_uuid, locale } => match data.chart(chart_uuid) {
                Some(chart) => rows::empty_chart_rows(data, chart, locale),
                None => {
                    tracing::debug!("no chart layout {chart_uuid} in local store");
                    Vec::new()
                }
            },
        };
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use records_core::PatientFields;

    fn patient(id: i64, patient_id: &str, status: &str) -> LocalPatient {
        LocalPatient {
            id,
            patient_id: patient_id.to_string(),
            fields: PatientFields {
                status: Some(status.to_string()),
                ..PatientFields::default()
            },
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new(StoreSnapshot {
            patients: vec![patient(1, "P1", "active"), patient(4, "P4", "active")],
            ..StoreSnapshot::default()
        })
    }

    #[test]
    fn batch_applies_every_operation() {
        let store = store();
        let result = store
            .apply_batch(&[
                BatchOperation::Update {
                    id: 1,
                    fields: PatientFields {
                        status: Some("discharged".into()),
                        ..PatientFields::default()
                    },
                },
                BatchOperation::Delete { id: 4 },
                BatchOperation::Insert {
                    patient_id: "P2".into(),
                    fields: PatientFields::default(),
                },
            ])
            .unwrap();

        assert_eq!(
            result,
            BatchResult {
                inserted: 1,
                updated: 1,
                deleted: 1
            }
        );
        let patients = store.read_all_patients().unwrap();
        assert_eq!(patients.len(), 2);
        assert_eq!(patients[0].fields.status.as_deref(), Some("discharged"));
        assert_eq!(patients[1].patient_id, "P2");
        assert_eq!(patients[1].id, 5);
    }

    #[test]
    fn failing_operation_leaves_store_untouched() {
        let store = store();
        let before = store.snapshot().unwrap();

        let err = store
            .apply_batch(&[
                BatchOperation::Delete { id: 1 },
                BatchOperation::Insert {
                    patient_id: "P9".into(),
                    fields: PatientFields::default(),
                },
                BatchOperation::Delete { id: 42 },
            ])
            .unwrap_err();

        assert!(matches!(err, StorageError::MissingRow(42)));
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn duplicate_business_id_is_a_constraint_violation() {
        let store = store();
        let err = store
            .apply_batch(&[BatchOperation::Insert {
                patient_id: "P1".into(),
                fields: PatientFields::default(),
            }])
            .unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));
    }

    #[test]
    fn surrogate_ids_are_not_reused() {
        let store = store();
        store.apply_batch(&[BatchOperation::Delete { id: 4 }]).unwrap();
        store
            .apply_batch(&[BatchOperation::Insert {
                patient_id: "P7".into(),
                fields: PatientFields::default(),
            }])
            .unwrap();
        let ids: Vec<i64> = store
            .read_all_patients()
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 5]);
    }

    #[test]
    fn business_id_freed_by_delete_can_be_reinserted() {
        let store = store();
        let result = store
            .apply_batch(&[
                BatchOperation::Delete { id: 4 },
                BatchOperation::Insert {
                    patient_id: "P4".into(),
                    fields: PatientFields::default(),
                },
                BatchOperation::Update {
                    id: 5,
                    fields: PatientFields {
                        status: Some("suspected".into()),
                        ..PatientFields::default()
                    },
                },
            ])
            .unwrap();

        assert_eq!(result.deleted + result.inserted + result.updated, 3);
        let patients = store.read_all_patients().unwrap();
        assert_eq!(patients[1].id, 5);
        assert_eq!(patients[1].patient_id, "P4");
        assert_eq!(patients[1].fields.status.as_deref(), Some("suspected"));
    }

    #[test]
    fn deleted_row_cannot_be_touched_again() {
        let err = store()
            .apply_batch(&[
                BatchOperation::Delete { id: 1 },
                BatchOperation::Update {
                    id: 1,
                    fields: PatientFields::default(),
                },
            ])
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingRow(1)));
    }

    #[test]
    fn large_batch_keeps_table_order() {
        let patients: Vec<_> = (1..=5_000)
            .map(|id| patient(id, &format!("P{id}"), "active"))
            .collect();
        let store = MemoryStore::new(StoreSnapshot {
            patients,
            ..StoreSnapshot::default()
        });
        let operations: Vec<_> = (1..=5_000)
            .filter(|id| id % 2 == 0)
            .map(|id| BatchOperation::Delete { id })
            .collect();

        let result = store.apply_batch(&operations).unwrap();

        assert_eq!(result.deleted, 2_500);
        let ids: Vec<i64> = store
            .read_all_patients()
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, (1..=5_000).step_by(2).collect::<Vec<i64>>());
    }

    #[test]
    fn exhausted_id_space_is_a_constraint_not_a_panic() {
        let store = MemoryStore::new(StoreSnapshot {
            patients: vec![patient(i64::MAX, "P1", "active")],
            ..StoreSnapshot::default()
        });
        let before = store.snapshot().unwrap();

        let err = store
            .apply_batch(&[BatchOperation::Insert {
                patient_id: "P2".into(),
                fields: PatientFields::default(),
            }])
            .unwrap_err();

        assert!(matches!(err, StorageError::Constraint(_)));
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn last_id_below_the_limit_is_still_handed_out() {
        let store = MemoryStore::new(StoreSnapshot {
            patients: vec![patient(i64::MAX - 1, "P1", "active")],
            ..StoreSnapshot::default()
        });
        let insert = |patient_id: &str| BatchOperation::Insert {
            patient_id: patient_id.into(),
            fields: PatientFields::default(),
        };

        store.apply_batch(&[insert("P2")]).unwrap();
        assert_eq!(store.read_all_patients().unwrap()[1].id, i64::MAX);
        assert!(matches!(
            store.apply_batch(&[insert("P3")]),
            Err(StorageError::Constraint(_))
        ));
    }

    #[test]
    fn clones_share_the_pass_claim() {
        let store = store();
        let other = store.clone();
        let held = store.begin_pass();
        assert!(held.is_some());
        assert!(other.begin_pass().is_none());
        drop(held);
        assert!(other.begin_pass().is_some());
    }

    #[test]
    fn readers_never_see_half_a_batch() {
        let store = MemoryStore::new(StoreSnapshot {
            patients: (1..=6)
                .map(|id| patient(id, &format!("P{id}"), "active"))
                .collect(),
            ..StoreSnapshot::default()
        });
        let toggle = |status: &str| -> Vec<BatchOperation> {
            (1..=6)
                .map(|id| BatchOperation::Update {
                    id,
                    fields: PatientFields {
                        status: Some(status.to_string()),
                        ..PatientFields::default()
                    },
                })
                .collect()
        };
        let admitted = store.read_all_patients().unwrap();
        store.apply_batch(&toggle("discharged")).unwrap();
        let discharged = store.read_all_patients().unwrap();
        store.apply_batch(&toggle("active")).unwrap();
        let done = std::sync::atomic::AtomicBool::new(false);

        std::thread::scope(|scope| {
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let mut reads = 0usize;
                        while !done.load(std::sync::atomic::Ordering::Acquire) || reads == 0 {
                            let seen = store.read_all_patients().unwrap();
                            assert!(
                                seen == admitted || seen == discharged,
                                "reader saw a mixed table: {seen:?}"
                            );
                            reads += 1;
                        }
                        reads
                    })
                })
                .collect();

            for round in 0..200 {
                let status = if round % 2 == 0 { "discharged" } else { "active" };
                store.apply_batch(&toggle(status)).unwrap();
            }
            done.store(true, std::sync::atomic::Ordering::Release);

            for reader in readers {
                assert!(reader.join().unwrap() > 0);
            }
        });
    }

    #[test]
    fn unknown_chart_yields_no_rows() {
        let rows = store()
            .query_observations(&ChartQuery::EmptyChart {
                chart_uuid: "missing".into(),
                locale: "en".into(),
            })
            .unwrap();
        assert!(rows.is_empty());
    }
}
