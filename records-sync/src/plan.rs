use indexmap::IndexMap;
use records_core::{BatchOperation, LocalPatient, RemotePatient};
use serde::{Deserialize, Serialize};

/// Work counted while computing a merge.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStats {
    /// Local rows examined.
    pub entries: usize,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl SyncStats {
    pub fn operations(&self) -> usize {
        self.inserts + self.updates + self.deletes
    }
}

/// Operations that bring the local table in line with the remote list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    pub operations: Vec<BatchOperation>,
    pub stats: SyncStats,
}

impl MergePlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Diff the local patient rows against a freshly fetched remote list.
///
/// Matched rows whose fields differ are updated with the remote values,
/// local rows missing upstream are deleted and unmatched remote patients
/// are inserted. When the remote list repeats a business id, the last
/// entry wins.
pub fn plan_merge(local: &[LocalPatient], remote: Vec<RemotePatient>) -> MergePlan {
    // Matched entries are taken out of their slot; what is left over at the
    // end gets inserted.
    let mut remote_by_id: IndexMap<String, Option<RemotePatient>> = IndexMap::new();
    for patient in remote {
        remote_by_id.insert(patient.id.clone(), Some(patient));
    }

    let mut plan = MergePlan::default();
    for row in local {
        plan.stats.entries += 1;

        match remote_by_id.get_mut(&row.patient_id).and_then(Option::take) {
            Some(patient) if patient.fields != row.fields => {
                tracing::debug!(id = row.id, patient_id = %row.patient_id, "scheduling update");
                plan.operations.push(BatchOperation::Update {
                    id: row.id,
                    fields: patient.fields,
                });
                plan.stats.updates += 1;
            }
            Some(_) => {
                tracing::trace!(id = row.id, "no action required");
            }
            None => {
                tracing::debug!(id = row.id, patient_id = %row.patient_id, "scheduling delete");
                plan.operations.push(BatchOperation::Delete { id: row.id });
                plan.stats.deletes += 1;
            }
        }
    }

    let unmatched = remote_by_id
        .into_iter()
        .filter_map(|(patient_id, patient)| Some((patient_id, patient?)));
    for (patient_id, patient) in unmatched {
        tracing::debug!(%patient_id, "scheduling insert");
        plan.operations.push(BatchOperation::Insert {
            patient_id,
            fields: patient.fields,
        });
        plan.stats.inserts += 1;
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use records_core::PatientFields;

    fn fields(status: &str) -> PatientFields {
        PatientFields {
            given_name: Some("Fatmata".into()),
            family_name: Some("Sesay".into()),
            uuid: Some(format!("uuid-{status}")),
            status: Some(status.into()),
            admission_timestamp: Some(1_416_528_000),
        }
    }

    fn local(id: i64, patient_id: &str, status: &str) -> LocalPatient {
        LocalPatient {
            id,
            patient_id: patient_id.into(),
            fields: fields(status),
        }
    }

    fn remote(patient_id: &str, status: &str) -> RemotePatient {
        RemotePatient {
            id: patient_id.into(),
            fields: fields(status),
        }
    }

    #[test]
    fn changed_row_is_updated_and_new_row_inserted() {
        let mut changed = remote("P1", "active");
        changed.fields.status = Some("discharged".into());

        let plan = plan_merge(
            &[local(1, "P1", "active")],
            vec![changed.clone(), remote("P2", "active")],
        );

        assert_eq!(
            plan.operations,
            vec![
                BatchOperation::Update {
                    id: 1,
                    fields: changed.fields,
                },
                BatchOperation::Insert {
                    patient_id: "P2".into(),
                    fields: fields("active"),
                },
            ]
        );
        assert_eq!(
            plan.stats,
            SyncStats {
                entries: 1,
                inserts: 1,
                updates: 1,
                deletes: 0
            }
        );
    }

    #[test]
    fn empty_remote_deletes_everything() {
        let plan = plan_merge(&[local(5, "P9", "active")], Vec::new());
        assert_eq!(plan.operations, vec![BatchOperation::Delete { id: 5 }]);
        assert_eq!(plan.stats.operations(), 1);
    }

    #[test]
    fn empty_local_inserts_everything() {
        let plan = plan_merge(&[], vec![remote("P1", "a"), remote("P2", "b")]);
        assert_eq!(plan.stats.inserts, 2);
        assert_eq!(plan.stats.entries, 0);
    }

    #[test]
    fn identical_pair_schedules_nothing() {
        let plan = plan_merge(&[local(3, "P3", "active")], vec![remote("P3", "active")]);
        assert!(plan.is_empty());
        assert_eq!(plan.stats.entries, 1);
    }

    #[test]
    fn admission_time_is_compared_exactly() {
        let mut nudged = remote("P3", "active");
        nudged.fields.admission_timestamp = Some(1_416_528_001);
        let plan = plan_merge(&[local(3, "P3", "active")], vec![nudged]);
        assert_eq!(plan.stats.updates, 1);
    }

    #[test]
    fn null_and_value_are_different() {
        let mut cleared = remote("P3", "active");
        cleared.fields.family_name = None;
        let plan = plan_merge(&[local(3, "P3", "active")], vec![cleared]);
        assert_eq!(plan.stats.updates, 1);
    }

    #[test]
    fn second_local_row_for_a_business_id_is_deleted() {
        let plan = plan_merge(
            &[local(1, "P1", "active"), local(2, "P1", "active")],
            vec![remote("P1", "active")],
        );
        assert_eq!(plan.operations, vec![BatchOperation::Delete { id: 2 }]);
    }

    #[test]
    fn large_ward_diff_is_complete_and_ordered() {
        let local_rows: Vec<_> = (0..20_000)
            .map(|n| local(n + 1, &format!("P{n}"), "active"))
            .collect();
        let remote_rows: Vec<_> = (10_000..30_000)
            .map(|n| {
                let status = if n % 4 == 0 { "discharged" } else { "active" };
                remote(&format!("P{n}"), status)
            })
            .collect();

        let plan = plan_merge(&local_rows, remote_rows);

        assert_eq!(plan.stats.deletes, 10_000);
        assert_eq!(plan.stats.updates, 2_500);
        assert_eq!(plan.stats.inserts, 10_000);
        assert_eq!(
            plan.operations.last(),
            Some(&BatchOperation::Insert {
                patient_id: "P29999".into(),
                fields: fields("active"),
            })
        );
    }

    #[test]
    fn repeated_remote_id_keeps_the_last_entry() {
        let plan = plan_merge(&[], vec![remote("P1", "first"), remote("P1", "second")]);
        assert_eq!(
            plan.operations,
            vec![BatchOperation::Insert {
                patient_id: "P1".into(),
                fields: fields("second"),
            }]
        );
    }
}
