//! Patient snapshots on both sides of a reconciliation pass.

use serde::{Deserialize, Serialize};

/// Fields compared and copied during reconciliation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientFields {
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Admission time in seconds since the epoch. Compared exactly.
    #[serde(default)]
    pub admission_timestamp: Option<i64>,
}

/// A patient row owned by the local store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalPatient {
    /// Surrogate row key assigned by the store.
    pub id: i64,
    /// Stable business identifier shared with the remote source.
    pub patient_id: String,
    #[serde(flatten)]
    pub fields: PatientFields,
}

/// A patient as reported by the authoritative remote source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemotePatient {
    /// Business identifier.
    pub id: String,
    #[serde(flatten)]
    pub fields: PatientFields,
}

/// One scheduled write against the local patient table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchOperation {
    Insert {
        patient_id: String,
        fields: PatientFields,
    },
    Update {
        id: i64,
        fields: PatientFields,
    },
    Delete {
        id: i64,
    },
}

/// Row counts touched by an applied batch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchResult {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}
