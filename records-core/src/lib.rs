//! Core types for the offline patient record cache: typed observation
//! values and their ordering, display-ready chart rows, patient snapshots
//! and the interfaces the sync and chart layers work through.

pub mod concepts;
pub mod config;
pub mod error;
pub mod observation;
pub mod patient;
pub mod store;
pub mod value;

pub use config::{RecordsConfig, RecordsConfigOverrides};
pub use error::{
    FetchError, RecordsError, RecordsResult, StorageError, StorageResult, ValueParseError,
};
pub use observation::{most_severe, total_order, LocalizedObservation, Observation};
pub use patient::{BatchOperation, BatchResult, LocalPatient, PatientFields, RemotePatient};
pub use store::{
    ChangeNotifier, ChangeSubject, ChartQuery, ObservationSource, PassGuard, PatientStore,
    RemotePatientSource,
};
pub use value::{classify, ConceptType, ObsPoint, ObsValue};
