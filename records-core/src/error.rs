use crate::value::ConceptType;

/// General error for building observation and patient records.
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("input is missing required information: {0}")]
    MissingData(String),
    #[error("unknown concept type tag: {0}")]
    UnknownConceptType(String),
    #[error(transparent)]
    ValueParse(#[from] ValueParseError),
    #[error("other error: {0}")]
    Other(String),
}

pub type RecordsResult<T> = std::result::Result<T, RecordsError>;

/// A raw observation value that does not match its declared concept type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot read {raw:?} as {concept_type:?}: {reason}")]
pub struct ValueParseError {
    pub concept_type: ConceptType,
    pub raw: String,
    pub reason: String,
}

/// Failure while fetching the authoritative patient list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("remote source unreachable: {0}")]
    Unreachable(String),
    #[error("malformed remote response: {0}")]
    Malformed(String),
    #[error("remote fetch did not finish within {0:?}")]
    Timeout(std::time::Duration),
}

/// Failure reading or writing the local store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no local row with id {0}")]
    MissingRow(i64),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store snapshot unreadable: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
