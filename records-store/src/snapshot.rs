//! Serializable shape of the whole local store.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use records_core::concepts::ENGLISH_LOCALE;
use records_core::{LocalPatient, Observation, StorageResult};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

/// An observation row as persisted: raw columns, type tag unchecked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredObservation {
    pub patient_uuid: String,
    pub time_millis: i64,
    pub concept_uuid: String,
    pub concept_type: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub value_name: Option<String>,
}

impl StoredObservation {
    pub fn from_observation(patient_uuid: impl Into<String>, observation: &Observation) -> Self {
        Self {
            patient_uuid: patient_uuid.into(),
            time_millis: observation.time.timestamp_millis(),
            concept_uuid: observation.concept_uuid.clone(),
            concept_type: observation
                .concept_type
                .map(|concept_type| concept_type.as_tag().to_string())
                .unwrap_or_default(),
            value: observation.value.clone(),
            value_name: observation.value_name.clone(),
        }
    }
}

/// One section of a chart: a group concept and the concepts shown in it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChartGroup {
    pub concept_uuid: String,
    pub concepts: Vec<String>,
}

/// Declared chart layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChartLayout {
    pub uuid: String,
    pub groups: Vec<ChartGroup>,
}

/// Localized names keyed by concept UUID, then by locale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ConceptDictionary(BTreeMap<String, BTreeMap<String, String>>);

impl ConceptDictionary {
    pub fn insert(
        &mut self,
        concept_uuid: impl Into<String>,
        locale: impl Into<String>,
        name: impl Into<String>,
    ) {
        self.0
            .entry(concept_uuid.into())
            .or_default()
            .insert(locale.into(), name.into());
    }

    /// Name in `locale`, falling back to English.
    pub fn lookup(&self, concept_uuid: &str, locale: &str) -> Option<&str> {
        let names = self.0.get(concept_uuid)?;
        names
            .get(locale)
            .or_else(|| names.get(ENGLISH_LOCALE))
            .map(String::as_str)
    }

    /// Name in `locale`, English, or the UUID itself.
    pub fn name_or_uuid(&self, concept_uuid: &str, locale: &str) -> String {
        self.lookup(concept_uuid, locale)
            .unwrap_or(concept_uuid)
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub patients: Vec<LocalPatient>,
    #[serde(default)]
    pub observations: Vec<StoredObservation>,
    #[serde(default)]
    pub charts: Vec<ChartLayout>,
    #[serde(default)]
    pub concepts: ConceptDictionary,
}

impl StoreSnapshot {
    pub fn from_json_file(path: &Path) -> StorageResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Replace the file at `path` with this snapshot.
    ///
    /// The JSON goes to a temporary file in the same directory, which is
    /// synced and then renamed over `path`. A failed write leaves the old
    /// file untouched.
    pub fn write_json_file(&self, path: &Path) -> StorageResult<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir)?;
        self.write_json(staged.as_file_mut())?;
        staged.as_file().sync_all()?;
        staged.persist(path).map_err(|err| err.error)?;
        Ok(())
    }

    /// Serialize as pretty JSON. Buffered bytes are flushed before
    /// returning so that write errors are reported.
    pub fn write_json<W: Write>(&self, writer: W) -> StorageResult<()> {
        let mut writer = BufWriter::new(writer);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn chart(&self, chart_uuid: &str) -> Option<&ChartLayout> {
        self.charts.iter().find(|chart| chart.uuid == chart_uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_falls_back_to_english_then_uuid() {
        let mut concepts = ConceptDictionary::default();
        concepts.insert("5088", "en", "Temperature");
        concepts.insert("5088", "fr", "Température");

        assert_eq!(concepts.lookup("5088", "fr"), Some("Température"));
        assert_eq!(concepts.lookup("5088", "es"), Some("Temperature"));
        assert_eq!(concepts.name_or_uuid("5087", "fr"), "5087");
    }
}
