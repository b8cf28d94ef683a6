//! Localized chart projections over the local observation cache.

use std::collections::HashMap;

use indexmap::map::Entry;
use indexmap::IndexMap;
use records_core::concepts::{ENGLISH_LOCALE, KNOWN_CHART_UUID};
use records_core::{ChartQuery, LocalizedObservation, ObservationSource, RecordsConfig};
use serde_json::Value;

/// Most recent observation per concept, in first-seen concept order.
pub type LatestByConcept = IndexMap<String, LocalizedObservation>;

/// Read-only queries producing display-ready chart rows.
///
/// A store that cannot be read yields empty results: an unsynced cache is
/// a normal state, not a fault.
pub struct ChartHelper<S> {
    source: S,
    chart_uuid: String,
    default_locale: String,
}

impl<S: ObservationSource> ChartHelper<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            chart_uuid: KNOWN_CHART_UUID.to_string(),
            default_locale: ENGLISH_LOCALE.to_string(),
        }
    }

    pub fn with_config(source: S, config: &RecordsConfig) -> Self {
        Self {
            source,
            chart_uuid: config.chart_uuid.clone(),
            default_locale: config.default_locale.clone(),
        }
    }

    /// Locale to use when the caller has no preference.
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Every observation for a patient, laid out by chart group.
    pub fn list_all(&self, patient_uuid: &str, locale: &str) -> Vec<LocalizedObservation> {
        let query = ChartQuery::Chart {
            chart_uuid: self.chart_uuid.clone(),
            patient_uuid: patient_uuid.to_string(),
            locale: locale.to_string(),
        };
        self.rows(&query)
            .into_iter()
            .filter_map(|row| parse_row(&row, RowShape::Grouped))
            .collect()
    }

    /// Latest observation for each concept the patient has, without groups.
    pub fn most_recent_per_concept(&self, patient_uuid: &str, locale: &str) -> LatestByConcept {
        let query = ChartQuery::PatientObservations {
            patient_uuid: patient_uuid.to_string(),
            locale: locale.to_string(),
        };
        let rows = self.rows(&query);
        latest_by_concept(
            rows.iter()
                .filter_map(|row| parse_row(row, RowShape::Ungrouped)),
        )
    }

    /// [`Self::most_recent_per_concept`] for several patients at once.
    /// Unknown patients map to an empty result.
    pub fn most_recent_per_concept_batch<I, P>(
        &self,
        patient_uuids: I,
        locale: &str,
    ) -> HashMap<String, LatestByConcept>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        patient_uuids
            .into_iter()
            .map(|uuid| {
                let uuid = uuid.as_ref();
                (uuid.to_string(), self.most_recent_per_concept(uuid, locale))
            })
            .collect()
    }

    /// Chart layout for rendering before any data exists. Every row has
    /// time 0 and `""` for both values.
    pub fn empty_chart(&self, locale: &str) -> Vec<LocalizedObservation> {
        let query = ChartQuery::EmptyChart {
            chart_uuid: self.chart_uuid.clone(),
            locale: locale.to_string(),
        };
        self.rows(&query)
            .into_iter()
            .filter_map(|row| parse_row(&row, RowShape::Layout))
            .collect()
    }

    /// Time of the patient's latest observation, if any.
    pub fn latest_encounter_time_millis(&self, patient_uuid: &str) -> Option<i64> {
        let query = ChartQuery::PatientObservations {
            patient_uuid: patient_uuid.to_string(),
            locale: self.default_locale.clone(),
        };
        self.rows(&query)
            .into_iter()
            .filter_map(|row| parse_row(&row, RowShape::Ungrouped))
            .map(|obs| obs.encounter_time_millis)
            .max()
    }

    fn rows(&self, query: &ChartQuery) -> Vec<Value> {
        match self.source.query_observations(query) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(?query, "local chart unavailable: {err}");
                Vec::new()
            }
        }
    }
}

/// Keep the latest observation per concept. On equal times the one seen
/// last wins, since rows arrive in chronological order.
pub fn latest_by_concept<I>(observations: I) -> LatestByConcept
where
    I: IntoIterator<Item = LocalizedObservation>,
{
    let mut latest = LatestByConcept::new();
    for obs in observations {
        match latest.entry(obs.concept_uuid.clone()) {
            Entry::Occupied(mut entry) => {
                if obs.encounter_time_millis >= entry.get().encounter_time_millis {
                    *entry.get_mut() = obs;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(obs);
            }
        }
    }
    latest
}

#[derive(Clone, Copy)]
enum RowShape {
    Grouped,
    Ungrouped,
    Layout,
}

fn parse_row(row: &Value, shape: RowShape) -> Option<LocalizedObservation> {
    let Some(concept_uuid) = row
        .get("concept_uuid")
        .and_then(Value::as_str)
        .filter(|uuid| !uuid.trim().is_empty())
    else {
        tracing::warn!("skipping chart row without concept_uuid: {row}");
        return None;
    };

    let text = |column: &str| row.get(column).and_then(Value::as_str).map(str::to_string);

    let group_name = match shape {
        RowShape::Ungrouped => String::new(),
        RowShape::Grouped | RowShape::Layout => text("group_name").unwrap_or_default(),
    };
    let (encounter_time_millis, value, localized_value) = match shape {
        RowShape::Layout => (0, Some(String::new()), Some(String::new())),
        RowShape::Grouped | RowShape::Ungrouped => (
            row.get("encounter_time_millis")
                .and_then(Value::as_i64)
                .unwrap_or_default(),
            text("value"),
            text("localized_value"),
        ),
    };

    Some(LocalizedObservation {
        id: row.get("_id").and_then(Value::as_i64).unwrap_or_default(),
        encounter_time_millis,
        group_name,
        concept_uuid: concept_uuid.to_string(),
        concept_name: text("concept_name").unwrap_or_else(|| concept_uuid.to_string()),
        value,
        localized_value,
    })
}
