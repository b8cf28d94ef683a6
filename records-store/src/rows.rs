//! Localized observation rows as served to the chart layer.

use records_core::ConceptType;
use serde_json::{json, Value};

use crate::snapshot::{ChartLayout, StoreSnapshot, StoredObservation};

/// A patient's observations laid out group by group, concept by concept,
/// oldest first within a concept.
pub(crate) fn chart_rows(
    data: &StoreSnapshot,
    chart: &ChartLayout,
    patient_uuid: &str,
    locale: &str,
) -> Vec<Value> {
    let mut patient_obs: Vec<(usize, &StoredObservation)> = data
        .observations
        .iter()
        .enumerate()
        .filter(|(_, obs)| obs.patient_uuid == patient_uuid)
        .collect();
    patient_obs.sort_by_key(|(_, obs)| obs.time_millis);

    let mut rows = Vec::new();
    for group in &chart.groups {
        let group_name = data.concepts.name_or_uuid(&group.concept_uuid, locale);
        for concept_uuid in &group.concepts {
            for (index, obs) in patient_obs
                .iter()
                .filter(|(_, obs)| &obs.concept_uuid == concept_uuid)
            {
                rows.push(observation_row(data, *index, obs, &group_name, locale));
            }
        }
    }
    rows
}

/// Every observation for the patient in stored order, without groups.
pub(crate) fn patient_rows(data: &StoreSnapshot, patient_uuid: &str, locale: &str) -> Vec<Value> {
    data.observations
        .iter()
        .enumerate()
        .filter(|(_, obs)| obs.patient_uuid == patient_uuid)
        .map(|(index, obs)| observation_row(data, index, obs, "", locale))
        .collect()
}

/// The chart skeleton: one row per concept in layout order, time 0 and
/// blank values.
pub(crate) fn empty_chart_rows(data: &StoreSnapshot, chart: &ChartLayout, locale: &str) -> Vec<Value> {
    let mut rows = Vec::new();
    for group in &chart.groups {
        let group_name = data.concepts.name_or_uuid(&group.concept_uuid, locale);
        for concept_uuid in &group.concepts {
            let id = rows.len() as i64 + 1;
            rows.push(json!({
                "_id": id,
                "encounter_time_millis": 0,
                "group_name": group_name,
                "concept_uuid": concept_uuid,
                "concept_name": data.concepts.name_or_uuid(concept_uuid, locale),
                "value": "",
                "localized_value": "",
            }));
        }
    }
    rows
}

fn observation_row(
    data: &StoreSnapshot,
    index: usize,
    obs: &StoredObservation,
    group_name: &str,
    locale: &str,
) -> Value {
    json!({
        "_id": index as i64 + 1,
        "encounter_time_millis": obs.time_millis,
        "group_name": group_name,
        "concept_uuid": obs.concept_uuid,
        "concept_name": data.concepts.name_or_uuid(&obs.concept_uuid, locale),
        "value": obs.value,
        "localized_value": localized_value(data, obs, locale),
    })
}

fn localized_value(data: &StoreSnapshot, obs: &StoredObservation, locale: &str) -> Option<String> {
    let raw = obs.value.as_deref()?;
    match obs.concept_type.parse::<ConceptType>() {
        Ok(ConceptType::Coded) | Ok(ConceptType::Boolean) => Some(
            data.concepts
                .lookup(raw, locale)
                .map(str::to_string)
                .or_else(|| obs.value_name.clone())
                .unwrap_or_else(|| raw.to_string()),
        ),
        _ => Some(raw.to_string()),
    }
}
