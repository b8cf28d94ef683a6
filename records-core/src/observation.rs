//! Observation records, their canonical ordering and the display-ready form.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::concepts::coded_severity;
use crate::error::{RecordsError, RecordsResult, ValueParseError};
use crate::value::{classify, ConceptType, ObsPoint, ObsValue};

/// One recorded measurement of a concept for a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// When the observation was taken.
    pub time: DateTime<Utc>,
    pub concept_uuid: String,
    /// `None` when the stored type tag was not recognised.
    pub concept_type: Option<ConceptType>,
    /// Raw value: a number or text as a string, or an answer concept UUID.
    pub value: Option<String>,
    /// Name of the answer concept when the value is one.
    pub value_name: Option<String>,
}

impl Observation {
    pub fn new(
        time: DateTime<Utc>,
        concept_uuid: impl Into<String>,
        concept_type: Option<ConceptType>,
        value: Option<String>,
        value_name: Option<String>,
    ) -> RecordsResult<Self> {
        let concept_uuid = concept_uuid.into();
        if concept_uuid.trim().is_empty() {
            return Err(RecordsError::MissingData(
                "observation concept_uuid is empty".to_string(),
            ));
        }
        Ok(Self {
            time,
            concept_uuid,
            concept_type,
            value,
            value_name,
        })
    }

    /// Build from stored columns, keeping unknown type tags as "no type".
    pub fn from_raw(
        millis: i64,
        concept_uuid: impl Into<String>,
        type_tag: &str,
        value: Option<String>,
        value_name: Option<String>,
    ) -> RecordsResult<Self> {
        let time = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| RecordsError::MissingData(format!("invalid time {millis}")))?;
        let concept_type = match type_tag.parse::<ConceptType>() {
            Ok(concept_type) => Some(concept_type),
            Err(err) => {
                tracing::debug!("treating observation value as absent: {err}");
                None
            }
        };
        Self::new(time, concept_uuid, concept_type, value, value_name)
    }

    pub fn obs_value(&self) -> Result<Option<ObsValue>, ValueParseError> {
        classify(
            self.concept_type,
            self.value.as_deref(),
            self.value_name.as_deref(),
        )
    }

    pub fn obs_point(&self) -> Result<Option<ObsPoint>, ValueParseError> {
        Ok(self.obs_value()?.map(|value| ObsPoint {
            time: self.time,
            value,
        }))
    }

    /// Typed value used for ranking. Unparseable values rank as absent.
    fn comparable_value(&self) -> Option<ObsValue> {
        match self.obs_value() {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(concept = %self.concept_uuid, "ignoring observation value: {err}");
                None
            }
        }
    }
}

/// Canonical ordering over observations of possibly different types.
///
/// Absent values come first. Values of different types order by type rank:
/// false, numeric, text, coded, date, datetime, true. Within one type,
/// numbers compare by magnitude, coded answers by severity, text
/// lexically and dates chronologically.
pub fn total_order(a: &Observation, b: &Observation) -> Ordering {
    match (a.comparable_value(), b.comparable_value()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => type_rank(&left)
            .cmp(&type_rank(&right))
            .then_with(|| compare_same_type(&left, &right)),
    }
}

/// The maximum under [`total_order`]; the earliest wins among equals.
pub fn most_severe<'a, I>(observations: I) -> Option<&'a Observation>
where
    I: IntoIterator<Item = &'a Observation>,
{
    observations.into_iter().fold(None, |best, candidate| match best {
        Some(current) if total_order(candidate, current) != Ordering::Greater => Some(current),
        _ => Some(candidate),
    })
}

fn type_rank(value: &ObsValue) -> u8 {
    match value {
        ObsValue::Boolean(false) => 1,
        ObsValue::Numeric(_) => 2,
        ObsValue::Text(_) => 3,
        ObsValue::Coded { .. } => 4,
        ObsValue::Date(_) => 5,
        ObsValue::DateTime(_) => 6,
        ObsValue::Boolean(true) => 7,
    }
}

fn compare_same_type(left: &ObsValue, right: &ObsValue) -> Ordering {
    match (left, right) {
        (ObsValue::Numeric(a), ObsValue::Numeric(b)) => a.total_cmp(b),
        (ObsValue::Coded { uuid: a, .. }, ObsValue::Coded { uuid: b, .. }) => {
            coded_severity(a).cmp(&coded_severity(b))
        }
        (ObsValue::Boolean(a), ObsValue::Boolean(b)) => a.cmp(b),
        (ObsValue::Text(a), ObsValue::Text(b)) => a.cmp(b),
        (ObsValue::Date(a), ObsValue::Date(b)) => a.cmp(b),
        (ObsValue::DateTime(a), ObsValue::DateTime(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

/// Display-ready observation with localized names and values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizedObservation {
    pub id: i64,
    /// Encounter time in milliseconds since the epoch; 0 for layout rows.
    pub encounter_time_millis: i64,
    /// Localized chart section; empty in the most-recent projection.
    pub group_name: String,
    pub concept_uuid: String,
    pub concept_name: String,
    /// Non-localized value: a number, text or answer concept UUID.
    pub value: Option<String>,
    pub localized_value: Option<String>,
}

impl LocalizedObservation {
    /// Raw value as a number, or `None` when it is absent or not numeric.
    ///
    /// Coded and text rows land here too, so a miss is not logged. Callers
    /// that know the concept is numeric should use [`Self::parse_numeric`].
    pub fn numeric_value(&self) -> Option<f64> {
        self.parse_numeric().ok().flatten()
    }

    /// Raw value parsed as a number, with the parse failure kept.
    pub fn parse_numeric(&self) -> Result<Option<f64>, ValueParseError> {
        let Some(raw) = self.value.as_deref() else {
            return Ok(None);
        };
        raw.trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|err| ValueParseError {
                concept_type: ConceptType::Numeric,
                raw: raw.to_string(),
                reason: err.to_string(),
            })
    }

    /// True for chart layout rows that carry no observed value.
    pub fn is_empty(&self) -> bool {
        self.value.as_deref().map_or(true, str::is_empty)
    }
}

impl PartialEq for LocalizedObservation {
    fn eq(&self, other: &Self) -> bool {
        self.encounter_time_millis == other.encounter_time_millis
            && self.group_name == other.group_name
            && self.concept_uuid == other.concept_uuid
            && self.concept_name == other.concept_name
            && self.value == other.value
            && self.localized_value == other.localized_value
    }
}

impl fmt::Display for LocalizedObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={},time={},group={},conceptUuid={},conceptName={},value={}",
            self.id,
            self.encounter_time_millis,
            self.group_name,
            self.concept_uuid,
            self.concept_name,
            self.localized_value.as_deref().unwrap_or("")
        )
    }
}
