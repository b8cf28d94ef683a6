//! Typed representation of one observed clinical value.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::concepts::YES_UUID;
use crate::error::{RecordsError, ValueParseError};

/// Data type of an observed concept.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConceptType {
    Coded,
    Numeric,
    Text,
    Boolean,
    Date,
    Datetime,
}

impl ConceptType {
    pub fn as_tag(self) -> &'static str {
        match self {
            ConceptType::Coded => "CODED",
            ConceptType::Numeric => "NUMERIC",
            ConceptType::Text => "TEXT",
            ConceptType::Boolean => "BOOLEAN",
            ConceptType::Date => "DATE",
            ConceptType::Datetime => "DATETIME",
        }
    }
}

impl FromStr for ConceptType {
    type Err = RecordsError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "CODED" => Ok(ConceptType::Coded),
            "NUMERIC" => Ok(ConceptType::Numeric),
            "TEXT" => Ok(ConceptType::Text),
            "BOOLEAN" => Ok(ConceptType::Boolean),
            "DATE" => Ok(ConceptType::Date),
            "DATETIME" => Ok(ConceptType::Datetime),
            _ => Err(RecordsError::UnknownConceptType(tag.to_string())),
        }
    }
}

impl fmt::Display for ConceptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// One observed value. The variant is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ObsValue {
    Coded {
        uuid: String,
        display_name: Option<String>,
    },
    Numeric(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl ObsValue {
    pub fn concept_type(&self) -> ConceptType {
        match self {
            ObsValue::Coded { .. } => ConceptType::Coded,
            ObsValue::Numeric(_) => ConceptType::Numeric,
            ObsValue::Text(_) => ConceptType::Text,
            ObsValue::Boolean(_) => ConceptType::Boolean,
            ObsValue::Date(_) => ConceptType::Date,
            ObsValue::DateTime(_) => ConceptType::Datetime,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ObsValue::Numeric(value) => Some(*value),
            _ => None,
        }
    }
}

/// Time of an observation together with its typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsPoint {
    pub time: DateTime<Utc>,
    pub value: ObsValue,
}

/// Map a raw stored value onto the typed union.
///
/// Returns `Ok(None)` when there is no raw value or no recognised type.
/// A raw value that does not fit its type is an error, never a default.
pub fn classify(
    concept_type: Option<ConceptType>,
    raw_value: Option<&str>,
    raw_value_display_name: Option<&str>,
) -> Result<Option<ObsValue>, ValueParseError> {
    let (Some(concept_type), Some(raw)) = (concept_type, raw_value) else {
        return Ok(None);
    };

    let parse_error = |reason: String| ValueParseError {
        concept_type,
        raw: raw.to_string(),
        reason,
    };

    let value = match concept_type {
        ConceptType::Coded => ObsValue::Coded {
            uuid: raw.to_string(),
            display_name: raw_value_display_name.map(str::to_string),
        },
        ConceptType::Numeric => raw
            .trim()
            .parse::<f64>()
            .map(ObsValue::Numeric)
            .map_err(|err| parse_error(err.to_string()))?,
        ConceptType::Text => ObsValue::Text(raw.to_string()),
        ConceptType::Boolean => ObsValue::Boolean(raw == YES_UUID),
        ConceptType::Date => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(ObsValue::Date)
            .map_err(|err| parse_error(err.to_string()))?,
        ConceptType::Datetime => {
            let millis = raw
                .trim()
                .parse::<i64>()
                .map_err(|err| parse_error(err.to_string()))?;
            let instant = Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| parse_error("timestamp out of range".to_string()))?;
            ObsValue::DateTime(instant)
        }
    };

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concepts::{NO_UUID, SEVERE_UUID};

    #[test]
    fn numeric_value_parses() {
        let value = classify(Some(ConceptType::Numeric), Some("102.5"), None).unwrap();
        assert_eq!(value, Some(ObsValue::Numeric(102.5)));
    }

    #[test]
    fn non_numeric_text_is_a_parse_error() {
        let err = classify(Some(ConceptType::Numeric), Some("abc"), None).unwrap_err();
        assert_eq!(err.concept_type, ConceptType::Numeric);
        assert_eq!(err.raw, "abc");
    }

    #[test]
    fn missing_value_or_type_is_absent() {
        assert_eq!(classify(Some(ConceptType::Text), None, None).unwrap(), None);
        assert_eq!(classify(None, Some("12"), None).unwrap(), None);
    }

    #[test]
    fn coded_keeps_display_name() {
        let value = classify(Some(ConceptType::Coded), Some(SEVERE_UUID), Some("Severe")).unwrap();
        assert_eq!(
            value,
            Some(ObsValue::Coded {
                uuid: SEVERE_UUID.to_string(),
                display_name: Some("Severe".to_string()),
            })
        );
    }

    #[test]
    fn boolean_is_true_only_for_yes() {
        let yes = classify(Some(ConceptType::Boolean), Some(YES_UUID), None).unwrap();
        let no = classify(Some(ConceptType::Boolean), Some(NO_UUID), None).unwrap();
        assert_eq!(yes, Some(ObsValue::Boolean(true)));
        assert_eq!(no, Some(ObsValue::Boolean(false)));
    }

    #[test]
    fn date_and_datetime_values() {
        let date = classify(Some(ConceptType::Date), Some("2014-11-21"), None).unwrap();
        assert_eq!(
            date,
            Some(ObsValue::Date(NaiveDate::from_ymd_opt(2014, 11, 21).unwrap()))
        );

        let datetime = classify(Some(ConceptType::Datetime), Some("1416528000000"), None)
            .unwrap()
            .unwrap();
        assert_eq!(datetime.concept_type(), ConceptType::Datetime);

        assert!(classify(Some(ConceptType::Date), Some("21/11/2014"), None).is_err());
        assert!(classify(Some(ConceptType::Datetime), Some("soon"), None).is_err());
    }

    #[test]
    fn concept_type_tags() {
        assert_eq!("NUMERIC".parse::<ConceptType>().unwrap(), ConceptType::Numeric);
        assert_eq!("datetime".parse::<ConceptType>().unwrap(), ConceptType::Datetime);
        assert!(matches!(
            "DRUG".parse::<ConceptType>(),
            Err(RecordsError::UnknownConceptType(tag)) if tag == "DRUG"
        ));
    }
}
