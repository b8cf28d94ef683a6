//! Well-known answer concepts and the coded severity table.

pub const YES_UUID: &str = "1065AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
pub const NO_UUID: &str = "1066AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
pub const NONE_UUID: &str = "1107AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
pub const NORMAL_UUID: &str = "1115AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
pub const SOLID_FOOD_UUID: &str = "159597AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
pub const MILD_UUID: &str = "1498AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
pub const MODERATE_UUID: &str = "1499AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
pub const SEVERE_UUID: &str = "1500AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Chart layout shown for every patient unless configured otherwise.
pub const KNOWN_CHART_UUID: &str = "ea43f213-66fb-4af6-8a49-70fd6b9ce5d4";

pub const ENGLISH_LOCALE: &str = "en";

/// Coded answers from least to most severe. Answers outside this table
/// rank as 0; the table has not been reviewed for concepts beyond these.
const SEVERITY_TABLE: [(&str, u8); 8] = [
    (NO_UUID, 0),
    (NONE_UUID, 1),
    (NORMAL_UUID, 2),
    (SOLID_FOOD_UUID, 3),
    (MILD_UUID, 4),
    (MODERATE_UUID, 5),
    (SEVERE_UUID, 6),
    (YES_UUID, 7),
];

/// Answers that mean "everything is normal, no worrying symptom".
const NO_SYMPTOM_VALUES: [&str; 4] = [NO_UUID, SOLID_FOOD_UUID, NORMAL_UUID, NONE_UUID];

/// Severity rank of a coded answer.
pub fn coded_severity(answer_uuid: &str) -> u8 {
    SEVERITY_TABLE
        .iter()
        .find(|(uuid, _)| *uuid == answer_uuid)
        .map(|(_, rank)| *rank)
        .unwrap_or(0)
}

pub fn is_no_symptom(answer_uuid: &str) -> bool {
    NO_SYMPTOM_VALUES.contains(&answer_uuid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_table_runs_from_no_to_yes() {
        assert_eq!(coded_severity(NO_UUID), 0);
        assert_eq!(coded_severity(NORMAL_UUID), 2);
        assert_eq!(coded_severity(SEVERE_UUID), 6);
        assert_eq!(coded_severity(YES_UUID), 7);
    }

    #[test]
    fn unmapped_answer_has_zero_severity() {
        assert_eq!(coded_severity("162643AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"), 0);
        assert_eq!(coded_severity(""), 0);
    }

    #[test]
    fn no_symptom_answers() {
        assert!(is_no_symptom(NORMAL_UUID));
        assert!(is_no_symptom(SOLID_FOOD_UUID));
        assert!(!is_no_symptom(SEVERE_UUID));
        assert!(!is_no_symptom(YES_UUID));
    }
}
