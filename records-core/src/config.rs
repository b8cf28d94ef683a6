use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::concepts::{ENGLISH_LOCALE, KNOWN_CHART_UUID};

/// Settings shared by the sync and chart layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordsConfig {
    /// Deadline (seconds) for fetching the remote patient list.
    pub fetch_timeout_secs: u64,
    /// Locale used when a caller does not ask for one.
    pub default_locale: String,
    /// Chart layout used for full and empty charts.
    pub chart_uuid: String,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            default_locale: ENGLISH_LOCALE.to_string(),
            chart_uuid: KNOWN_CHART_UUID.to_string(),
        }
    }
}

impl RecordsConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Partial configuration as read from a settings file.
#[derive(Debug, Default, Deserialize)]
pub struct RecordsConfigOverrides {
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
    #[serde(default)]
    pub default_locale: Option<String>,
    #[serde(default)]
    pub chart_uuid: Option<String>,
}

impl From<RecordsConfigOverrides> for RecordsConfig {
    fn from(cfg: RecordsConfigOverrides) -> Self {
        let mut base = RecordsConfig::default();
        if let Some(secs) = cfg.fetch_timeout_secs {
            base.fetch_timeout_secs = secs;
        }
        if let Some(locale) = cfg.default_locale {
            base.default_locale = locale;
        }
        if let Some(chart_uuid) = cfg.chart_uuid {
            base.chart_uuid = chart_uuid;
        }
        base
    }
}
