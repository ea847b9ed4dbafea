use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix for day-bucket keys in the durable store.
pub const DAY_KEY_PREFIX: &str = "TOS_";

/// Unit used for externally reported durations. Internal durations are
/// always milliseconds; the unit applies once, at report time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackedBy {
    #[default]
    Millisecond,
    Second,
}

impl TrackedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedBy::Millisecond => "millisecond",
            TrackedBy::Second => "second",
        }
    }

    /// Converts an internal millisecond duration into this report unit,
    /// rounding to the nearest whole unit.
    pub fn report_units(&self, ms: u64) -> u64 {
        match self {
            TrackedBy::Millisecond => ms,
            TrackedBy::Second => (ms + 500) / 1000,
        }
    }

    /// Renders a reported duration as `"{d}d {HH}h {MM}m {SS}s"`.
    pub fn display_duration(&self, value: u64) -> String {
        let seconds = match self {
            TrackedBy::Millisecond => value / 1000,
            TrackedBy::Second => value,
        };
        seconds_to_display(seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingType {
    Tos,
    Activity,
}

/// Custom key/value annotations merged into finalized records.
///
/// Merge precedence, lowest to highest: base custom data set on the
/// tracker, activity-start details, activity-end details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomData(pub BTreeMap<String, Value>);

impl CustomData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlays `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: &CustomData) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for CustomData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Finalized page-visit measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub id: u64,
    pub session_key: String,
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub entry_time: String,
    pub current_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<String>,
    pub time_on_page: u64,
    pub time_on_page_tracked_by: TrackedBy,
    pub time_on_page_by_duration: String,
    pub time_on_site: u64,
    pub time_on_site_by_duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_time_tracking: Option<bool>,
    pub tracking_type: TrackingType,
    #[serde(flatten)]
    pub custom: CustomData,
}

/// Finalized activity measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: u64,
    pub session_key: String,
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub activity_start: String,
    pub activity_end: String,
    pub time_taken: u64,
    pub time_taken_tracked_by: TrackedBy,
    pub time_taken_by_duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_time_tracking: Option<bool>,
    pub tracking_type: TrackingType,
    #[serde(flatten)]
    pub custom: CustomData,
}

/// Immutable finalized measurement, ready for delivery or reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Page(PageRecord),
    Activity(ActivityRecord),
}

impl Record {
    pub fn id(&self) -> u64 {
        match self {
            Record::Page(record) => record.id,
            Record::Activity(record) => record.id,
        }
    }

    pub fn session_key(&self) -> &str {
        match self {
            Record::Page(record) => &record.session_key,
            Record::Activity(record) => &record.session_key,
        }
    }

    pub fn tracking_type(&self) -> TrackingType {
        match self {
            Record::Page(record) => record.tracking_type,
            Record::Activity(record) => record.tracking_type,
        }
    }

    pub fn set_real_time_tracking(&mut self) {
        match self {
            Record::Page(record) => record.real_time_tracking = Some(true),
            Record::Activity(record) => record.real_time_tracking = Some(true),
        }
    }
}

/// Day-bucket key for a local calendar date, `TOS_{month}_{day}_{year}`.
pub fn day_bucket_key(date: NaiveDate) -> String {
    format!(
        "{}{}_{}_{}",
        DAY_KEY_PREFIX,
        date.month(),
        date.day(),
        date.year()
    )
}

/// Renders a whole-second duration as `"{d}d {HH}h {MM}m {SS}s"` using UTC
/// decomposition of the time-of-day portion.
pub fn seconds_to_display(seconds: u64) -> String {
    let days = seconds / 86_400;
    let rest = seconds % 86_400;
    format!(
        "{}d {:02}h {:02}m {:02}s",
        days,
        rest / 3600,
        (rest % 3600) / 60,
        rest % 60
    )
}
