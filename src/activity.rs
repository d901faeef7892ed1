//! Activity records as returned by the Garmin Connect activity list.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;

use crate::Coordinate;

/// Activity classification, e.g. `running`, `cycling`, `breathwork`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityType {
    pub type_key: String,
}

/// A recorded activity.
///
/// Only the fields the downloader reads are kept; everything else in the
/// service's JSON is ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "activityId")]
    pub id: u64,
    /// Display name, may contain spaces
    #[serde(rename = "activityName", default, deserialize_with = "null_as_default")]
    pub name: String,
    pub activity_type: ActivityType,
    /// Start latitude in degrees (absent for indoor activities)
    #[serde(default)]
    pub start_latitude: Option<f64>,
    /// Start longitude in degrees (absent for indoor activities)
    #[serde(default)]
    pub start_longitude: Option<f64>,
    /// Start time in milliseconds since the Unix epoch
    pub begin_timestamp: i64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Activity {
    pub fn new(
        id: u64,
        name: impl Into<String>,
        type_key: impl Into<String>,
        start: Option<Coordinate>,
        begin_timestamp: i64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            activity_type: ActivityType {
                type_key: type_key.into(),
            },
            start_latitude: start.map(|c| c.latitude),
            start_longitude: start.map(|c| c.longitude),
            begin_timestamp,
        }
    }

    pub fn type_key(&self) -> &str {
        &self.activity_type.type_key
    }

    /// Start coordinate, if both latitude and longitude are present.
    pub fn start(&self) -> Option<Coordinate> {
        match (self.start_latitude, self.start_longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    /// GPX file name in the local time zone, e.g. `Morning_Run2024_05_01_07_30.gpx`.
    pub fn file_name(&self) -> String {
        self.file_name_in(&Local)
    }

    /// GPX file name with the start time rendered in `tz`.
    ///
    /// Spaces and path separators in the name become underscores. The
    /// timestamp part is dropped if the start time is out of range.
    pub fn file_name_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let name: String = self
            .name
            .chars()
            .map(|c| match c {
                ' ' | '/' | '\\' => '_',
                c => c,
            })
            .collect();

        match DateTime::from_timestamp_millis(self.begin_timestamp) {
            Some(utc) => format!(
                "{}{}.gpx",
                name,
                utc.with_timezone(tz).format("%Y_%m_%d_%H_%M")
            ),
            None => format!("{}.gpx", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SAMPLE: &str = r#"{
        "activityId": 14839201931,
        "activityName": "Amsterdam Running",
        "activityType": {"typeId": 1, "typeKey": "running", "parentTypeId": 17},
        "startLatitude": 52.3676,
        "startLongitude": 4.9041,
        "beginTimestamp": 1714548600000,
        "distance": 10234.5
    }"#;

    #[test]
    fn test_deserialize_service_json() {
        let a: Activity = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(a.id, 14839201931);
        assert_eq!(a.name, "Amsterdam Running");
        assert_eq!(a.type_key(), "running");
        assert_eq!(a.start(), Some(Coordinate::new(52.3676, 4.9041)));
    }

    #[test]
    fn test_indoor_activity_has_no_start() {
        let json = r#"{
            "activityId": 7,
            "activityName": null,
            "activityType": {"typeKey": "breathwork"},
            "startLatitude": null,
            "beginTimestamp": 1714548600000
        }"#;
        let a: Activity = serde_json::from_str(json).unwrap();
        assert_eq!(a.name, "");
        assert_eq!(a.start(), None);
    }

    #[test]
    fn test_file_name() {
        // 2024-05-01T07:30:00Z
        let a = Activity::new(1, "Morning Run", "running", None, 1_714_548_600_000);
        assert_eq!(a.file_name_in(&Utc), "Morning_Run2024_05_01_07_30.gpx");
    }

    #[test]
    fn test_file_name_strips_path_separators() {
        let a = Activity::new(1, "Up/Down Hill", "hiking", None, 1_714_548_600_000);
        assert_eq!(a.file_name_in(&Utc), "Up_Down_Hill2024_05_01_07_30.gpx");
    }
}
