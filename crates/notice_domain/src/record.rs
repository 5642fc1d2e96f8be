use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One entry of the persisted notification log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Receipt time, not the time of the event the notification is about.
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_notification_id: Option<String>,
}

impl NotificationRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            date,
            read: false,
            kind: None,
            system_notification_id: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_system_notification_id(mut self, id: impl Into<String>) -> Self {
        self.system_notification_id = Some(id.into());
        self
    }
}

/// Canonical event identifier. Always a string once it is inside the core;
/// numeric ids from the outside are converted at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads an id out of an opaque payload value. Strings and numbers are
    /// accepted; anything else is not an event id.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(raw) => Some(Self(raw.clone())),
            serde_json::Value::Number(number) => Some(Self(number.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for EventId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for EventId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

/// Issues creation-time derived record ids (milliseconds since the epoch).
///
/// Ids are strictly increasing for the lifetime of the generator, and never
/// collide with the newest id already present in the log, so two deliveries
/// inside the same millisecond still get distinct ids. Numeric ids beyond the
/// latest representable timestamp are not timestamps and do not raise the floor.
#[derive(Debug, Default)]
pub struct RecordIdGenerator {
    last: Mutex<i64>,
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, now: DateTime<Utc>, existing: &[NotificationRecord]) -> String {
        let ceiling = DateTime::<Utc>::MAX_UTC.timestamp_millis();
        let newest_existing = existing
            .iter()
            .filter_map(|record| record.id.parse::<i64>().ok())
            .filter(|id| *id <= ceiling)
            .max()
            .unwrap_or(i64::MIN);
        let mut last = self.last.lock();
        let floor = (*last).max(newest_existing);
        let candidate = now.timestamp_millis();
        let mut id = if candidate > floor {
            candidate
        } else {
            floor.saturating_add(1)
        };
        while id < i64::MAX && existing.iter().any(|record| record.id == id.to_string()) {
            id += 1;
        }
        *last = id;
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn record_serializes_with_camel_case_and_type_key() {
        let record = NotificationRecord::new("1", "Reminder", "Starts soon", at(0))
            .with_kind("event_assignment")
            .with_system_notification_id("sys-9");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "event_assignment");
        assert_eq!(value["systemNotificationId"], "sys-9");
        assert_eq!(value["read"], false);
        assert_eq!(value["date"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn optional_fields_are_omitted_and_read_defaults_to_false() {
        let value = serde_json::to_value(NotificationRecord::new("1", "t", "b", at(0))).unwrap();
        assert!(value.get("type").is_none());
        assert!(value.get("systemNotificationId").is_none());

        let parsed: NotificationRecord = serde_json::from_value(json!({
            "id": "5",
            "title": "t",
            "body": "b",
            "date": "2025-01-01T10:00:00.000Z"
        }))
        .unwrap();
        assert!(!parsed.read);
        assert!(parsed.kind.is_none());
    }

    #[test]
    fn event_id_canonicalizes_numbers_and_strings() {
        assert_eq!(EventId::from_json(&json!(42)), Some(EventId::from("42")));
        assert_eq!(EventId::from_json(&json!("42")), Some(EventId::from(42u64)));
        assert_eq!(EventId::from_json(&json!(null)), None);
        assert_eq!(EventId::from_json(&json!({"id": 1})), None);
    }

    #[test]
    fn generator_never_repeats_within_the_same_millisecond() {
        let generator = RecordIdGenerator::new();
        let first = generator.next(at(1_000), &[]);
        let second = generator.next(at(1_000), &[]);
        assert_eq!(first, "1000");
        assert_eq!(second, "1001");
    }

    #[test]
    fn generator_steps_past_ids_already_in_the_log() {
        let generator = RecordIdGenerator::new();
        let existing = vec![NotificationRecord::new("5000", "t", "b", at(5_000))];
        assert_eq!(generator.next(at(4_000), &existing), "5001");
    }

    #[test]
    fn generator_ignores_ids_that_cannot_be_timestamps() {
        let generator = RecordIdGenerator::new();
        let existing = vec![NotificationRecord::new(i64::MAX.to_string(), "t", "b", at(0))];
        assert_eq!(generator.next(at(7_000), &existing), "7000");
        assert_eq!(generator.next(at(7_000), &existing), "7001");
    }

    #[test]
    fn generator_skips_ids_already_taken_above_the_floor() {
        let generator = RecordIdGenerator::new();
        let ceiling = DateTime::<Utc>::MAX_UTC.timestamp_millis();
        let taken = (ceiling + 1).to_string();
        let existing = vec![NotificationRecord::new(taken, "t", "b", at(0))];
        assert_eq!(
            generator.next(DateTime::<Utc>::MAX_UTC, &existing),
            ceiling.to_string()
        );
        assert_eq!(
            generator.next(DateTime::<Utc>::MAX_UTC, &existing),
            (ceiling + 2).to_string()
        );
    }
}
