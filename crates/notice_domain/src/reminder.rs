use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{NoticeError, Result},
    record::EventId,
};

/// A request to remind the user shortly before an event starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub event_id: EventId,
    pub title: String,
    pub body: String,
    pub event_date: DateTime<Utc>,
    pub kind: Option<String>,
}

impl ReminderRequest {
    pub fn new(
        event_id: impl Into<EventId>,
        title: impl Into<String>,
        body: impl Into<String>,
        event_date: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            title: title.into(),
            body: body.into(),
            event_date,
            kind: None,
        }
    }

    /// Same as [`ReminderRequest::new`] with the event date given as an
    /// RFC 3339 string, the format the backend sends.
    pub fn from_iso(
        event_id: impl Into<EventId>,
        title: impl Into<String>,
        body: impl Into<String>,
        event_date: &str,
    ) -> Result<Self> {
        let parsed = DateTime::parse_from_rfc3339(event_date.trim()).map_err(|source| {
            NoticeError::InvalidDate {
                value: event_date.to_string(),
                source,
            }
        })?;
        Ok(Self::new(
            event_id,
            title,
            body,
            parsed.with_timezone(&Utc),
        ))
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// `None` when the subtraction leaves chrono's representable range.
    pub fn trigger(&self, lead_time: Duration) -> Option<DateTime<Utc>> {
        self.event_date.checked_sub_signed(lead_time)
    }

    pub(crate) fn payload(&self) -> Result<serde_json::Value> {
        let payload = ReminderPayload {
            event_id: self.event_id.clone(),
            kind: self.kind.clone(),
        };
        Ok(serde_json::to_value(payload)?)
    }
}

/// Payload attached to every scheduled reminder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    pub event_id: EventId,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Extracts the event id a pending reminder was scheduled for, if its payload
/// carries one.
pub fn payload_event_id(payload: &serde_json::Value) -> Option<EventId> {
    payload.get("eventId").and_then(EventId::from_json)
}

/// Extracts the `type` tag from a reminder payload.
pub fn payload_kind(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("type")
        .and_then(|kind| kind.as_str())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled {
        handle: String,
        trigger: DateTime<Utc>,
    },
    /// The trigger time was already at or before now.
    PastDue { trigger: DateTime<Utc> },
    /// The device already holds a pending reminder for this event.
    AlreadyPending { handle: String },
}

impl ScheduleOutcome {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, ScheduleOutcome::Scheduled { .. })
    }
}
