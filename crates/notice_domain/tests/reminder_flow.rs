use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use notice_domain::{
    clock::{Clock, ManualClock},
    device::MemoryDevice,
    store::FileStore,
    DeliveryMode, NotificationCenter, ReminderRequest, ScheduleOutcome,
};
use tempfile::tempdir;

#[test]
fn reminders_fire_into_a_log_that_survives_restarts() {
    let temp = tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 11, 7, 8, 0, 0).unwrap(),
    ));
    let device = Arc::new(MemoryDevice::new());
    let store = Arc::new(FileStore::open(temp.path()).expect("open store"));

    let center = NotificationCenter::builder()
        .with_store(store.clone())
        .with_device(device.clone())
        .with_clock(clock.clone())
        .build();
    assert_eq!(center.initialize(), DeliveryMode::Enabled);

    let concert = ReminderRequest::from_iso(
        "42",
        "Concert at the Roundhouse",
        "Doors open in 10 minutes",
        "2025-11-07T09:00:00Z",
    )
    .expect("valid date")
    .with_kind("event_assignment");
    let brunch = ReminderRequest::from_iso(
        "43",
        "Brunch",
        "Table for four",
        "2025-11-07T08:05:00Z",
    )
    .expect("valid date");

    assert!(center
        .schedule_event_notification(concert.clone())
        .expect("schedule concert")
        .is_scheduled());
    assert!(matches!(
        center.schedule_event_notification(concert).expect("reschedule concert"),
        ScheduleOutcome::AlreadyPending { .. }
    ));
    assert!(matches!(
        center.schedule_event_notification(brunch).expect("schedule brunch"),
        ScheduleOutcome::PastDue { .. }
    ));
    assert_eq!(device.pending_snapshot().len(), 1);

    clock.advance(Duration::minutes(49));
    assert_eq!(device.fire_due(clock.now()), 0);
    clock.advance(Duration::minutes(1));
    assert_eq!(device.fire_due(clock.now()), 1);
    assert!(device.pending_snapshot().is_empty());

    let log = center.get_all();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].title, "Concert at the Roundhouse");
    assert_eq!(device.badge(), Some(1));

    drop(center);

    let reopened = NotificationCenter::builder()
        .with_store(Arc::new(FileStore::open(temp.path()).expect("reopen store")))
        .with_device(device.clone())
        .with_clock(clock.clone())
        .build();
    let log = reopened.get_all();
    assert_eq!(log.len(), 1);
    assert!(!log[0].read);

    assert!(reopened.mark_read(&log[0].id).expect("mark read"));
    assert_eq!(reopened.update_badge_count(), 0);
    assert_eq!(device.badge(), Some(0));

    reopened.clear_all().expect("clear");
    assert!(reopened.get_all().is_empty());
}

#[test]
fn delivery_after_center_dropped_is_ignored() {
    let device = Arc::new(MemoryDevice::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 11, 7, 8, 0, 0).unwrap(),
    ));
    let center = NotificationCenter::builder()
        .with_device(device.clone())
        .with_clock(clock.clone())
        .build();
    center.initialize();
    center
        .schedule_event_notification(ReminderRequest::new(
            "1",
            "Standup",
            "Daily",
            clock.now() + Duration::minutes(30),
        ))
        .expect("schedule");
    drop(center);

    clock.advance(Duration::minutes(30));
    assert_eq!(device.fire_due(clock.now()), 1);
    assert_eq!(device.badge(), None);
}
