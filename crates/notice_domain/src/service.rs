use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    clock::{Clock, SystemClock},
    config::CenterConfig,
    device::{
        DeliveredNotification, DeliveryHandler, DeviceNotifier, MemoryDevice, NotificationContent,
        PermissionStatus,
    },
    error::{NoticeError, Result},
    listeners::{ChangeListeners, Subscription},
    record::{NotificationRecord, RecordIdGenerator},
    reminder::{payload_event_id, payload_kind, ReminderRequest, ScheduleOutcome},
    store::{KeyValueStore, MemoryStore},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryMode {
    /// `initialize` has not run yet.
    Uninitialized,
    /// Deliveries from the device are logged.
    Enabled,
    /// Permission was refused or the device could not be wired up. The log
    /// itself still works.
    LogOnly,
}

/// Owns the persisted notification log, keeps the badge in step with it and
/// schedules event reminders on the device.
pub struct NotificationCenter {
    store: Arc<dyn KeyValueStore>,
    device: Arc<dyn DeviceNotifier>,
    clock: Arc<dyn Clock>,
    config: CenterConfig,
    listeners: ChangeListeners,
    ids: RecordIdGenerator,
    log_lock: Mutex<()>,
    schedule_lock: Mutex<()>,
    mode: RwLock<DeliveryMode>,
}

pub struct NotificationCenterBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    device: Option<Arc<dyn DeviceNotifier>>,
    clock: Option<Arc<dyn Clock>>,
    config: CenterConfig,
}

impl Default for NotificationCenterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenterBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            device: None,
            clock: None,
            config: CenterConfig::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_device(mut self, device: Arc<dyn DeviceNotifier>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_config(mut self, config: CenterConfig) -> Self {
        self.config = config;
        self
    }

    /// Missing collaborators fall back to in-memory ones and the system clock.
    pub fn build(self) -> Arc<NotificationCenter> {
        Arc::new(NotificationCenter {
            store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            device: self.device.unwrap_or_else(|| Arc::new(MemoryDevice::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config: self.config,
            listeners: ChangeListeners::new(),
            ids: RecordIdGenerator::new(),
            log_lock: Mutex::new(()),
            schedule_lock: Mutex::new(()),
            mode: RwLock::new(DeliveryMode::Uninitialized),
        })
    }
}

impl NotificationCenter {
    pub fn builder() -> NotificationCenterBuilder {
        NotificationCenterBuilder::new()
    }

    pub fn config(&self) -> &CenterConfig {
        &self.config
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        *self.mode.read()
    }

    /// Asks for permission, prepares the delivery channel and starts logging
    /// delivered notifications. Device failures leave the center in
    /// [`DeliveryMode::LogOnly`] instead of failing.
    pub fn initialize(self: &Arc<Self>) -> DeliveryMode {
        let mode = self.wire_device();
        *self.mode.write() = mode;
        info!(?mode, "notification center initialized");
        mode
    }

    fn wire_device(self: &Arc<Self>) -> DeliveryMode {
        match self.device.request_permission() {
            Ok(PermissionStatus::Granted) => {}
            Ok(PermissionStatus::Denied) => {
                info!("notification permission denied, running log-only");
                return DeliveryMode::LogOnly;
            }
            Err(err) => {
                warn!(%err, "notification permission request failed, running log-only");
                return DeliveryMode::LogOnly;
            }
        }

        if let Err(err) = self.device.ensure_channel(&self.config.channel) {
            warn!(%err, channel = %self.config.channel.id, "unable to create delivery channel");
        }

        let center = Arc::downgrade(self);
        let handler: DeliveryHandler = Arc::new(move |delivered: DeliveredNotification| {
            let Some(center) = center.upgrade() else {
                return;
            };
            if let Err(err) = center.record_delivery(delivered) {
                warn!(%err, "failed to log delivered notification");
            }
        });
        match self.device.set_delivery_handler(handler) {
            Ok(()) => DeliveryMode::Enabled,
            Err(err) => {
                warn!(%err, "unable to register delivery handler, running log-only");
                DeliveryMode::LogOnly
            }
        }
    }

    /// Turns a delivered device notification into a log entry.
    pub fn record_delivery(&self, delivered: DeliveredNotification) -> Result<NotificationRecord> {
        let record = {
            let _guard = self.log_lock.lock();
            let mut records = self.load_records();
            let now = self.clock.now();
            let id = self.ids.next(now, &records);
            let mut record = NotificationRecord::new(
                id,
                delivered.content.title,
                delivered.content.body,
                now,
            )
            .with_system_notification_id(delivered.identifier);
            record.kind = payload_kind(&delivered.payload);
            records.insert(0, record.clone());
            self.store_records(&mut records)?;
            record
        };
        debug!(id = %record.id, "delivered notification logged");
        self.listeners.notify();
        Ok(record)
    }

    /// The whole log, newest first. Unreadable data reads as an empty log.
    pub fn get_all(&self) -> Vec<NotificationRecord> {
        self.load_records()
    }

    pub fn unread_count(&self) -> usize {
        unread(&self.load_records())
    }

    /// Puts `record` at the head of the log.
    pub fn append(&self, record: NotificationRecord) -> Result<()> {
        {
            let _guard = self.log_lock.lock();
            let mut records = self.load_records();
            if records.iter().any(|existing| existing.id == record.id) {
                return Err(NoticeError::DuplicateRecord(record.id));
            }
            records.insert(0, record);
            self.store_records(&mut records)?;
        }
        self.listeners.notify();
        Ok(())
    }

    /// Marks the record with `id` as read. Returns false when there was
    /// nothing to change, either because the id is unknown or already read.
    pub fn mark_read(&self, id: &str) -> Result<bool> {
        let changed = {
            let _guard = self.log_lock.lock();
            let mut records = self.load_records();
            let mut changed = false;
            for record in records.iter_mut().filter(|record| record.id == id) {
                if !record.read {
                    record.read = true;
                    changed = true;
                }
            }
            if changed {
                self.store_records(&mut records)?;
            }
            changed
        };
        if changed {
            self.listeners.notify();
        }
        Ok(changed)
    }

    /// Marks every record read and returns how many flipped.
    pub fn mark_all_read(&self) -> Result<usize> {
        let flipped = {
            let _guard = self.log_lock.lock();
            let mut records = self.load_records();
            let mut flipped = 0;
            for record in records.iter_mut().filter(|record| !record.read) {
                record.read = true;
                flipped += 1;
            }
            if flipped > 0 {
                self.store_records(&mut records)?;
            }
            flipped
        };
        if flipped > 0 {
            self.listeners.notify();
        }
        Ok(flipped)
    }

    pub fn clear_all(&self) -> Result<()> {
        {
            let _guard = self.log_lock.lock();
            self.store.remove(&self.config.log_key)?;
            self.push_badge(0);
        }
        info!("notification log cleared");
        self.listeners.notify();
        Ok(())
    }

    /// Pushes the current unread count to the device badge and returns it.
    pub fn update_badge_count(&self) -> usize {
        let count = self.unread_count();
        self.push_badge(count);
        count
    }

    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    /// Schedules a reminder `lead_time` before the event, unless that moment
    /// has passed or the device already holds a reminder for the same event.
    /// Errors from the final scheduling call are returned to the caller.
    #[instrument(skip(self, request), fields(event_id = %request.event_id))]
    pub fn schedule_event_notification(&self, request: ReminderRequest) -> Result<ScheduleOutcome> {
        let _guard = self.schedule_lock.lock();
        let Some(trigger) = request.trigger(self.config.lead_time) else {
            warn!(lead_time = %self.config.lead_time, "reminder time out of range, skipping");
            return Ok(ScheduleOutcome::PastDue {
                trigger: DateTime::<Utc>::MIN_UTC,
            });
        };
        if trigger <= self.clock.now() {
            debug!(%trigger, "reminder time already passed, skipping");
            return Ok(ScheduleOutcome::PastDue { trigger });
        }

        match self.device.pending() {
            Ok(pending) => {
                let existing = pending.into_iter().find(|reminder| {
                    payload_event_id(&reminder.payload).as_ref() == Some(&request.event_id)
                });
                if let Some(existing) = existing {
                    debug!(handle = %existing.handle, "reminder already pending");
                    return Ok(ScheduleOutcome::AlreadyPending {
                        handle: existing.handle,
                    });
                }
            }
            Err(err) => {
                warn!(%err, "pending reminder lookup failed, scheduling without dedup");
            }
        }

        let payload = request.payload()?;
        let content = NotificationContent {
            title: request.title,
            body: request.body,
        };
        let handle = self.device.schedule_at(trigger, &content, payload)?;
        info!(%handle, %trigger, "event reminder scheduled");
        Ok(ScheduleOutcome::Scheduled { handle, trigger })
    }
}

impl NotificationCenter {
    fn load_records(&self) -> Vec<NotificationRecord> {
        let raw = match self.store.get(&self.config.log_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(%err, "notification log unreadable, treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(err) => {
                warn!(%err, "notification log corrupt, treating as empty");
                Vec::new()
            }
        }
    }

    /// Persists the log and syncs the badge. Callers hold `log_lock`.
    fn store_records(&self, records: &mut Vec<NotificationRecord>) -> Result<()> {
        if let Some(max) = self.config.max_records {
            records.truncate(max);
        }
        let raw = serde_json::to_string(&*records)?;
        self.store.set(&self.config.log_key, &raw)?;
        self.push_badge(unread(records));
        Ok(())
    }

    fn push_badge(&self, count: usize) {
        if let Err(err) = self.device.set_badge_count(count) {
            debug!(%err, count, "badge update failed");
        }
    }
}

fn unread(records: &[NotificationRecord]) -> usize {
    records.iter().filter(|record| !record.read).count()
}
