use std::sync::Arc;

use chrono::{DateTime, Utc};
use notice_domain::{
    device::{
        ChannelSpec, DeliveredNotification, DeliveryHandler, DeviceNotifier, NotificationContent,
        PendingReminder, PermissionStatus,
    },
    store::KeyValueStore,
    DeviceError,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

const PENDING_KEY: &str = "device.pending";
const BADGE_KEY: &str = "device.badge";
const SEQUENCE_KEY: &str = "device.sequence";
const APP_NAME: &str = "notice";

/// Desktop stand-in for the OS notification service. Pending reminders are
/// kept in the key-value store so they outlive a single CLI invocation, and
/// fire when [`DesktopDevice::fire_due`] is polled.
pub struct DesktopDevice {
    store: Arc<dyn KeyValueStore>,
    popups: bool,
    permission: PermissionStatus,
    handler: Mutex<Option<DeliveryHandler>>,
    channels: Mutex<Vec<ChannelSpec>>,
    pending_lock: Mutex<()>,
}

impl DesktopDevice {
    pub fn new(store: Arc<dyn KeyValueStore>, popups: bool, permission: PermissionStatus) -> Self {
        Self {
            store,
            popups,
            permission,
            handler: Mutex::new(None),
            channels: Mutex::new(Vec::new()),
            pending_lock: Mutex::new(()),
        }
    }

    pub fn badge(&self) -> Option<usize> {
        self.store
            .get(BADGE_KEY)
            .ok()
            .flatten()
            .and_then(|raw| raw.trim().parse().ok())
    }

    pub fn channels(&self) -> Vec<ChannelSpec> {
        self.channels.lock().clone()
    }

    /// Removes every reminder due at `now` from the pending list, shows it and
    /// hands it to the delivery handler. Returns how many fired.
    pub fn fire_due(&self, now: DateTime<Utc>) -> Result<usize, DeviceError> {
        let mut due = {
            let _guard = self.pending_lock.lock();
            let (due, remaining): (Vec<_>, Vec<_>) = self
                .load_pending()?
                .into_iter()
                .partition(|reminder| reminder.trigger <= now);
            if !due.is_empty() {
                self.save_pending(&remaining)?;
            }
            due
        };
        due.sort_by_key(|reminder| reminder.trigger);

        let handler = self.handler.lock().clone();
        let fired = due.len();
        for reminder in due {
            if self.popups {
                self.show_popup(&reminder.content);
            }
            match &handler {
                Some(handler) => handler(DeliveredNotification {
                    identifier: reminder.handle,
                    content: reminder.content,
                    payload: reminder.payload,
                }),
                None => debug!(handle = %reminder.handle, "reminder fired without a handler"),
            }
        }
        Ok(fired)
    }

    fn show_popup(&self, content: &NotificationContent) {
        let shown = notify_rust::Notification::new()
            .appname(APP_NAME)
            .summary(&content.title)
            .body(&content.body)
            .show();
        if let Err(err) = shown {
            warn!(%err, title = %content.title, "unable to show desktop notification");
        }
    }

    fn load_pending(&self) -> Result<Vec<PendingReminder>, DeviceError> {
        let raw = self
            .store
            .get(PENDING_KEY)
            .map_err(|err| DeviceError::Unavailable(err.to_string()))?;
        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|err| DeviceError::Unavailable(format!("pending list corrupt: {err}"))),
            None => Ok(Vec::new()),
        }
    }

    fn save_pending(&self, pending: &[PendingReminder]) -> Result<(), DeviceError> {
        let raw = serde_json::to_string(pending)
            .map_err(|err| DeviceError::Rejected(err.to_string()))?;
        self.store
            .set(PENDING_KEY, &raw)
            .map_err(|err| DeviceError::Unavailable(err.to_string()))
    }

    fn next_handle(&self) -> Result<String, DeviceError> {
        let current: u64 = self
            .store
            .get(SEQUENCE_KEY)
            .map_err(|err| DeviceError::Unavailable(err.to_string()))?
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0);
        let next = current + 1;
        self.store
            .set(SEQUENCE_KEY, &next.to_string())
            .map_err(|err| DeviceError::Unavailable(err.to_string()))?;
        Ok(format!("desktop-{next}"))
    }
}

impl DeviceNotifier for DesktopDevice {
    fn request_permission(&self) -> Result<PermissionStatus, DeviceError> {
        Ok(self.permission)
    }

    fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), DeviceError> {
        let mut channels = self.channels.lock();
        if !channels.iter().any(|existing| existing.id == channel.id) {
            debug!(channel = %channel.id, importance = ?channel.importance, "channel registered");
            channels.push(channel.clone());
        }
        Ok(())
    }

    fn schedule_at(
        &self,
        trigger: DateTime<Utc>,
        content: &NotificationContent,
        payload: serde_json::Value,
    ) -> Result<String, DeviceError> {
        let _guard = self.pending_lock.lock();
        let mut pending = self.load_pending()?;
        let handle = self.next_handle()?;
        pending.push(PendingReminder {
            handle: handle.clone(),
            content: content.clone(),
            trigger,
            payload,
        });
        self.save_pending(&pending)?;
        info!(%handle, %trigger, "desktop reminder queued");
        Ok(handle)
    }

    fn pending(&self) -> Result<Vec<PendingReminder>, DeviceError> {
        let _guard = self.pending_lock.lock();
        self.load_pending()
    }

    fn set_delivery_handler(&self, handler: DeliveryHandler) -> Result<(), DeviceError> {
        *self.handler.lock() = Some(handler);
        Ok(())
    }

    fn set_badge_count(&self, count: usize) -> Result<(), DeviceError> {
        self.store
            .set(BADGE_KEY, &count.to_string())
            .map_err(|err| DeviceError::Unavailable(err.to_string()))
    }
}
