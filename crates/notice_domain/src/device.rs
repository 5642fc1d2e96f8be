use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Importance {
    Low,
    Default,
    High,
    Max,
}

/// Named delivery channel. Android groups notifications by channel; other
/// platforms are free to ignore it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelSpec {
    pub id: String,
    pub name: String,
    pub importance: Importance,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

/// A reminder the device has accepted and not yet fired.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingReminder {
    pub handle: String,
    pub content: NotificationContent,
    pub trigger: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// What the device hands back when a notification fires or is received while
/// the process is running.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredNotification {
    pub identifier: String,
    pub content: NotificationContent,
    pub payload: serde_json::Value,
}

pub type DeliveryHandler = Arc<dyn Fn(DeliveredNotification) + Send + Sync>;

/// Platform notification capability consumed by the notification center.
pub trait DeviceNotifier: Send + Sync {
    fn request_permission(&self) -> Result<PermissionStatus, DeviceError>;
    fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), DeviceError>;
    /// Returns the device-assigned handle of the new reminder.
    fn schedule_at(
        &self,
        trigger: DateTime<Utc>,
        content: &NotificationContent,
        payload: serde_json::Value,
    ) -> Result<String, DeviceError>;
    fn pending(&self) -> Result<Vec<PendingReminder>, DeviceError>;
    fn set_delivery_handler(&self, handler: DeliveryHandler) -> Result<(), DeviceError>;
    fn set_badge_count(&self, count: usize) -> Result<(), DeviceError>;
}

/// Switches that make individual [`MemoryDevice`] calls fail.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFaults {
    pub permission: bool,
    pub channel: bool,
    pub schedule: bool,
    pub pending: bool,
    pub badge: bool,
}

#[derive(Debug, Default)]
struct MemoryDeviceState {
    pending: Vec<PendingReminder>,
    channels: Vec<ChannelSpec>,
    badge: Option<usize>,
    next_handle: u64,
}

/// In-process device notification service.
pub struct MemoryDevice {
    permission: PermissionStatus,
    state: Mutex<MemoryDeviceState>,
    handler: Mutex<Option<DeliveryHandler>>,
    faults: Mutex<DeviceFaults>,
}

impl Default for MemoryDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::with_permission(PermissionStatus::Granted)
    }

    pub fn with_permission(permission: PermissionStatus) -> Self {
        Self {
            permission,
            state: Mutex::new(MemoryDeviceState::default()),
            handler: Mutex::new(None),
            faults: Mutex::new(DeviceFaults::default()),
        }
    }

    pub fn set_faults(&self, faults: DeviceFaults) {
        *self.faults.lock() = faults;
    }

    pub fn pending_snapshot(&self) -> Vec<PendingReminder> {
        self.state.lock().pending.clone()
    }

    pub fn badge(&self) -> Option<usize> {
        self.state.lock().badge
    }

    pub fn channels(&self) -> Vec<ChannelSpec> {
        self.state.lock().channels.clone()
    }

    pub fn has_delivery_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Fires every pending reminder whose trigger is at or before `now`, in
    /// trigger order. Returns how many fired.
    pub fn fire_due(&self, now: DateTime<Utc>) -> usize {
        let mut due = {
            let mut state = self.state.lock();
            let (due, remaining): (Vec<_>, Vec<_>) = state
                .pending
                .drain(..)
                .partition(|reminder| reminder.trigger <= now);
            state.pending = remaining;
            due
        };
        due.sort_by_key(|reminder| reminder.trigger);
        let fired = due.len();
        for reminder in due {
            self.deliver(DeliveredNotification {
                identifier: reminder.handle,
                content: reminder.content,
                payload: reminder.payload,
            });
        }
        fired
    }

    /// Hands a notification to the registered handler, as the OS does when
    /// one arrives while the app is running. Returns false without a handler.
    pub fn deliver(&self, delivered: DeliveredNotification) -> bool {
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => {
                handler(delivered);
                true
            }
            None => false,
        }
    }

    fn faults(&self) -> DeviceFaults {
        *self.faults.lock()
    }
}

impl DeviceNotifier for MemoryDevice {
    fn request_permission(&self) -> Result<PermissionStatus, DeviceError> {
        if self.faults().permission {
            return Err(DeviceError::Unavailable("permission prompt failed".into()));
        }
        Ok(self.permission)
    }

    fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), DeviceError> {
        if self.faults().channel {
            return Err(DeviceError::Rejected(format!(
                "channel `{}` not created",
                channel.id
            )));
        }
        let mut state = self.state.lock();
        if let Some(existing) = state.channels.iter_mut().find(|c| c.id == channel.id) {
            *existing = channel.clone();
        } else {
            state.channels.push(channel.clone());
        }
        Ok(())
    }

    fn schedule_at(
        &self,
        trigger: DateTime<Utc>,
        content: &NotificationContent,
        payload: serde_json::Value,
    ) -> Result<String, DeviceError> {
        if self.faults().schedule {
            return Err(DeviceError::Rejected("scheduling refused".into()));
        }
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = format!("reminder-{}", state.next_handle);
        state.pending.push(PendingReminder {
            handle: handle.clone(),
            content: content.clone(),
            trigger,
            payload,
        });
        Ok(handle)
    }

    fn pending(&self) -> Result<Vec<PendingReminder>, DeviceError> {
        if self.faults().pending {
            return Err(DeviceError::Unavailable("pending list unavailable".into()));
        }
        Ok(self.pending_snapshot())
    }

    fn set_delivery_handler(&self, handler: DeliveryHandler) -> Result<(), DeviceError> {
        *self.handler.lock() = Some(handler);
        Ok(())
    }

    fn set_badge_count(&self, count: usize) -> Result<(), DeviceError> {
        if self.faults().badge {
            return Err(DeviceError::Unavailable("badge api unavailable".into()));
        }
        self.state.lock().badge = Some(count);
        Ok(())
    }
}
