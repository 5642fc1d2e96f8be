pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod listeners;
pub mod record;
pub mod reminder;
pub mod service;
pub mod store;

pub use crate::error::{DeviceError, NoticeError, StoreError};
pub use crate::record::{EventId, NotificationRecord};
pub use crate::reminder::{ReminderRequest, ScheduleOutcome};
pub use crate::service::{DeliveryMode, NotificationCenter, NotificationCenterBuilder};
