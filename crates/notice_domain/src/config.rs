use chrono::Duration;

use crate::device::{ChannelSpec, Importance};

/// Store key holding the notification log.
pub const DEFAULT_LOG_KEY: &str = "notifications";
pub const DEFAULT_CHANNEL_ID: &str = "default";
pub const DEFAULT_LEAD_MINUTES: i64 = 10;

#[derive(Debug, Clone)]
pub struct CenterConfig {
    /// How long before an event its reminder fires.
    pub lead_time: Duration,
    pub channel: ChannelSpec,
    pub log_key: String,
    /// Oldest records beyond this many are dropped on append. `None` keeps everything.
    pub max_records: Option<usize>,
}

impl Default for CenterConfig {
    fn default() -> Self {
        Self {
            lead_time: Duration::minutes(DEFAULT_LEAD_MINUTES),
            channel: ChannelSpec {
                id: DEFAULT_CHANNEL_ID.to_string(),
                name: "Default".to_string(),
                importance: Importance::Max,
            },
            log_key: DEFAULT_LOG_KEY.to_string(),
            max_records: None,
        }
    }
}
