use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use notice_domain::{
    config::{CenterConfig, DEFAULT_LEAD_MINUTES},
    device::{DeviceNotifier, PermissionStatus},
    reminder::payload_event_id,
    store::FileStore,
    NotificationCenter, ReminderRequest, ScheduleOutcome,
};
use tracing::{debug, info};

use crate::desktop::DesktopDevice;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) data_dir: PathBuf,
    pub(crate) lead_minutes: i64,
    pub(crate) channel_name: String,
    pub(crate) max_records: Option<usize>,
    pub(crate) desktop_popups: bool,
    pub(crate) delivery_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    /// Builds a config from any key lookup; unparsable values keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup("NOTICE_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir.trim());
            }
        }
        if let Some(lead) = lookup("NOTICE_LEAD_MINUTES") {
            if let Ok(value) = lead.trim().parse::<i64>() {
                if value >= 0 && Duration::try_minutes(value).is_some() {
                    config.lead_minutes = value;
                }
            }
        }
        if let Some(name) = lookup("NOTICE_CHANNEL") {
            if !name.trim().is_empty() {
                config.channel_name = name.trim().to_string();
            }
        }
        if let Some(max) = lookup("NOTICE_MAX_RECORDS") {
            if let Ok(value) = max.trim().parse::<usize>() {
                config.max_records = (value > 0).then_some(value);
            }
        }
        if let Some(flag) = lookup("NOTICE_DESKTOP_POPUPS") {
            if let Some(value) = parse_flag(&flag) {
                config.desktop_popups = value;
            }
        }
        if let Some(flag) = lookup("NOTICE_DELIVERY") {
            if let Some(value) = parse_flag(&flag) {
                config.delivery_enabled = value;
            }
        }
        config
    }

    pub fn center_config(&self) -> CenterConfig {
        let mut center = CenterConfig {
            lead_time: Duration::try_minutes(self.lead_minutes)
                .unwrap_or_else(|| Duration::minutes(DEFAULT_LEAD_MINUTES)),
            max_records: self.max_records,
            ..CenterConfig::default()
        };
        center.channel.name = self.channel_name.clone();
        center
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("notice"),
            lead_minutes: DEFAULT_LEAD_MINUTES,
            channel_name: "Event reminders".to_string(),
            max_records: None,
            desktop_popups: true,
            delivery_enabled: true,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Parser, Debug)]
#[command(name = "notice")]
#[command(about = "Event reminders and a local notification inbox")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the notification log (overrides NOTICE_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the notification log, newest first
    List,
    /// Schedule a reminder ahead of an event
    Schedule(ScheduleArgs),
    /// Print reminders waiting to fire
    Pending,
    /// Mark one notification as read
    MarkRead {
        /// Notification id as printed by `list`
        id: String,
    },
    /// Mark every notification as read
    MarkAllRead,
    /// Delete the whole notification log
    Clear,
    /// Recompute and print the unread badge count
    Badge,
    /// Deliver due reminders, polling until interrupted
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct ScheduleArgs {
    #[arg(long)]
    pub event_id: String,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub body: String,
    /// Event start time (RFC 3339, e.g. 2025-11-07T18:30:00+01:00)
    #[arg(long)]
    pub at: String,
    /// Notification category stored with the reminder
    #[arg(long)]
    pub kind: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Seconds between checks for due reminders
    #[arg(long, default_value_t = 30)]
    pub poll_secs: u64,
    /// Check once and exit
    #[arg(long)]
    pub once: bool,
}

pub fn run(cli: Cli, mut config: AppConfig) -> Result<()> {
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    let store = Arc::new(
        FileStore::open(&config.data_dir)
            .with_context(|| format!("failed to open store at {}", config.data_dir.display()))?,
    );
    info!(data_dir = %store.root().display(), "opened notification store");
    let permission = if config.delivery_enabled {
        PermissionStatus::Granted
    } else {
        PermissionStatus::Denied
    };
    let device = Arc::new(DesktopDevice::new(
        store.clone(),
        config.desktop_popups,
        permission,
    ));
    let center = NotificationCenter::builder()
        .with_store(store)
        .with_device(device.clone())
        .with_config(config.center_config())
        .build();
    let mode = center.initialize();
    debug!(
        ?mode,
        lead_minutes = center.config().lead_time.num_minutes(),
        "delivery mode"
    );

    match cli.command {
        Command::List => {
            let records = center.get_all();
            if records.is_empty() {
                println!("No notifications.");
            }
            for record in records {
                let marker = if record.read { " " } else { "*" };
                println!(
                    "{marker} {}  {}  {}: {}",
                    record.id,
                    record.date.to_rfc3339(),
                    record.title,
                    record.body
                );
            }
        }
        Command::Schedule(args) => {
            let mut request =
                ReminderRequest::from_iso(args.event_id, args.title, args.body, &args.at)
                    .context("invalid --at value")?;
            if let Some(kind) = args.kind {
                request = request.with_kind(kind);
            }
            let outcome = center
                .schedule_event_notification(request)
                .context("failed to schedule reminder")?;
            match outcome {
                ScheduleOutcome::Scheduled { handle, trigger } => {
                    println!("Scheduled {handle} for {}", trigger.to_rfc3339());
                }
                ScheduleOutcome::PastDue { trigger } => {
                    println!("Not scheduled: reminder time {} has passed", trigger.to_rfc3339());
                }
                ScheduleOutcome::AlreadyPending { handle } => {
                    println!("Not scheduled: {handle} is already pending for this event");
                }
            }
        }
        Command::Pending => {
            let pending = device.pending().context("failed to list pending reminders")?;
            if pending.is_empty() {
                println!("No pending reminders.");
            }
            for reminder in pending {
                let event = payload_event_id(&reminder.payload)
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {}  event {}  {}",
                    reminder.handle,
                    reminder.trigger.to_rfc3339(),
                    event,
                    reminder.content.title
                );
            }
        }
        Command::MarkRead { id } => {
            if center.mark_read(&id).context("failed to update log")? {
                println!("Marked {id} as read.");
            } else {
                println!("Nothing to mark: {id} is unknown or already read.");
            }
        }
        Command::MarkAllRead => {
            let flipped = center.mark_all_read().context("failed to update log")?;
            println!("Marked {flipped} notification(s) as read.");
        }
        Command::Clear => {
            center.clear_all().context("failed to clear log")?;
            println!("Notification log cleared.");
        }
        Command::Badge => {
            println!("{}", center.update_badge_count());
        }
        Command::Run(args) => loop {
            let fired = device
                .fire_due(Utc::now())
                .context("failed to deliver due reminders")?;
            if fired > 0 {
                info!(fired, unread = center.unread_count(), "delivered due reminders");
            }
            if args.once {
                break;
            }
            std::thread::sleep(StdDuration::from_secs(args.poll_secs.max(1)));
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults_and_ignores_garbage() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("NOTICE_DATA_DIR", "/tmp/notice-test"),
            ("NOTICE_LEAD_MINUTES", "15"),
            ("NOTICE_MAX_RECORDS", "200"),
            ("NOTICE_DESKTOP_POPUPS", "off"),
            ("NOTICE_DELIVERY", "maybe"),
        ]);
        let config = AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/notice-test"));
        assert_eq!(config.lead_minutes, 15);
        assert_eq!(config.max_records, Some(200));
        assert!(!config.desktop_popups);
        assert!(config.delivery_enabled);

        let center = config.center_config();
        assert_eq!(center.lead_time, Duration::minutes(15));
        assert_eq!(center.channel.name, "Event reminders");
    }

    #[test]
    fn defaults_use_ten_minute_lead() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.center_config().lead_time, Duration::minutes(10));
        assert_eq!(config.max_records, None);
    }

    #[test]
    fn lead_minutes_out_of_range_keep_the_default() {
        for raw in ["9223372036854775807", "-5"] {
            let config = AppConfig::from_lookup(|key| {
                (key == "NOTICE_LEAD_MINUTES").then(|| raw.to_string())
            });
            assert_eq!(config.lead_minutes, DEFAULT_LEAD_MINUTES);
            assert_eq!(config.center_config().lead_time, Duration::minutes(10));
        }

        let config = AppConfig {
            lead_minutes: i64::MAX,
            ..AppConfig::default()
        };
        assert_eq!(config.center_config().lead_time, Duration::minutes(10));
    }

    #[test]
    fn delivery_flag_off_disables_delivery() {
        let config =
            AppConfig::from_lookup(|key| (key == "NOTICE_DELIVERY").then(|| "off".to_string()));
        assert!(!config.delivery_enabled);
    }

    #[test]
    fn cli_parses_schedule_arguments() {
        let cli = Cli::try_parse_from([
            "notice",
            "schedule",
            "--event-id",
            "42",
            "--title",
            "Gig",
            "--body",
            "Soundcheck",
            "--at",
            "2025-11-07T18:30:00Z",
        ])
        .expect("parse");
        match cli.command {
            Command::Schedule(args) => {
                assert_eq!(args.event_id, "42");
                assert!(args.kind.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn scheduled_reminder_stays_pending_until_due() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::from_lookup(|_| None);
        config.data_dir = temp.path().to_path_buf();
        config.desktop_popups = false;

        let at = (Utc::now() + Duration::hours(2)).to_rfc3339();
        let schedule = Cli::try_parse_from([
            "notice", "schedule", "--event-id", "42", "--title", "Gig", "--body", "Soundcheck",
            "--at", at.as_str(),
        ])
        .expect("parse");
        run(schedule, config.clone()).expect("schedule");

        let store = FileStore::open(temp.path()).expect("store");
        let device = DesktopDevice::new(Arc::new(store), false, PermissionStatus::Granted);
        let pending = device.pending().expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload["eventId"], "42");

        let once = Cli::try_parse_from(["notice", "run", "--once"]).expect("parse");
        run(once, config).expect("run once");
        assert_eq!(device.pending().expect("pending").len(), 1);
    }
}
