//! Notifications
//!
//! The inbox of a user, filled by the reminder scheduler and by API clients

use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::reminders::TimeOfDay;

/// Default amount of notifications in a single page
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Maximum amount of notifications in a single page
pub const MAX_PAGE_SIZE: usize = 100;

/// Kind of notification
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Reminder,
    SugarAlert,
    FootHealth,
    Medication,
    #[default]
    System,
    Achievement,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::SugarAlert => "sugar_alert",
            Self::FootHealth => "foot_health",
            Self::Medication => "medication",
            Self::System => "system",
            Self::Achievement => "achievement",
        }
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "reminder" => Ok(Self::Reminder),
            "sugar_alert" => Ok(Self::SugarAlert),
            "foot_health" => Ok(Self::FootHealth),
            "medication" => Ok(Self::Medication),
            "system" => Ok(Self::System),
            "achievement" => Ok(Self::Achievement),
            _ => Err(format!("Unknown notification type: {value}")),
        }
    }
}

/// A notification in the inbox of a user
///
/// `is_sent` implies `sent_at` is set
#[derive(Clone, Debug)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub notification_type: NotificationType,
    /// Opaque payload, also sent along with the push message
    pub data: Option<Value>,
    pub is_read: bool,
    pub is_sent: bool,
    pub scheduled_at: Option<NaiveDateTime>,
    pub sent_at: Option<NaiveDateTime>,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

/// Which notifications a user wants to receive
///
/// Stored and served for the clients, the reminder scheduler does not consult them
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct NotificationPreferences {
    pub user_id: Uuid,
    pub reminder_notifications: bool,
    pub sugar_alerts: bool,
    pub foot_health_notifications: bool,
    pub medication_reminders: bool,
    pub system_notifications: bool,
    pub achievement_notifications: bool,
    pub quiet_hours_start: TimeOfDay,
    pub quiet_hours_end: TimeOfDay,
    pub quiet_hours_enabled: bool,
}

impl NotificationPreferences {
    /// Preferences of a user that never changed them
    pub fn defaults(user_id: Uuid) -> Self {
        Self {
            user_id,
            reminder_notifications: true,
            sugar_alerts: true,
            foot_health_notifications: true,
            medication_reminders: true,
            system_notifications: true,
            achievement_notifications: true,
            quiet_hours_start: TimeOfDay::new(22, 0).unwrap_or_default(),
            quiet_hours_end: TimeOfDay::new(7, 0).unwrap_or_default(),
            quiet_hours_enabled: false,
        }
    }
}

/// Clamp a requested page size to the accepted range
pub fn page_size(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}
