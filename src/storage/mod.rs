//! All things related to the storage of users and their health data

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::devices::DeviceReading;
use crate::devices::UserDevice;
use crate::foot_health::FootHealthRecord;
use crate::notifications::Notification;
use crate::notifications::NotificationPreferences;
use crate::notifications::NotificationType;
use crate::reminders::Reminder;
use crate::reminders::ReminderCategory;
use crate::reminders::TimeOfDay;
use crate::reminders::WeekdaySet;
use crate::sugar::ReadingType;
use crate::sugar::SugarReading;
use crate::users::DiabetesType;
use crate::users::Gender;
use crate::users::User;

pub use memory::Memory;
#[cfg(feature = "postgres")]
pub use postgres::Postgres;

#[cfg_attr(all(feature = "postgres", not(test)), allow(dead_code))]
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

/// Setup the storage
#[cfg(not(feature = "postgres"))]
#[allow(clippy::unused_async)]
pub async fn setup() -> Result<Memory> {
    tracing::warn!("Using in-memory storage, all data is lost on shutdown");

    Ok(Memory::new())
}

/// Setup the storage
#[cfg(feature = "postgres")]
pub async fn setup() -> Result<Postgres> {
    Postgres::new().await
}

/// Storage errors
#[derive(Debug, Error)]
pub enum Error {
    /// A connection error with the storage
    #[error("Connection error: {0}")]
    Connection(String),

    /// Stored data could not be turned into a domain type
    #[error("Corrupt data: {0}")]
    Corrupt(String),
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Values to create a User
pub struct CreateUserValues<'a> {
    /// The initial session ID for the user
    pub session_id: &'a Uuid,

    /// The email, already normalized
    pub email: &'a str,

    /// The display name
    pub name: &'a str,

    /// The hashed password
    pub hashed_password: &'a str,

    /// The push token of the device the user registered with
    pub fcm_token: Option<&'a str>,

    /// Access to the developer dashboard
    pub is_developer: bool,
}

/// Values to update a User
///
/// Only the fields that are set are changed
#[derive(Default)]
pub struct UpdateUserValues<'a> {
    /// New session ID to invalidate current tokens
    pub session_id: Option<&'a Uuid>,

    /// New push token
    pub fcm_token: Option<&'a str>,

    /// Moment of the last login
    pub last_active: Option<NaiveDateTime>,

    pub name: Option<&'a str>,
    pub profile_image: Option<&'a str>,
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    pub diabetes_type: Option<DiabetesType>,
    pub diagnosis_year: Option<i32>,

    /// Replaces the complete list of medications
    pub medications: Option<&'a [String]>,
}

/// Values to create a Reminder
pub struct CreateReminderValues<'a> {
    pub user_id: &'a Uuid,
    pub title: &'a str,
    pub category: ReminderCategory,
    pub time: TimeOfDay,
    pub days: WeekdaySet,
    pub notes: Option<&'a str>,
}

/// Values to update a Reminder
///
/// Only the fields that are set are changed
#[derive(Default)]
pub struct UpdateReminderValues<'a> {
    pub title: Option<&'a str>,
    pub category: Option<ReminderCategory>,
    pub time: Option<TimeOfDay>,
    pub days: Option<WeekdaySet>,
    pub notes: Option<&'a str>,
    pub is_active: Option<bool>,
}

/// Values to create a Notification
pub struct CreateNotificationValues<'a> {
    pub user_id: &'a Uuid,
    pub title: &'a str,
    pub body: &'a str,
    pub notification_type: NotificationType,
    pub data: Option<&'a Value>,

    /// When set, the notification is marked as sent at that moment
    pub sent_at: Option<NaiveDateTime>,

    pub scheduled_at: Option<NaiveDateTime>,
}

/// Filter for a page of notifications, newest first
pub struct NotificationFilter {
    pub limit: usize,
    pub offset: usize,
    pub unread_only: bool,
}

/// Values to create a sugar reading
pub struct CreateSugarReadingValues<'a> {
    pub user_id: &'a Uuid,
    pub value: f64,
    pub reading_type: ReadingType,
    pub notes: Option<&'a str>,
    pub timestamp: NaiveDateTime,
}

/// Values to create a foot health record
pub struct CreateFootHealthValues<'a> {
    pub user_id: &'a Uuid,
    pub date: NaiveDate,
    pub steps: u32,
    pub rollers: u32,
    pub resisted_exercise: u32,
    pub notes: Option<&'a str>,
}

/// Values to update a foot health record
///
/// Only the fields that are set are changed
#[derive(Default)]
pub struct UpdateFootHealthValues<'a> {
    pub steps: Option<u32>,
    pub rollers: Option<u32>,
    pub resisted_exercise: Option<u32>,
    pub notes: Option<&'a str>,
}

/// Values to store a telemetry message of a device
pub struct CreateDeviceReadingValues<'a> {
    pub user_id: &'a Uuid,
    pub device_id: &'a str,
    pub patient_id: Option<&'a str>,
    pub session_id: &'a str,
    pub exercise: &'a str,
    pub angle_deg: Option<f64>,
    pub force_n: Option<f64>,
    pub velocity: Option<f64>,
    pub current_reps: i32,
    pub target_reps: i32,
    pub battery: Option<i32>,
    pub device_timestamp: NaiveDateTime,
}

/// Filter for device readings, newest first
#[derive(Default)]
pub struct DeviceReadingFilter<'a> {
    pub session_id: Option<&'a str>,
    pub exercise: Option<&'a str>,
    pub limit: Option<usize>,
}

/// Storage with all supported operations
///
/// Every lookup by ID is scoped to the owning user
#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    /// Find the first developer account
    async fn find_developer_user(&self) -> Result<Option<User>>;

    /// Finds all users, newest first
    async fn find_all_users(&self) -> Result<Vec<User>>;

    /// Finds a single user by its (normalized) email
    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Finds a single user by its ID
    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>>;

    /// Create a single user
    async fn create_user(&self, values: &CreateUserValues) -> Result<User>;

    /// Update a user
    async fn update_user(&self, user: &User, values: &UpdateUserValues) -> Result<User>;

    /// Find all reminders of a user, newest first
    async fn find_all_reminders_by_user(&self, user_id: &Uuid) -> Result<Vec<Reminder>>;

    /// Find the active reminders of all users
    async fn find_all_active_reminders(&self) -> Result<Vec<Reminder>>;

    /// Find a single reminder of a user
    async fn find_single_reminder_by_id(
        &self,
        user_id: &Uuid,
        reminder_id: &Uuid,
    ) -> Result<Option<Reminder>>;

    /// Create a reminder, active from the start
    async fn create_reminder(&self, values: &CreateReminderValues) -> Result<Reminder>;

    /// Update a reminder
    async fn update_reminder(
        &self,
        reminder: &Reminder,
        values: &UpdateReminderValues,
    ) -> Result<Reminder>;

    /// Delete a reminder
    async fn delete_reminder(&self, reminder: &Reminder) -> Result<()>;

    /// Find a page of notifications of a user, newest first
    async fn find_notifications_by_user(
        &self,
        user_id: &Uuid,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>>;

    /// Count the unread notifications of a user
    async fn count_unread_notifications(&self, user_id: &Uuid) -> Result<u64>;

    /// Find a single notification of a user
    async fn find_single_notification_by_id(
        &self,
        user_id: &Uuid,
        notification_id: &Uuid,
    ) -> Result<Option<Notification>>;

    /// Create a notification
    async fn create_notification(&self, values: &CreateNotificationValues) -> Result<Notification>;

    /// Mark a notification as read
    async fn mark_notification_read(
        &self,
        notification: &Notification,
        read_at: NaiveDateTime,
    ) -> Result<Notification>;

    /// Mark all unread notifications of a user as read, returns the amount changed
    async fn mark_all_notifications_read(
        &self,
        user_id: &Uuid,
        read_at: NaiveDateTime,
    ) -> Result<u64>;

    /// Delete a notification
    async fn delete_notification(&self, notification: &Notification) -> Result<()>;

    /// Delete all notifications of a user, returns the amount deleted
    async fn delete_all_notifications(&self, user_id: &Uuid) -> Result<u64>;

    /// Find the notification preferences of a user
    async fn find_notification_preferences(
        &self,
        user_id: &Uuid,
    ) -> Result<Option<NotificationPreferences>>;

    /// Create or replace the notification preferences of a user
    async fn save_notification_preferences(
        &self,
        preferences: &NotificationPreferences,
    ) -> Result<NotificationPreferences>;

    /// Find all sugar readings of a user, newest first
    async fn find_sugar_readings_by_user(&self, user_id: &Uuid) -> Result<Vec<SugarReading>>;

    /// Find a single sugar reading of a user
    async fn find_single_sugar_reading_by_id(
        &self,
        user_id: &Uuid,
        reading_id: &Uuid,
    ) -> Result<Option<SugarReading>>;

    /// Create a sugar reading
    async fn create_sugar_reading(&self, values: &CreateSugarReadingValues)
    -> Result<SugarReading>;

    /// Delete a sugar reading
    async fn delete_sugar_reading(&self, reading: &SugarReading) -> Result<()>;

    /// Find all foot health records of a user, newest date first
    async fn find_foot_health_records_by_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<FootHealthRecord>>;

    /// Find a single foot health record of a user
    async fn find_single_foot_health_record_by_id(
        &self,
        user_id: &Uuid,
        record_id: &Uuid,
    ) -> Result<Option<FootHealthRecord>>;

    /// Find the foot health record of a user on a date
    async fn find_foot_health_record_by_date(
        &self,
        user_id: &Uuid,
        date: NaiveDate,
    ) -> Result<Option<FootHealthRecord>>;

    /// Create a foot health record
    async fn create_foot_health_record(
        &self,
        values: &CreateFootHealthValues,
    ) -> Result<FootHealthRecord>;

    /// Update a foot health record
    async fn update_foot_health_record(
        &self,
        record: &FootHealthRecord,
        values: &UpdateFootHealthValues,
    ) -> Result<FootHealthRecord>;

    /// Delete a foot health record
    async fn delete_foot_health_record(&self, record: &FootHealthRecord) -> Result<()>;

    /// Store a telemetry message
    async fn create_device_reading(
        &self,
        values: &CreateDeviceReadingValues,
    ) -> Result<DeviceReading>;

    /// Find telemetry of a user, newest first
    async fn find_device_readings(
        &self,
        user_id: &Uuid,
        filter: &DeviceReadingFilter,
    ) -> Result<Vec<DeviceReading>>;

    /// Delete all telemetry of a session, returns the amount deleted
    async fn delete_device_session(&self, user_id: &Uuid, session_id: &str) -> Result<u64>;

    /// Find the devices of a user, most recently seen first
    async fn find_user_devices(&self, user_id: &Uuid) -> Result<Vec<UserDevice>>;

    /// Create or update a device of a user
    ///
    /// The name is only changed when `device_name` is `Some`
    async fn save_user_device(
        &self,
        user_id: &Uuid,
        device_id: &str,
        device_name: Option<Option<&str>>,
        last_seen: NaiveDateTime,
    ) -> Result<UserDevice>;
}
