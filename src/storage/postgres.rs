//! Postgres storage

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use serde_json::Value;
use sqlx::FromRow;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::clock::now;
use crate::devices::DeviceReading;
use crate::devices::UserDevice;
use crate::foot_health::FootHealthRecord;
use crate::notifications::Notification;
use crate::notifications::NotificationPreferences;
use crate::reminders::Reminder;
use crate::reminders::WeekdaySet;
use crate::sugar::SugarReading;
use crate::users::DiabetesType;
use crate::users::Gender;
use crate::users::User;

use super::CreateDeviceReadingValues;
use super::CreateFootHealthValues;
use super::CreateNotificationValues;
use super::CreateReminderValues;
use super::CreateSugarReadingValues;
use super::CreateUserValues;
use super::DeviceReadingFilter;
use super::Error;
use super::NotificationFilter;
use super::Result;
use super::Storage;
use super::UpdateFootHealthValues;
use super::UpdateReminderValues;
use super::UpdateUserValues;

/// Migrator to run migrations on startup
static MIGRATOR: Migrator = sqlx::migrate!();

const USER_COLUMNS: &str = "id, session_id, email, name, hashed_password, fcm_token, \
    profile_image, age, gender, diabetes_type, diagnosis_year, is_developer, created_at, \
    last_active";

const REMINDER_COLUMNS: &str =
    "id, user_id, title, reminder_type, time, days, notes, is_active, created_at";

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, body, notification_type, data, \
    is_read, is_sent, scheduled_at, sent_at, read_at, created_at";

const PREFERENCES_COLUMNS: &str = "user_id, reminder_notifications, sugar_alerts, \
    foot_health_notifications, medication_reminders, system_notifications, \
    achievement_notifications, quiet_hours_start, quiet_hours_end, quiet_hours_enabled";

const SUGAR_READING_COLUMNS: &str = "id, user_id, value, reading_type, notes, timestamp";

const FOOT_HEALTH_COLUMNS: &str =
    "id, user_id, date, steps, rollers, resisted_exercise, notes";

const DEVICE_READING_COLUMNS: &str = "id, user_id, device_id, patient_id, session_id, \
    exercise, angle_deg, force_n, velocity, current_reps, target_reps, battery, \
    device_timestamp, created_at";

const USER_DEVICE_COLUMNS: &str = "id, user_id, device_id, device_name, last_seen";

/// Postgres storage
#[derive(Clone)]
pub struct Postgres {
    /// Pool of connections
    connection_pool: PgPool,
}

impl Postgres {
    /// Create Postgres storage
    ///
    /// Use the `DATABASE_URL` environment variable
    ///
    /// Migrations will be run
    pub async fn new() -> Result<Self> {
        let database_connection_string = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Connection("`DATABASE_URL` is not set".to_string()))?;

        let connection_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_connection_string)
            .await
            .map_err(connection_error)?;

        Self::new_with_pool(connection_pool).await
    }

    /// Create Postgres storage with existing pool
    ///
    /// Migrations will be run
    pub async fn new_with_pool(connection_pool: PgPool) -> Result<Self> {
        MIGRATOR
            .run(&connection_pool)
            .await
            .map_err(|err| Error::Connection(format!("Migrations could not run: {err}")))?;

        Ok(Self { connection_pool })
    }

    /// Medications of the given users, by user ID
    async fn find_medications(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<String>>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            r"
            SELECT user_id, medication_name
            FROM medications
            WHERE user_id = ANY($1)
            ORDER BY created_at, medication_name
            ",
        )
        .bind(user_ids)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        let mut medications = HashMap::<Uuid, Vec<String>>::new();
        for (user_id, name) in rows {
            medications.entry(user_id).or_default().push(name);
        }

        Ok(medications)
    }

    /// Attach the medications to the users
    async fn with_medications(&self, users: Vec<PostgresUser>) -> Result<Vec<User>> {
        let ids = users.iter().map(|user| user.id).collect::<Vec<_>>();
        let mut medications = self.find_medications(&ids).await?;

        users
            .into_iter()
            .map(|user| {
                let user_medications = medications.remove(&user.id).unwrap_or_default();
                user.into_user(user_medications)
            })
            .collect()
    }

    /// Attach the medications to a single optional user
    async fn with_medications_optional(&self, user: Option<PostgresUser>) -> Result<Option<User>> {
        match user {
            Some(user) => Ok(self.with_medications(vec![user]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn fetch_user_where(&self, condition: &str, bind: UserKey<'_>) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {condition} LIMIT 1");

        let query = sqlx::query_as::<_, PostgresUser>(&query);
        let query = match bind {
            UserKey::Id(id) => query.bind(*id),
            UserKey::Email(email) => query.bind(email),
            UserKey::None => query,
        };

        let user = query
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        self.with_medications_optional(user).await
    }
}

/// Key to look up a single user
enum UserKey<'a> {
    Id(&'a Uuid),
    Email(&'a str),
    None,
}

/// Postgres version of user
#[derive(FromRow)]
struct PostgresUser {
    id: Uuid,
    session_id: Uuid,
    email: String,
    name: String,
    hashed_password: String,
    fcm_token: Option<String>,
    profile_image: Option<String>,
    age: Option<i16>,
    gender: Option<String>,
    diabetes_type: Option<String>,
    diagnosis_year: Option<i32>,
    is_developer: bool,
    created_at: NaiveDateTime,
    last_active: Option<NaiveDateTime>,
}

impl PostgresUser {
    /// Create user from postgres version
    fn into_user(self, medications: Vec<String>) -> Result<User> {
        Ok(User {
            id: self.id,
            session_id: self.session_id,
            email: self.email,
            name: self.name,
            hashed_password: self.hashed_password,
            fcm_token: self.fcm_token,
            profile_image: self.profile_image,
            age: self.age.map(u8::try_from).transpose().map_err(corrupt)?,
            gender: self
                .gender
                .as_deref()
                .map(str::parse::<Gender>)
                .transpose()
                .map_err(corrupt)?,
            diabetes_type: self
                .diabetes_type
                .as_deref()
                .map(str::parse::<DiabetesType>)
                .transpose()
                .map_err(corrupt)?,
            diagnosis_year: self.diagnosis_year,
            medications,
            is_developer: self.is_developer,
            created_at: self.created_at,
            last_active: self.last_active,
        })
    }
}

/// Postgres version of reminder
#[derive(FromRow)]
struct PostgresReminder {
    id: Uuid,
    user_id: Uuid,
    title: String,
    reminder_type: String,
    time: String,
    days: i16,
    notes: Option<String>,
    is_active: bool,
    created_at: NaiveDateTime,
}

impl TryFrom<PostgresReminder> for Reminder {
    type Error = Error;

    fn try_from(reminder: PostgresReminder) -> Result<Self> {
        Ok(Self {
            id: reminder.id,
            user_id: reminder.user_id,
            title: reminder.title,
            category: reminder.reminder_type.parse().map_err(corrupt)?,
            time: reminder.time.parse().map_err(corrupt)?,
            days: WeekdaySet::from_bits(u8::try_from(reminder.days).map_err(corrupt)?),
            notes: reminder.notes,
            is_active: reminder.is_active,
            created_at: reminder.created_at,
        })
    }
}

/// Postgres version of notification
#[derive(FromRow)]
struct PostgresNotification {
    id: Uuid,
    user_id: Uuid,
    title: String,
    body: String,
    notification_type: String,
    data: Option<Value>,
    is_read: bool,
    is_sent: bool,
    scheduled_at: Option<NaiveDateTime>,
    sent_at: Option<NaiveDateTime>,
    read_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
}

impl TryFrom<PostgresNotification> for Notification {
    type Error = Error;

    fn try_from(notification: PostgresNotification) -> Result<Self> {
        Ok(Self {
            id: notification.id,
            user_id: notification.user_id,
            title: notification.title,
            body: notification.body,
            notification_type: notification.notification_type.parse().map_err(corrupt)?,
            data: notification.data,
            is_read: notification.is_read,
            is_sent: notification.is_sent,
            scheduled_at: notification.scheduled_at,
            sent_at: notification.sent_at,
            read_at: notification.read_at,
            created_at: notification.created_at,
        })
    }
}

/// Postgres version of notification preferences
#[derive(FromRow)]
#[allow(clippy::struct_excessive_bools)]
struct PostgresPreferences {
    user_id: Uuid,
    reminder_notifications: bool,
    sugar_alerts: bool,
    foot_health_notifications: bool,
    medication_reminders: bool,
    system_notifications: bool,
    achievement_notifications: bool,
    quiet_hours_start: String,
    quiet_hours_end: String,
    quiet_hours_enabled: bool,
}

impl TryFrom<PostgresPreferences> for NotificationPreferences {
    type Error = Error;

    fn try_from(preferences: PostgresPreferences) -> Result<Self> {
        Ok(Self {
            user_id: preferences.user_id,
            reminder_notifications: preferences.reminder_notifications,
            sugar_alerts: preferences.sugar_alerts,
            foot_health_notifications: preferences.foot_health_notifications,
            medication_reminders: preferences.medication_reminders,
            system_notifications: preferences.system_notifications,
            achievement_notifications: preferences.achievement_notifications,
            quiet_hours_start: preferences.quiet_hours_start.parse().map_err(corrupt)?,
            quiet_hours_end: preferences.quiet_hours_end.parse().map_err(corrupt)?,
            quiet_hours_enabled: preferences.quiet_hours_enabled,
        })
    }
}

/// Postgres version of sugar reading
#[derive(FromRow)]
struct PostgresSugarReading {
    id: Uuid,
    user_id: Uuid,
    value: f64,
    reading_type: String,
    notes: Option<String>,
    timestamp: NaiveDateTime,
}

impl TryFrom<PostgresSugarReading> for SugarReading {
    type Error = Error;

    fn try_from(reading: PostgresSugarReading) -> Result<Self> {
        Ok(Self {
            id: reading.id,
            user_id: reading.user_id,
            value: reading.value,
            reading_type: reading.reading_type.parse().map_err(corrupt)?,
            notes: reading.notes,
            timestamp: reading.timestamp,
        })
    }
}

/// Postgres version of foot health record
#[derive(FromRow)]
struct PostgresFootHealthRecord {
    id: Uuid,
    user_id: Uuid,
    date: NaiveDate,
    steps: i32,
    rollers: i32,
    resisted_exercise: i32,
    notes: Option<String>,
}

impl TryFrom<PostgresFootHealthRecord> for FootHealthRecord {
    type Error = Error;

    fn try_from(record: PostgresFootHealthRecord) -> Result<Self> {
        Ok(Self {
            id: record.id,
            user_id: record.user_id,
            date: record.date,
            steps: u32::try_from(record.steps).map_err(corrupt)?,
            rollers: u32::try_from(record.rollers).map_err(corrupt)?,
            resisted_exercise: u32::try_from(record.resisted_exercise).map_err(corrupt)?,
            notes: record.notes,
        })
    }
}

/// Postgres version of device reading
#[derive(FromRow)]
struct PostgresDeviceReading {
    id: Uuid,
    user_id: Uuid,
    device_id: String,
    patient_id: Option<String>,
    session_id: String,
    exercise: String,
    angle_deg: Option<f64>,
    force_n: Option<f64>,
    velocity: Option<f64>,
    current_reps: i32,
    target_reps: i32,
    battery: Option<i32>,
    device_timestamp: NaiveDateTime,
    created_at: NaiveDateTime,
}

impl From<PostgresDeviceReading> for DeviceReading {
    fn from(reading: PostgresDeviceReading) -> Self {
        Self {
            id: reading.id,
            user_id: reading.user_id,
            device_id: reading.device_id,
            patient_id: reading.patient_id,
            session_id: reading.session_id,
            exercise: reading.exercise,
            angle_deg: reading.angle_deg,
            force_n: reading.force_n,
            velocity: reading.velocity,
            current_reps: reading.current_reps,
            target_reps: reading.target_reps,
            battery: reading.battery,
            device_timestamp: reading.device_timestamp,
            created_at: reading.created_at,
        }
    }
}

/// Postgres version of user device
#[derive(FromRow)]
struct PostgresUserDevice {
    id: Uuid,
    user_id: Uuid,
    device_id: String,
    device_name: Option<String>,
    last_seen: NaiveDateTime,
}

impl From<PostgresUserDevice> for UserDevice {
    fn from(device: PostgresUserDevice) -> Self {
        Self {
            id: device.id,
            user_id: device.user_id,
            device_id: device.device_id,
            device_name: device.device_name,
            last_seen: device.last_seen,
        }
    }
}

/// Convert all rows, failing on the first corrupt one
fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = Error>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Counters are stored as `INTEGER`
fn counter(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(corrupt)
}

#[async_trait]
impl Storage for Postgres {
    async fn find_developer_user(&self) -> Result<Option<User>> {
        self.fetch_user_where("is_developer ORDER BY created_at", UserKey::None)
            .await
    }

    async fn find_all_users(&self) -> Result<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");

        let users = sqlx::query_as::<_, PostgresUser>(&query)
            .fetch_all(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        self.with_medications(users).await
    }

    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_user_where("email = $1", UserKey::Email(email))
            .await
    }

    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        self.fetch_user_where("id = $1", UserKey::Id(id)).await
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let query = format!(
            r"
            INSERT INTO users
                (id, session_id, email, name, hashed_password, fcm_token, is_developer, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "
        );

        let user = sqlx::query_as::<_, PostgresUser>(&query)
            .bind(Uuid::new_v4())
            .bind(values.session_id)
            .bind(values.email)
            .bind(values.name)
            .bind(values.hashed_password)
            .bind(values.fcm_token)
            .bind(values.is_developer)
            .bind(now())
            .fetch_one(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        user.into_user(Vec::new())
    }

    async fn update_user(&self, user: &User, values: &UpdateUserValues) -> Result<User> {
        let mut transaction = self
            .connection_pool
            .begin()
            .await
            .map_err(connection_error)?;

        let query = format!(
            r"
            UPDATE users
            SET
                session_id = COALESCE($2, session_id),
                fcm_token = COALESCE($3, fcm_token),
                last_active = COALESCE($4, last_active),
                name = COALESCE($5, name),
                profile_image = COALESCE($6, profile_image),
                age = COALESCE($7, age),
                gender = COALESCE($8, gender),
                diabetes_type = COALESCE($9, diabetes_type),
                diagnosis_year = COALESCE($10, diagnosis_year)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        );

        let updated_user = sqlx::query_as::<_, PostgresUser>(&query)
            .bind(user.id)
            .bind(values.session_id)
            .bind(values.fcm_token)
            .bind(values.last_active)
            .bind(values.name)
            .bind(values.profile_image)
            .bind(values.age.map(i16::from))
            .bind(values.gender.map(|gender| gender.as_str()))
            .bind(values.diabetes_type.map(|diabetes_type| diabetes_type.as_str()))
            .bind(values.diagnosis_year)
            .fetch_one(&mut *transaction)
            .await
            .map_err(connection_error)?;

        if let Some(medications) = values.medications {
            sqlx::query("DELETE FROM medications WHERE user_id = $1")
                .bind(user.id)
                .execute(&mut *transaction)
                .await
                .map_err(connection_error)?;

            for medication in medications {
                sqlx::query(
                    "INSERT INTO medications (id, user_id, medication_name, created_at) VALUES ($1, $2, $3, $4)",
                )
                .bind(Uuid::new_v4())
                .bind(user.id)
                .bind(medication)
                .bind(now())
                .execute(&mut *transaction)
                .await
                .map_err(connection_error)?;
            }
        }

        transaction.commit().await.map_err(connection_error)?;

        self.with_medications_optional(Some(updated_user))
            .await?
            .ok_or_else(|| Error::Corrupt("User disappeared from storage".to_string()))
    }

    async fn find_all_reminders_by_user(&self, user_id: &Uuid) -> Result<Vec<Reminder>> {
        let query = format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE user_id = $1 ORDER BY created_at DESC"
        );

        let reminders = sqlx::query_as::<_, PostgresReminder>(&query)
            .bind(user_id)
            .fetch_all(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        convert_all(reminders)
    }

    async fn find_all_active_reminders(&self) -> Result<Vec<Reminder>> {
        let query = format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE is_active");

        let reminders = sqlx::query_as::<_, PostgresReminder>(&query)
            .fetch_all(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        // a single corrupt row should not hold back the other reminders
        Ok(reminders
            .into_iter()
            .filter_map(|reminder| {
                let id = reminder.id;
                Reminder::try_from(reminder)
                    .inspect_err(|err| tracing::error!(reminder_id = %id, "Skipping reminder: {err}"))
                    .ok()
            })
            .collect())
    }

    async fn find_single_reminder_by_id(
        &self,
        user_id: &Uuid,
        reminder_id: &Uuid,
    ) -> Result<Option<Reminder>> {
        let query =
            format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = $1 AND user_id = $2");

        sqlx::query_as::<_, PostgresReminder>(&query)
            .bind(reminder_id)
            .bind(user_id)
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(connection_error)?
            .map(Reminder::try_from)
            .transpose()
    }

    async fn create_reminder(&self, values: &CreateReminderValues) -> Result<Reminder> {
        let query = format!(
            r"
            INSERT INTO reminders
                (id, user_id, title, reminder_type, time, days, notes, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8)
            RETURNING {REMINDER_COLUMNS}
            "
        );

        sqlx::query_as::<_, PostgresReminder>(&query)
            .bind(Uuid::new_v4())
            .bind(values.user_id)
            .bind(values.title)
            .bind(values.category.label())
            .bind(values.time.to_string())
            .bind(i16::from(values.days.bits()))
            .bind(values.notes)
            .bind(now())
            .fetch_one(&self.connection_pool)
            .await
            .map_err(connection_error)
            .and_then(Reminder::try_from)
    }

    async fn update_reminder(
        &self,
        reminder: &Reminder,
        values: &UpdateReminderValues,
    ) -> Result<Reminder> {
        let query = format!(
            r"
            UPDATE reminders
            SET
                title = COALESCE($2, title),
                reminder_type = COALESCE($3, reminder_type),
                time = COALESCE($4, time),
                days = COALESCE($5, days),
                notes = COALESCE($6, notes),
                is_active = COALESCE($7, is_active)
            WHERE id = $1
            RETURNING {REMINDER_COLUMNS}
            "
        );

        sqlx::query_as::<_, PostgresReminder>(&query)
            .bind(reminder.id)
            .bind(values.title)
            .bind(values.category.map(|category| category.label()))
            .bind(values.time.map(|time| time.to_string()))
            .bind(values.days.map(|days| i16::from(days.bits())))
            .bind(values.notes)
            .bind(values.is_active)
            .fetch_one(&self.connection_pool)
            .await
            .map_err(connection_error)
            .and_then(Reminder::try_from)
    }

    async fn delete_reminder(&self, reminder: &Reminder) -> Result<()> {
        sqlx::query("DELETE FROM reminders WHERE id = $1")
            .bind(reminder.id)
            .execute(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        Ok(())
    }

    async fn find_notifications_by_user(
        &self,
        user_id: &Uuid,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>> {
        let query = format!(
            r"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1
                AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "
        );

        let notifications = sqlx::query_as::<_, PostgresNotification>(&query)
            .bind(user_id)
            .bind(filter.unread_only)
            .bind(i64::try_from(filter.limit).map_err(corrupt)?)
            .bind(i64::try_from(filter.offset).map_err(corrupt)?)
            .fetch_all(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        convert_all(notifications)
    }

    async fn count_unread_notifications(&self, user_id: &Uuid) -> Result<u64> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        u64::try_from(count).map_err(corrupt)
    }

    async fn find_single_notification_by_id(
        &self,
        user_id: &Uuid,
        notification_id: &Uuid,
    ) -> Result<Option<Notification>> {
        let query = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1 AND user_id = $2"
        );

        sqlx::query_as::<_, PostgresNotification>(&query)
            .bind(notification_id)
            .bind(user_id)
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(connection_error)?
            .map(Notification::try_from)
            .transpose()
    }

    async fn create_notification(&self, values: &CreateNotificationValues) -> Result<Notification> {
        let query = format!(
            r"
            INSERT INTO notifications
                (id, user_id, title, body, notification_type, data, is_sent, sent_at, scheduled_at,
                created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {NOTIFICATION_COLUMNS}
            "
        );

        sqlx::query_as::<_, PostgresNotification>(&query)
            .bind(Uuid::new_v4())
            .bind(values.user_id)
            .bind(values.title)
            .bind(values.body)
            .bind(values.notification_type.as_str())
            .bind(values.data.cloned())
            .bind(values.sent_at.is_some())
            .bind(values.sent_at)
            .bind(values.scheduled_at)
            .bind(now())
            .fetch_one(&self.connection_pool)
            .await
            .map_err(connection_error)
            .and_then(Notification::try_from)
    }

    async fn mark_notification_read(
        &self,
        notification: &Notification,
        read_at: NaiveDateTime,
    ) -> Result<Notification> {
        let query = format!(
            r"
            UPDATE notifications
            SET is_read = TRUE, read_at = $2
            WHERE id = $1
            RETURNING {NOTIFICATION_COLUMNS}
            "
        );

        sqlx::query_as::<_, PostgresNotification>(&query)
            .bind(notification.id)
            .bind(read_at)
            .fetch_one(&self.connection_pool)
            .await
            .map_err(connection_error)
            .and_then(Notification::try_from)
    }

    async fn mark_all_notifications_read(
        &self,
        user_id: &Uuid,
        read_at: NaiveDateTime,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = $2 WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .bind(read_at)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(notification.id)
            .execute(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        Ok(())
    }

    async fn delete_all_notifications(&self, user_id: &Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        Ok(result.rows_affected())
    }

    async fn find_notification_preferences(
        &self,
        user_id: &Uuid,
    ) -> Result<Option<NotificationPreferences>> {
        let query = format!(
            "SELECT {PREFERENCES_COLUMNS} FROM notification_preferences WHERE user_id = $1"
        );

        sqlx::query_as::<_, PostgresPreferences>(&query)
            .bind(user_id)
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(connection_error)?
            .map(NotificationPreferences::try_from)
            .transpose()
    }

    async fn save_notification_preferences(
        &self,
        preferences: &NotificationPreferences,
    ) -> Result<NotificationPreferences> {
        let query = format!(
            r"
            INSERT INTO notification_preferences ({PREFERENCES_COLUMNS}, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id) DO UPDATE SET
                reminder_notifications = EXCLUDED.reminder_notifications,
                sugar_alerts = EXCLUDED.sugar_alerts,
                foot_health_notifications = EXCLUDED.foot_health_notifications,
                medication_reminders = EXCLUDED.medication_reminders,
                system_notifications = EXCLUDED.system_notifications,
                achievement_notifications = EXCLUDED.achievement_notifications,
                quiet_hours_start = EXCLUDED.quiet_hours_start,
                quiet_hours_end = EXCLUDED.quiet_hours_end,
                quiet_hours_enabled = EXCLUDED.quiet_hours_enabled,
                updated_at = EXCLUDED.updated_at
            RETURNING {PREFERENCES_COLUMNS}
            "
        );

        sqlx::query_as::<_, PostgresPreferences>(&query)
            .bind(preferences.user_id)
            .bind(preferences.reminder_notifications)
            .bind(preferences.sugar_alerts)
            .bind(preferences.foot_health_notifications)
            .bind(preferences.medication_reminders)
            .bind(preferences.system_notifications)
            .bind(preferences.achievement_notifications)
            .bind(preferences.quiet_hours_start.to_string())
            .bind(preferences.quiet_hours_end.to_string())
            .bind(preferences.quiet_hours_enabled)
            .bind(now())
            .fetch_one(&self.connection_pool)
            .await
            .map_err(connection_error)
            .and_then(NotificationPreferences::try_from)
    }

    async fn find_sugar_readings_by_user(&self, user_id: &Uuid) -> Result<Vec<SugarReading>> {
        let query = format!(
            "SELECT {SUGAR_READING_COLUMNS} FROM sugar_readings WHERE user_id = $1 ORDER BY timestamp DESC"
        );

        let readings = sqlx::query_as::<_, PostgresSugarReading>(&query)
            .bind(user_id)
            .fetch_all(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        convert_all(readings)
    }

    async fn find_single_sugar_reading_by_id(
        &self,
        user_id: &Uuid,
        reading_id: &Uuid,
    ) -> Result<Option<SugarReading>> {
        let query = format!(
            "SELECT {SUGAR_READING_COLUMNS} FROM sugar_readings WHERE id = $1 AND user_id = $2"
        );

        sqlx::query_as::<_, PostgresSugarReading>(&query)
            .bind(reading_id)
            .bind(user_id)
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(connection_error)?
            .map(SugarReading::try_from)
            .transpose()
    }

    async fn create_sugar_reading(
        &self,
        values: &CreateSugarReadingValues,
    ) -> Result<SugarReading> {
        let query = format!(
            r"
            INSERT INTO sugar_readings (id, user_id, value, reading_type, notes, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SUGAR_READING_COLUMNS}
            "
        );

        sqlx::query_as::<_, PostgresSugarReading>(&query)
            .bind(Uuid::new_v4())
            .bind(values.user_id)
            .bind(values.value)
            .bind(values.reading_type.as_str())
            .bind(values.notes)
            .bind(values.timestamp)
            .fetch_one(&self.connection_pool)
            .await
            .map_err(connection_error)
            .and_then(SugarReading::try_from)
    }

    async fn delete_sugar_reading(&self, reading: &SugarReading) -> Result<()> {
        sqlx::query("DELETE FROM sugar_readings WHERE id = $1")
            .bind(reading.id)
            .execute(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        Ok(())
    }

    async fn find_foot_health_records_by_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<FootHealthRecord>> {
        let query = format!(
            "SELECT {FOOT_HEALTH_COLUMNS} FROM foot_health_records WHERE user_id = $1 ORDER BY date DESC"
        );

        let records = sqlx::query_as::<_, PostgresFootHealthRecord>(&query)
            .bind(user_id)
            .fetch_all(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        convert_all(records)
    }

    async fn find_single_foot_health_record_by_id(
        &self,
        user_id: &Uuid,
        record_id: &Uuid,
    ) -> Result<Option<FootHealthRecord>> {
        let query = format!(
            "SELECT {FOOT_HEALTH_COLUMNS} FROM foot_health_records WHERE id = $1 AND user_id = $2"
        );

        sqlx::query_as::<_, PostgresFootHealthRecord>(&query)
            .bind(record_id)
            .bind(user_id)
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(connection_error)?
            .map(FootHealthRecord::try_from)
            .transpose()
    }

    async fn find_foot_health_record_by_date(
        &self,
        user_id: &Uuid,
        date: NaiveDate,
    ) -> Result<Option<FootHealthRecord>> {
        let query = format!(
            "SELECT {FOOT_HEALTH_COLUMNS} FROM foot_health_records WHERE user_id = $1 AND date = $2"
        );

        sqlx::query_as::<_, PostgresFootHealthRecord>(&query)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(connection_error)?
            .map(FootHealthRecord::try_from)
            .transpose()
    }

    async fn create_foot_health_record(
        &self,
        values: &CreateFootHealthValues,
    ) -> Result<FootHealthRecord> {
        let query = format!(
            r"
            INSERT INTO foot_health_records (id, user_id, date, steps, rollers, resisted_exercise, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {FOOT_HEALTH_COLUMNS}
            "
        );

        sqlx::query_as::<_, PostgresFootHealthRecord>(&query)
            .bind(Uuid::new_v4())
            .bind(values.user_id)
            .bind(values.date)
            .bind(counter(values.steps)?)
            .bind(counter(values.rollers)?)
            .bind(counter(values.resisted_exercise)?)
            .bind(values.notes)
            .fetch_one(&self.connection_pool)
            .await
            .map_err(connection_error)
            .and_then(FootHealthRecord::try_from)
    }

    async fn update_foot_health_record(
        &self,
        record: &FootHealthRecord,
        values: &UpdateFootHealthValues,
    ) -> Result<FootHealthRecord> {
        let query = format!(
            r"
            UPDATE foot_health_records
            SET
                steps = COALESCE($2, steps),
                rollers = COALESCE($3, rollers),
                resisted_exercise = COALESCE($4, resisted_exercise),
                notes = COALESCE($5, notes)
            WHERE id = $1
            RETURNING {FOOT_HEALTH_COLUMNS}
            "
        );

        sqlx::query_as::<_, PostgresFootHealthRecord>(&query)
            .bind(record.id)
            .bind(values.steps.map(counter).transpose()?)
            .bind(values.rollers.map(counter).transpose()?)
            .bind(values.resisted_exercise.map(counter).transpose()?)
            .bind(values.notes)
            .fetch_one(&self.connection_pool)
            .await
            .map_err(connection_error)
            .and_then(FootHealthRecord::try_from)
    }

    async fn delete_foot_health_record(&self, record: &FootHealthRecord) -> Result<()> {
        sqlx::query("DELETE FROM foot_health_records WHERE id = $1")
            .bind(record.id)
            .execute(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        Ok(())
    }

    async fn create_device_reading(
        &self,
        values: &CreateDeviceReadingValues,
    ) -> Result<DeviceReading> {
        let query = format!(
            r"
            INSERT INTO device_sessions (
                id, user_id, device_id, patient_id, session_id, exercise, angle_deg, force_n,
                velocity, current_reps, target_reps, battery, device_timestamp, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {DEVICE_READING_COLUMNS}
            "
        );

        sqlx::query_as::<_, PostgresDeviceReading>(&query)
            .bind(Uuid::new_v4())
            .bind(values.user_id)
            .bind(values.device_id)
            .bind(values.patient_id)
            .bind(values.session_id)
            .bind(values.exercise)
            .bind(values.angle_deg)
            .bind(values.force_n)
            .bind(values.velocity)
            .bind(values.current_reps)
            .bind(values.target_reps)
            .bind(values.battery)
            .bind(values.device_timestamp)
            .bind(now())
            .fetch_one(&self.connection_pool)
            .await
            .map(DeviceReading::from)
            .map_err(connection_error)
    }

    async fn find_device_readings(
        &self,
        user_id: &Uuid,
        filter: &DeviceReadingFilter,
    ) -> Result<Vec<DeviceReading>> {
        let query = format!(
            r"
            SELECT {DEVICE_READING_COLUMNS}
            FROM device_sessions
            WHERE user_id = $1
                AND ($2::VARCHAR IS NULL OR session_id = $2)
                AND ($3::VARCHAR IS NULL OR exercise = $3)
            ORDER BY device_timestamp DESC
            LIMIT $4
            "
        );

        let limit = filter
            .limit
            .map(i64::try_from)
            .transpose()
            .map_err(corrupt)?;

        let readings = sqlx::query_as::<_, PostgresDeviceReading>(&query)
            .bind(user_id)
            .bind(filter.session_id)
            .bind(filter.exercise)
            .bind(limit)
            .fetch_all(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        Ok(readings.into_iter().map(DeviceReading::from).collect())
    }

    async fn delete_device_session(&self, user_id: &Uuid, session_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM device_sessions WHERE user_id = $1 AND session_id = $2")
            .bind(user_id)
            .bind(session_id)
            .execute(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        Ok(result.rows_affected())
    }

    async fn find_user_devices(&self, user_id: &Uuid) -> Result<Vec<UserDevice>> {
        let query = format!(
            "SELECT {USER_DEVICE_COLUMNS} FROM user_devices WHERE user_id = $1 ORDER BY last_seen DESC"
        );

        let devices = sqlx::query_as::<_, PostgresUserDevice>(&query)
            .bind(user_id)
            .fetch_all(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        Ok(devices.into_iter().map(UserDevice::from).collect())
    }

    async fn save_user_device(
        &self,
        user_id: &Uuid,
        device_id: &str,
        device_name: Option<Option<&str>>,
        last_seen: NaiveDateTime,
    ) -> Result<UserDevice> {
        let query = format!(
            r"
            INSERT INTO user_devices (id, user_id, device_id, device_name, last_seen)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, device_id) DO UPDATE SET
                device_name = CASE WHEN $6 THEN EXCLUDED.device_name ELSE user_devices.device_name END,
                last_seen = EXCLUDED.last_seen
            RETURNING {USER_DEVICE_COLUMNS}
            "
        );

        sqlx::query_as::<_, PostgresUserDevice>(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(device_id)
            .bind(device_name.flatten())
            .bind(last_seen)
            .bind(device_name.is_some())
            .fetch_one(&self.connection_pool)
            .await
            .map(UserDevice::from)
            .map_err(connection_error)
    }
}

fn connection_error<E>(err: E) -> Error
where
    E: std::error::Error,
{
    Error::Connection(err.to_string())
}

fn corrupt<E>(err: E) -> Error
where
    E: ToString,
{
    Error::Corrupt(err.to_string())
}
