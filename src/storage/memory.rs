//! Memory storage
//!
//! Will be destroyed on system shutdown

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::AtomicBool;
#[cfg(test)]
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clock::now;
use crate::devices::DeviceReading;
use crate::devices::UserDevice;
use crate::foot_health::FootHealthRecord;
use crate::notifications::Notification;
use crate::notifications::NotificationPreferences;
use crate::reminders::Reminder;
use crate::sugar::SugarReading;
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

/// A single table, rows by ID
type Table<T> = Arc<Mutex<HashMap<Uuid, T>>>;

/// An in-memory storage
///
/// Will be destroyed on system shutdown
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// All users in storage
    users: Table<User>,

    /// All reminders in storage
    reminders: Table<Reminder>,

    /// All notifications in storage
    notifications: Table<Notification>,

    /// Notification preferences, by user ID
    preferences: Table<NotificationPreferences>,

    /// All sugar readings in storage
    sugar_readings: Table<SugarReading>,

    /// All foot health records in storage
    foot_health_records: Table<FootHealthRecord>,

    /// All device telemetry in storage
    device_readings: Table<DeviceReading>,

    /// All known devices in storage
    user_devices: Table<UserDevice>,

    /// Make reminder queries and notification inserts fail
    #[cfg(test)]
    failing: Arc<AtomicBool>,
}

impl Memory {
    /// Create a new empty Memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the storage (un)available for the reminder scheduler
    #[cfg(test)]
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail when the storage is made unavailable
    #[allow(clippy::unused_self)]
    fn check_available(&self) -> Result<()> {
        #[cfg(test)]
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Connection("Storage unavailable".to_string()));
        }

        Ok(())
    }
}


/// Row that was just looked up has disappeared
fn missing(kind: &str) -> Error {
    Error::Corrupt(format!("{kind} disappeared from storage"))
}

#[async_trait]
impl Storage for Memory {
    async fn find_developer_user(&self) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.is_developer)
            .cloned())
    }

    async fn find_all_users(&self) -> Result<Vec<User>> {
        let mut users = self
            .users
            .lock()
            .await
            .values()
            .cloned()
            .collect::<Vec<_>>();

        users.sort_by_key(|user| Reverse(user.created_at));

        Ok(users)
    }

    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().await.get(id).cloned())
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            session_id: *values.session_id,
            email: values.email.to_string(),
            name: values.name.to_string(),
            hashed_password: values.hashed_password.to_string(),
            fcm_token: values.fcm_token.map(ToString::to_string),
            profile_image: None,
            age: None,
            gender: None,
            diabetes_type: None,
            diagnosis_year: None,
            medications: Vec::new(),
            is_developer: values.is_developer,
            created_at: now(),
            last_active: None,
        };

        self.users.lock().await.insert(user.id, user.clone());

        Ok(user)
    }

    async fn update_user(&self, user: &User, values: &UpdateUserValues) -> Result<User> {
        self.users
            .lock()
            .await
            .get_mut(&user.id)
            .map(|user| {
                if let Some(session_id) = values.session_id {
                    user.session_id = *session_id;
                }
                if let Some(fcm_token) = values.fcm_token {
                    user.fcm_token = Some(fcm_token.to_string());
                }
                if values.last_active.is_some() {
                    user.last_active = values.last_active;
                }
                if let Some(name) = values.name {
                    user.name = name.to_string();
                }
                if let Some(profile_image) = values.profile_image {
                    user.profile_image = Some(profile_image.to_string());
                }
                if values.age.is_some() {
                    user.age = values.age;
                }
                if values.gender.is_some() {
                    user.gender = values.gender;
                }
                if values.diabetes_type.is_some() {
                    user.diabetes_type = values.diabetes_type;
                }
                if values.diagnosis_year.is_some() {
                    user.diagnosis_year = values.diagnosis_year;
                }
                if let Some(medications) = values.medications {
                    user.medications = medications.to_vec();
                }

                user.clone()
            })
            .ok_or_else(|| missing("User"))
    }

    async fn find_all_reminders_by_user(&self, user_id: &Uuid) -> Result<Vec<Reminder>> {
        let mut reminders = self
            .reminders
            .lock()
            .await
            .values()
            .filter(|reminder| &reminder.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();

        reminders.sort_by_key(|reminder| Reverse(reminder.created_at));

        Ok(reminders)
    }

    async fn find_all_active_reminders(&self) -> Result<Vec<Reminder>> {
        self.check_available()?;

        Ok(self
            .reminders
            .lock()
            .await
            .values()
            .filter(|reminder| reminder.is_active)
            .cloned()
            .collect())
    }

    async fn find_single_reminder_by_id(
        &self,
        user_id: &Uuid,
        reminder_id: &Uuid,
    ) -> Result<Option<Reminder>> {
        Ok(self
            .reminders
            .lock()
            .await
            .get(reminder_id)
            .filter(|reminder| &reminder.user_id == user_id)
            .cloned())
    }

    async fn create_reminder(&self, values: &CreateReminderValues) -> Result<Reminder> {
        let reminder = Reminder {
            id: Uuid::new_v4(),
            user_id: *values.user_id,
            title: values.title.to_string(),
            category: values.category,
            time: values.time,
            days: values.days,
            notes: values.notes.map(ToString::to_string),
            is_active: true,
            created_at: now(),
        };

        self.reminders
            .lock()
            .await
            .insert(reminder.id, reminder.clone());

        Ok(reminder)
    }

    async fn update_reminder(
        &self,
        reminder: &Reminder,
        values: &UpdateReminderValues,
    ) -> Result<Reminder> {
        self.reminders
            .lock()
            .await
            .get_mut(&reminder.id)
            .map(|reminder| {
                if let Some(title) = values.title {
                    reminder.title = title.to_string();
                }
                if let Some(category) = values.category {
                    reminder.category = category;
                }
                if let Some(time) = values.time {
                    reminder.time = time;
                }
                if let Some(days) = values.days {
                    reminder.days = days;
                }
                if let Some(notes) = values.notes {
                    reminder.notes = Some(notes.to_string());
                }
                if let Some(is_active) = values.is_active {
                    reminder.is_active = is_active;
                }

                reminder.clone()
            })
            .ok_or_else(|| missing("Reminder"))
    }

    async fn delete_reminder(&self, reminder: &Reminder) -> Result<()> {
        self.reminders.lock().await.remove(&reminder.id);

        Ok(())
    }

    async fn find_notifications_by_user(
        &self,
        user_id: &Uuid,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>> {
        let mut notifications = self
            .notifications
            .lock()
            .await
            .values()
            .filter(|notification| &notification.user_id == user_id)
            .filter(|notification| !filter.unread_only || !notification.is_read)
            .cloned()
            .collect::<Vec<_>>();

        notifications.sort_by_key(|notification| Reverse(notification.created_at));

        Ok(notifications
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    async fn count_unread_notifications(&self, user_id: &Uuid) -> Result<u64> {
        let count = self
            .notifications
            .lock()
            .await
            .values()
            .filter(|notification| &notification.user_id == user_id && !notification.is_read)
            .count();

        Ok(count as u64)
    }

    async fn find_single_notification_by_id(
        &self,
        user_id: &Uuid,
        notification_id: &Uuid,
    ) -> Result<Option<Notification>> {
        Ok(self
            .notifications
            .lock()
            .await
            .get(notification_id)
            .filter(|notification| &notification.user_id == user_id)
            .cloned())
    }

    async fn create_notification(&self, values: &CreateNotificationValues) -> Result<Notification> {
        self.check_available()?;

        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: *values.user_id,
            title: values.title.to_string(),
            body: values.body.to_string(),
            notification_type: values.notification_type,
            data: values.data.cloned(),
            is_read: false,
            is_sent: values.sent_at.is_some(),
            scheduled_at: values.scheduled_at,
            sent_at: values.sent_at,
            read_at: None,
            created_at: now(),
        };

        self.notifications
            .lock()
            .await
            .insert(notification.id, notification.clone());

        Ok(notification)
    }

    async fn mark_notification_read(
        &self,
        notification: &Notification,
        read_at: NaiveDateTime,
    ) -> Result<Notification> {
        self.notifications
            .lock()
            .await
            .get_mut(&notification.id)
            .map(|notification| {
                notification.is_read = true;
                notification.read_at = Some(read_at);

                notification.clone()
            })
            .ok_or_else(|| missing("Notification"))
    }

    async fn mark_all_notifications_read(
        &self,
        user_id: &Uuid,
        read_at: NaiveDateTime,
    ) -> Result<u64> {
        let mut count = 0;

        for notification in self.notifications.lock().await.values_mut() {
            if &notification.user_id == user_id && !notification.is_read {
                notification.is_read = true;
                notification.read_at = Some(read_at);
                count += 1;
            }
        }

        Ok(count)
    }

    async fn delete_notification(&self, notification: &Notification) -> Result<()> {
        self.notifications.lock().await.remove(&notification.id);

        Ok(())
    }

    async fn delete_all_notifications(&self, user_id: &Uuid) -> Result<u64> {
        let mut notifications = self.notifications.lock().await;
        let before = notifications.len();

        notifications.retain(|_, notification| &notification.user_id != user_id);

        Ok((before - notifications.len()) as u64)
    }

    async fn find_notification_preferences(
        &self,
        user_id: &Uuid,
    ) -> Result<Option<NotificationPreferences>> {
        Ok(self.preferences.lock().await.get(user_id).cloned())
    }

    async fn save_notification_preferences(
        &self,
        preferences: &NotificationPreferences,
    ) -> Result<NotificationPreferences> {
        self.preferences
            .lock()
            .await
            .insert(preferences.user_id, preferences.clone());

        Ok(preferences.clone())
    }

    async fn find_sugar_readings_by_user(&self, user_id: &Uuid) -> Result<Vec<SugarReading>> {
        let mut readings = self
            .sugar_readings
            .lock()
            .await
            .values()
            .filter(|reading| &reading.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();

        readings.sort_by_key(|reading| Reverse(reading.timestamp));

        Ok(readings)
    }

    async fn find_single_sugar_reading_by_id(
        &self,
        user_id: &Uuid,
        reading_id: &Uuid,
    ) -> Result<Option<SugarReading>> {
        Ok(self
            .sugar_readings
            .lock()
            .await
            .get(reading_id)
            .filter(|reading| &reading.user_id == user_id)
            .cloned())
    }

    async fn create_sugar_reading(
        &self,
        values: &CreateSugarReadingValues,
    ) -> Result<SugarReading> {
        let reading = SugarReading {
            id: Uuid::new_v4(),
            user_id: *values.user_id,
            value: values.value,
            reading_type: values.reading_type,
            notes: values.notes.map(ToString::to_string),
            timestamp: values.timestamp,
        };

        self.sugar_readings
            .lock()
            .await
            .insert(reading.id, reading.clone());

        Ok(reading)
    }

    async fn delete_sugar_reading(&self, reading: &SugarReading) -> Result<()> {
        self.sugar_readings.lock().await.remove(&reading.id);

        Ok(())
    }

    async fn find_foot_health_records_by_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<FootHealthRecord>> {
        let mut records = self
            .foot_health_records
            .lock()
            .await
            .values()
            .filter(|record| &record.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();

        records.sort_by_key(|record| Reverse(record.date));

        Ok(records)
    }

    async fn find_single_foot_health_record_by_id(
        &self,
        user_id: &Uuid,
        record_id: &Uuid,
    ) -> Result<Option<FootHealthRecord>> {
        Ok(self
            .foot_health_records
            .lock()
            .await
            .get(record_id)
            .filter(|record| &record.user_id == user_id)
            .cloned())
    }

    async fn find_foot_health_record_by_date(
        &self,
        user_id: &Uuid,
        date: NaiveDate,
    ) -> Result<Option<FootHealthRecord>> {
        Ok(self
            .foot_health_records
            .lock()
            .await
            .values()
            .find(|record| &record.user_id == user_id && record.date == date)
            .cloned())
    }

    async fn create_foot_health_record(
        &self,
        values: &CreateFootHealthValues,
    ) -> Result<FootHealthRecord> {
        let record = FootHealthRecord {
            id: Uuid::new_v4(),
            user_id: *values.user_id,
            date: values.date,
            steps: values.steps,
            rollers: values.rollers,
            resisted_exercise: values.resisted_exercise,
            notes: values.notes.map(ToString::to_string),
        };

        self.foot_health_records
            .lock()
            .await
            .insert(record.id, record.clone());

        Ok(record)
    }

    async fn update_foot_health_record(
        &self,
        record: &FootHealthRecord,
        values: &UpdateFootHealthValues,
    ) -> Result<FootHealthRecord> {
        self.foot_health_records
            .lock()
            .await
            .get_mut(&record.id)
            .map(|record| {
                if let Some(steps) = values.steps {
                    record.steps = steps;
                }
                if let Some(rollers) = values.rollers {
                    record.rollers = rollers;
                }
                if let Some(resisted_exercise) = values.resisted_exercise {
                    record.resisted_exercise = resisted_exercise;
                }
                if let Some(notes) = values.notes {
                    record.notes = Some(notes.to_string());
                }

                record.clone()
            })
            .ok_or_else(|| missing("Foot health record"))
    }

    async fn delete_foot_health_record(&self, record: &FootHealthRecord) -> Result<()> {
        self.foot_health_records.lock().await.remove(&record.id);

        Ok(())
    }

    async fn create_device_reading(
        &self,
        values: &CreateDeviceReadingValues,
    ) -> Result<DeviceReading> {
        let reading = DeviceReading {
            id: Uuid::new_v4(),
            user_id: *values.user_id,
            device_id: values.device_id.to_string(),
            patient_id: values.patient_id.map(ToString::to_string),
            session_id: values.session_id.to_string(),
            exercise: values.exercise.to_string(),
            angle_deg: values.angle_deg,
            force_n: values.force_n,
            velocity: values.velocity,
            current_reps: values.current_reps,
            target_reps: values.target_reps,
            battery: values.battery,
            device_timestamp: values.device_timestamp,
            created_at: now(),
        };

        self.device_readings
            .lock()
            .await
            .insert(reading.id, reading.clone());

        Ok(reading)
    }

    async fn find_device_readings(
        &self,
        user_id: &Uuid,
        filter: &DeviceReadingFilter,
    ) -> Result<Vec<DeviceReading>> {
        let mut readings = self
            .device_readings
            .lock()
            .await
            .values()
            .filter(|reading| &reading.user_id == user_id)
            .filter(|reading| filter.session_id.is_none_or(|id| reading.session_id == id))
            .filter(|reading| filter.exercise.is_none_or(|name| reading.exercise == name))
            .cloned()
            .collect::<Vec<_>>();

        readings.sort_by_key(|reading| Reverse(reading.device_timestamp));

        if let Some(limit) = filter.limit {
            readings.truncate(limit);
        }

        Ok(readings)
    }

    async fn delete_device_session(&self, user_id: &Uuid, session_id: &str) -> Result<u64> {
        let mut readings = self.device_readings.lock().await;
        let before = readings.len();

        readings.retain(|_, reading| &reading.user_id != user_id || reading.session_id != session_id);

        Ok((before - readings.len()) as u64)
    }

    async fn find_user_devices(&self, user_id: &Uuid) -> Result<Vec<UserDevice>> {
        let mut devices = self
            .user_devices
            .lock()
            .await
            .values()
            .filter(|device| &device.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();

        devices.sort_by_key(|device| Reverse(device.last_seen));

        Ok(devices)
    }

    async fn save_user_device(
        &self,
        user_id: &Uuid,
        device_id: &str,
        device_name: Option<Option<&str>>,
        last_seen: NaiveDateTime,
    ) -> Result<UserDevice> {
        let mut devices = self.user_devices.lock().await;

        let existing = devices
            .values_mut()
            .find(|device| &device.user_id == user_id && device.device_id == device_id);

        if let Some(device) = existing {
            device.last_seen = last_seen;
            if let Some(device_name) = device_name {
                device.device_name = device_name.map(ToString::to_string);
            }

            return Ok(device.clone());
        }

        let device = UserDevice {
            id: Uuid::new_v4(),
            user_id: *user_id,
            device_id: device_id.to_string(),
            device_name: device_name.flatten().map(ToString::to_string),
            last_seen,
        };

        devices.insert(device.id, device.clone());

        Ok(device)
    }
}
