//! Notification inbox and preferences

use axum::Extension;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use uuid::Uuid;

use crate::clock::now;
use crate::notifications::Notification;
use crate::notifications::NotificationPreferences;
use crate::notifications::NotificationType;
use crate::notifications::page_size;
use crate::push::Delivery;
use crate::push::Dispatcher;
use crate::reminders::TimeOfDay;
use crate::storage::CreateNotificationValues;
use crate::storage::NotificationFilter;
use crate::storage::Storage;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::QueryParameters;
use super::Success;
use super::utils::fetch_notification;

/// The notification response information
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    id: Uuid,
    title: String,
    body: String,
    #[serde(rename = "type")]
    notification_type: NotificationType,
    data: Option<Value>,
    is_read: bool,
    is_sent: bool,
    scheduled_at: Option<NaiveDateTime>,
    sent_at: Option<NaiveDateTime>,
    read_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
}

impl NotificationResponse {
    /// Create a notification response from a [`Notification`](Notification)
    fn from_notification(notification: Notification) -> Self {
        Self {
            id: notification.id,
            title: notification.title,
            body: notification.body,
            notification_type: notification.notification_type,
            data: notification.data,
            is_read: notification.is_read,
            is_sent: notification.is_sent,
            scheduled_at: notification.scheduled_at,
            sent_at: notification.sent_at,
            read_at: notification.read_at,
            created_at: notification.created_at,
        }
    }

    /// Create notification responses from multiple [`Notification`](Notification)s
    fn from_notification_multiple(mut notifications: Vec<Notification>) -> Vec<Self> {
        notifications
            .drain(..)
            .map(Self::from_notification)
            .collect::<Vec<Self>>()
    }
}

/// A page of notifications
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsResponse {
    notifications: Vec<NotificationResponse>,
    unread_count: u64,
}

/// The amount of unread notifications
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    unread_count: u64,
}

/// A stored notification and the outcome of its push
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentNotificationResponse {
    notification: NotificationResponse,

    /// `None` when no push was attempted
    fcm_result: Option<Delivery>,
}

/// Amount of notifications changed by a bulk action
#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    updated: u64,
}

/// Amount of notifications removed by a bulk action
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    deleted: u64,
}

/// Combine the notification ID and type with the data of a client, for the push payload
fn push_payload(notification: &Notification, data: Option<&Value>) -> Value {
    let mut payload = json!({
        "notification_id": notification.id.to_string(),
        "type": notification.notification_type.as_str(),
    });

    if let (Some(payload), Some(Value::Object(data))) = (payload.as_object_mut(), data) {
        for (key, value) in data {
            payload.insert(key.clone(), value.clone());
        }
    }

    payload
}

/// Notifications list query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    limit: Option<usize>,
    offset: Option<usize>,
    #[serde(alias = "unread_only")]
    unread_only: Option<bool>,
}

/// List a page of notifications of the current user, newest first
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     'http://localhost:5000/api/notifications?limit=20&unreadOnly=true'
/// ```
///
/// Response:
/// ```json
/// { "data": { "notifications": [ { "id": "...", "title": "Medication Reminder", "type": "reminder", "isRead": false, ... } ], "unreadCount": 3 } }
/// ```
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    QueryParameters(query): QueryParameters<ListQuery>,
) -> Result<Success<NotificationsResponse>, Error> {
    let filter = NotificationFilter {
        limit: page_size(query.limit),
        offset: query.offset.unwrap_or_default(),
        unread_only: query.unread_only.unwrap_or_default(),
    };

    let notifications = storage
        .find_notifications_by_user(&current_user.id, &filter)
        .await
        .map_err(Error::internal_server_error)?;

    let unread_count = storage
        .count_unread_notifications(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(NotificationsResponse {
        notifications: NotificationResponse::from_notification_multiple(notifications),
        unread_count,
    }))
}

/// The amount of unread notifications of the current user
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/notifications/unread-count
/// ```
///
/// Response:
/// ```json
/// { "data": { "unreadCount": 3 } }
/// ```
pub async fn unread_count<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<UnreadCountResponse>, Error> {
    let unread_count = storage
        .count_unread_notifications(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(UnreadCountResponse { unread_count }))
}

/// Create notification form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationForm {
    title: Option<String>,
    body: Option<String>,

    /// `system` when left out
    #[serde(rename = "type")]
    notification_type: Option<String>,

    /// Must be an object when set
    data: Option<Value>,

    /// Push the notification to the device of the user, defaults to `true`
    #[serde(alias = "send_push")]
    send_push: Option<bool>,
}

/// Create a notification, pushing it to the device of the current user
///
/// The notification is only marked as sent when a push was attempted
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "title": "Well done", "body": "Seven days in a row!", "type": "achievement" }' \
///     http://localhost:5000/api/notifications
/// ```
///
/// Response:
/// ```json
/// { "data": { "notification": { "id": "...", "title": "Well done", "type": "achievement", "isSent": true, ... }, "fcmResult": { "status": "delivered", "messageId": "..." } } }
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(dispatcher): Extension<Dispatcher>,
    current_user: CurrentUser<S>,
    Form(form): Form<CreateNotificationForm>,
) -> Result<Success<SentNotificationResponse>, Error> {
    let title = form.title.as_deref().map(str::trim).unwrap_or_default();
    let body = form.body.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() || body.is_empty() {
        return Err(Error::bad_request("Please provide title and body"));
    }

    let notification_type = form
        .notification_type
        .as_deref()
        .map(|notification_type| {
            notification_type
                .parse::<NotificationType>()
                .map_err(|_| Error::bad_request("Invalid notification type"))
        })
        .transpose()?
        .unwrap_or_default();

    let data = form.data.filter(|data| !data.is_null());
    if data.as_ref().is_some_and(|data| !data.is_object()) {
        return Err(Error::bad_request("Data must be an object"));
    }

    let token = form
        .send_push
        .unwrap_or(true)
        .then(|| current_user.push_token())
        .flatten();

    let values = CreateNotificationValues {
        user_id: &current_user.id,
        title,
        body,
        notification_type,
        data: data.as_ref(),
        sent_at: token.map(|_| now()),
        scheduled_at: None,
    };

    let notification = storage
        .create_notification(&values)
        .await
        .map_err(Error::internal_server_error)?;

    let fcm_result = match token {
        Some(token) => {
            let payload = push_payload(&notification, data.as_ref());
            Some(
                dispatcher
                    .send(Some(token), title, body, &payload)
                    .await,
            )
        }
        None => None,
    };

    Ok(Success::created(SentNotificationResponse {
        notification: NotificationResponse::from_notification(notification),
        fcm_result,
    }))
}

/// Send a test notification to the device of the current user
///
/// Request:
/// ```sh
/// curl -v -X POST -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/notifications/test
/// ```
///
/// Response:
/// ```json
/// { "data": { "notification": { "id": "...", "title": "Test Notification", "type": "system", ... }, "fcmResult": { "status": "failed", "reason": "gateway not initialized" } } }
/// ```
pub async fn test<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(dispatcher): Extension<Dispatcher>,
    current_user: CurrentUser<S>,
) -> Result<Success<SentNotificationResponse>, Error> {
    let Some(token) = current_user.push_token() else {
        return Err(Error::bad_request("No push token registered")
            .with_description("Enable notifications in the app first"));
    };

    let title = "Test Notification";
    let body = format!(
        "Hello {}! This is a test notification from Sehat Saathi.",
        current_user.name
    );
    let data = json!({ "test": true });

    let values = CreateNotificationValues {
        user_id: &current_user.id,
        title,
        body: &body,
        notification_type: NotificationType::System,
        data: Some(&data),
        sent_at: Some(now()),
        scheduled_at: None,
    };

    let notification = storage
        .create_notification(&values)
        .await
        .map_err(Error::internal_server_error)?;

    let payload = push_payload(&notification, Some(&data));
    let delivery = dispatcher.send(Some(token), title, &body, &payload).await;

    tracing::debug!(notification_id = %notification.id, "Test notification: {delivery:?}");

    Ok(Success::ok(SentNotificationResponse {
        notification: NotificationResponse::from_notification(notification),
        fcm_result: Some(delivery),
    }))
}

/// Mark a notification as read
///
/// Request:
/// ```sh
/// curl -v -X PATCH -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/notifications/3c1d7e4a-2f6b-4c8e-9d0a-1b2c3d4e5f60/read
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "...", "isRead": true, "readAt": "2024-03-01T08:01:12", ... } }
/// ```
pub async fn read<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(notification_id): PathParameters<Uuid>,
) -> Result<Success<NotificationResponse>, Error> {
    let notification = fetch_notification(&storage, &current_user.id, &notification_id).await?;

    let notification = storage
        .mark_notification_read(&notification, now())
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(NotificationResponse::from_notification(
        notification,
    )))
}

/// Mark all notifications of the current user as read
///
/// Request:
/// ```sh
/// curl -v -X PATCH -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/notifications/read-all
/// ```
///
/// Response:
/// ```json
/// { "data": { "updated": 3 } }
/// ```
pub async fn read_all<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<UpdatedResponse>, Error> {
    let updated = storage
        .mark_all_notifications_read(&current_user.id, now())
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(UpdatedResponse { updated }))
}

/// Delete a notification
///
/// Request:
/// ```sh
/// curl -v -X DELETE -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/notifications/3c1d7e4a-2f6b-4c8e-9d0a-1b2c3d4e5f60
/// ```
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(notification_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    let notification = fetch_notification(&storage, &current_user.id, &notification_id).await?;

    storage
        .delete_notification(&notification)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}

/// Delete all notifications of the current user
///
/// Request:
/// ```sh
/// curl -v -X DELETE -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/notifications/clear-all
/// ```
///
/// Response:
/// ```json
/// { "data": { "deleted": 12 } }
/// ```
pub async fn clear_all<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<DeletedResponse>, Error> {
    let deleted = storage
        .delete_all_notifications(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(DeletedResponse { deleted }))
}

/// The notification preferences response information
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct PreferencesResponse {
    reminder_notifications: bool,
    sugar_alerts: bool,
    foot_health_notifications: bool,
    medication_reminders: bool,
    system_notifications: bool,
    achievement_notifications: bool,
    quiet_hours_start: TimeOfDay,
    quiet_hours_end: TimeOfDay,
    quiet_hours_enabled: bool,
}

impl PreferencesResponse {
    /// Create a preferences response from [`NotificationPreferences`](NotificationPreferences)
    fn from_preferences(preferences: &NotificationPreferences) -> Self {
        Self {
            reminder_notifications: preferences.reminder_notifications,
            sugar_alerts: preferences.sugar_alerts,
            foot_health_notifications: preferences.foot_health_notifications,
            medication_reminders: preferences.medication_reminders,
            system_notifications: preferences.system_notifications,
            achievement_notifications: preferences.achievement_notifications,
            quiet_hours_start: preferences.quiet_hours_start,
            quiet_hours_end: preferences.quiet_hours_end,
            quiet_hours_enabled: preferences.quiet_hours_enabled,
        }
    }
}

/// Find the preferences of a user, storing the defaults when there are none yet
async fn fetch_preferences<S: Storage>(
    storage: &S,
    user_id: &Uuid,
) -> Result<NotificationPreferences, Error> {
    let preferences = storage
        .find_notification_preferences(user_id)
        .await
        .map_err(Error::internal_server_error)?;

    match preferences {
        Some(preferences) => Ok(preferences),
        None => storage
            .save_notification_preferences(&NotificationPreferences::defaults(*user_id))
            .await
            .map_err(Error::internal_server_error),
    }
}

/// Get the notification preferences of the current user
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/notifications/preferences
/// ```
///
/// Response:
/// ```json
/// { "data": { "reminderNotifications": true, "sugarAlerts": true, ..., "quietHoursStart": "22:00", "quietHoursEnd": "07:00", "quietHoursEnabled": false } }
/// ```
pub async fn preferences<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<PreferencesResponse>, Error> {
    let preferences = fetch_preferences(&storage, &current_user.id).await?;

    Ok(Success::ok(PreferencesResponse::from_preferences(
        &preferences,
    )))
}

/// Update preferences form, every field is optional
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferencesForm {
    reminder_notifications: Option<bool>,
    sugar_alerts: Option<bool>,
    foot_health_notifications: Option<bool>,
    medication_reminders: Option<bool>,
    system_notifications: Option<bool>,
    achievement_notifications: Option<bool>,
    quiet_hours_start: Option<String>,
    quiet_hours_end: Option<String>,
    quiet_hours_enabled: Option<bool>,
}

/// Parse a quiet hours boundary, `HH:MM` with optional seconds
fn parse_quiet_hour(time: &str) -> Result<TimeOfDay, Error> {
    let time = time.strip_suffix(":00").filter(|_| time.len() == 8).unwrap_or(time);

    time.parse::<TimeOfDay>().map_err(Error::bad_request)
}

/// Update the notification preferences of the current user
///
/// Request:
/// ```sh
/// curl -v -X PUT -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "sugarAlerts": false, "quietHoursEnabled": true, "quietHoursStart": "23:00" }' \
///     http://localhost:5000/api/notifications/preferences
/// ```
///
/// Response:
/// ```json
/// { "data": { "reminderNotifications": true, "sugarAlerts": false, ..., "quietHoursStart": "23:00", "quietHoursEnabled": true } }
/// ```
pub async fn update_preferences<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<UpdatePreferencesForm>,
) -> Result<Success<PreferencesResponse>, Error> {
    let quiet_hours_start = form
        .quiet_hours_start
        .as_deref()
        .map(parse_quiet_hour)
        .transpose()?;
    let quiet_hours_end = form
        .quiet_hours_end
        .as_deref()
        .map(parse_quiet_hour)
        .transpose()?;

    let current = fetch_preferences(&storage, &current_user.id).await?;

    let preferences = NotificationPreferences {
        user_id: current.user_id,
        reminder_notifications: form
            .reminder_notifications
            .unwrap_or(current.reminder_notifications),
        sugar_alerts: form.sugar_alerts.unwrap_or(current.sugar_alerts),
        foot_health_notifications: form
            .foot_health_notifications
            .unwrap_or(current.foot_health_notifications),
        medication_reminders: form
            .medication_reminders
            .unwrap_or(current.medication_reminders),
        system_notifications: form
            .system_notifications
            .unwrap_or(current.system_notifications),
        achievement_notifications: form
            .achievement_notifications
            .unwrap_or(current.achievement_notifications),
        quiet_hours_start: quiet_hours_start.unwrap_or(current.quiet_hours_start),
        quiet_hours_end: quiet_hours_end.unwrap_or(current.quiet_hours_end),
        quiet_hours_enabled: form
            .quiet_hours_enabled
            .unwrap_or(current.quiet_hours_enabled),
    };

    let preferences = storage
        .save_notification_preferences(&preferences)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(PreferencesResponse::from_preferences(
        &preferences,
    )))
}
