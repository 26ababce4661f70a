//! Reminder management
//!
//! The reminders themselves are fired by the scheduler, these endpoints only manage them

use axum::Extension;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::reminders::DaysForm;
use crate::reminders::Reminder;
use crate::reminders::ReminderCategory;
use crate::reminders::TimeOfDay;
use crate::reminders::WeekdaySet;
use crate::storage::CreateReminderValues;
use crate::storage::Storage;
use crate::storage::UpdateReminderValues;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::utils::fetch_reminder;

/// The reminder response information
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderResponse {
    id: Uuid,
    title: String,
    #[serde(rename = "type")]
    category: ReminderCategory,
    time: TimeOfDay,
    days: WeekdaySet,
    notes: Option<String>,
    is_active: bool,
    created_at: NaiveDateTime,
}

impl ReminderResponse {
    /// Create a reminder response from a [`Reminder`](Reminder)
    fn from_reminder(reminder: Reminder) -> Self {
        Self {
            id: reminder.id,
            title: reminder.title,
            category: reminder.category,
            time: reminder.time,
            days: reminder.days,
            notes: reminder.notes,
            is_active: reminder.is_active,
            created_at: reminder.created_at,
        }
    }

    /// Create reminder responses from multiple [`Reminder`](Reminder)s
    fn from_reminder_multiple(mut reminders: Vec<Reminder>) -> Vec<Self> {
        reminders
            .drain(..)
            .map(Self::from_reminder)
            .collect::<Vec<Self>>()
    }
}

/// Parse the category of a reminder
fn parse_category(category: &str) -> Result<ReminderCategory, Error> {
    category.parse::<ReminderCategory>().map_err(Error::bad_request)
}

/// Parse the time of a reminder
fn parse_time(time: &str) -> Result<TimeOfDay, Error> {
    time.parse::<TimeOfDay>().map_err(Error::bad_request)
}

/// Parse the title of a reminder
fn parse_title(title: &str) -> Result<&str, Error> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::bad_request("Please provide a title"));
    }

    Ok(title)
}

/// List all reminders of the current user, newest first
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/reminders
/// ```
///
/// Response:
/// ```json
/// { "data": [ { "id": "...", "title": "Metformin", "type": "Medication", "time": "08:00", "days": { "monday": true, ... }, "isActive": true } ] }
/// ```
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<ReminderResponse>>, Error> {
    let reminders = storage
        .find_all_reminders_by_user(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(ReminderResponse::from_reminder_multiple(
        reminders,
    )))
}

/// Create reminder form
#[derive(Debug, Deserialize)]
pub struct CreateReminderForm {
    title: String,
    #[serde(rename = "type")]
    category: String,
    /// `HH:MM`
    time: String,
    /// Every day when left out
    days: Option<DaysForm>,
    notes: Option<String>,
}

/// Create a reminder, active from the start
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "title": "Metformin", "type": "Medication", "time": "08:00" }' \
///     http://localhost:5000/api/reminders
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "...", "title": "Metformin", "type": "Medication", "time": "08:00", "isActive": true } }
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<CreateReminderForm>,
) -> Result<Success<ReminderResponse>, Error> {
    let title = parse_title(&form.title)?;
    let category = parse_category(&form.category)?;
    let time = parse_time(&form.time)?;
    let days = form
        .days
        .as_ref()
        .map_or(WeekdaySet::ALL, |days| WeekdaySet::EMPTY.apply(days));

    let values = CreateReminderValues {
        user_id: &current_user.id,
        title,
        category,
        time,
        days,
        notes: form.notes.as_deref().filter(|notes| !notes.is_empty()),
    };

    let reminder = storage
        .create_reminder(&values)
        .await
        .map_err(Error::internal_server_error)?;

    tracing::debug!(reminder_id = %reminder.id, "Reminder created for {time}");

    Ok(Success::created(ReminderResponse::from_reminder(reminder)))
}

/// Update reminder form, every field is optional
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReminderForm {
    title: Option<String>,
    #[serde(rename = "type")]
    category: Option<String>,
    time: Option<String>,
    /// Days left out keep their current value
    days: Option<DaysForm>,
    notes: Option<String>,
    is_active: Option<bool>,
}

/// Update a reminder
///
/// Request:
/// ```sh
/// curl -v -X PUT -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "time": "09:30", "days": { "sunday": false } }' \
///     http://localhost:5000/api/reminders/a7c9e1a4-6bb2-4d3e-9a43-0d3f8a7e1b2c
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "...", "time": "09:30", "days": { "sunday": false, ... } } }
/// ```
pub async fn update<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(reminder_id): PathParameters<Uuid>,
    Form(form): Form<UpdateReminderForm>,
) -> Result<Success<ReminderResponse>, Error> {
    let reminder = fetch_reminder(&storage, &current_user.id, &reminder_id).await?;

    let title = form.title.as_deref().map(parse_title).transpose()?;
    let category = form.category.as_deref().map(parse_category).transpose()?;
    let time = form.time.as_deref().map(parse_time).transpose()?;
    let days = form.days.as_ref().map(|days| reminder.days.apply(days));

    let values = UpdateReminderValues {
        title,
        category,
        time,
        days,
        notes: form.notes.as_deref(),
        is_active: form.is_active,
    };

    let reminder = storage
        .update_reminder(&reminder, &values)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(ReminderResponse::from_reminder(reminder)))
}

/// Flip a reminder between active and inactive
///
/// Request:
/// ```sh
/// curl -v -X PATCH -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/reminders/a7c9e1a4-6bb2-4d3e-9a43-0d3f8a7e1b2c/toggle
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "...", "isActive": false } }
/// ```
pub async fn toggle<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(reminder_id): PathParameters<Uuid>,
) -> Result<Success<ReminderResponse>, Error> {
    let reminder = fetch_reminder(&storage, &current_user.id, &reminder_id).await?;

    let values = UpdateReminderValues {
        is_active: Some(!reminder.is_active),
        ..UpdateReminderValues::default()
    };

    let reminder = storage
        .update_reminder(&reminder, &values)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(ReminderResponse::from_reminder(reminder)))
}

/// Delete a reminder
///
/// Request:
/// ```sh
/// curl -v -X DELETE -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/reminders/a7c9e1a4-6bb2-4d3e-9a43-0d3f8a7e1b2c
/// ```
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(reminder_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    let reminder = fetch_reminder(&storage, &current_user.id, &reminder_id).await?;

    storage
        .delete_reminder(&reminder)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}
