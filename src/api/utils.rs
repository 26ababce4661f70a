//! Utility functions for the API

use chrono::DateTime;
use chrono::Local;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::api::Error;
use crate::foot_health::FootHealthRecord;
use crate::notifications::Notification;
use crate::reminders::Reminder;
use crate::storage::Storage;
use crate::sugar::SugarReading;

/// Fetch a reminder of the user from storage
pub async fn fetch_reminder<S: Storage>(
    storage: &S,
    user_id: &Uuid,
    reminder_id: &Uuid,
) -> Result<Reminder, Error> {
    storage
        .find_single_reminder_by_id(user_id, reminder_id)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found("Reminder not found")), Ok)
}

/// Fetch a notification of the user from storage
pub async fn fetch_notification<S: Storage>(
    storage: &S,
    user_id: &Uuid,
    notification_id: &Uuid,
) -> Result<Notification, Error> {
    storage
        .find_single_notification_by_id(user_id, notification_id)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found("Notification not found")), Ok)
}

/// Fetch a sugar reading of the user from storage
pub async fn fetch_sugar_reading<S: Storage>(
    storage: &S,
    user_id: &Uuid,
    reading_id: &Uuid,
) -> Result<SugarReading, Error> {
    storage
        .find_single_sugar_reading_by_id(user_id, reading_id)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found("Sugar reading not found")), Ok)
}

/// Fetch a foot health record of the user from storage
pub async fn fetch_foot_health_record<S: Storage>(
    storage: &S,
    user_id: &Uuid,
    record_id: &Uuid,
) -> Result<FootHealthRecord, Error> {
    storage
        .find_single_foot_health_record_by_id(user_id, record_id)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found("Foot health record not found")), Ok)
}

/// Parse a timestamp sent by a client
///
/// RFC 3339 timestamps are converted to server-local time, timestamps without offset are taken
/// as is
pub fn parse_timestamp(timestamp: &str) -> Result<NaiveDateTime, Error> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(timestamp.with_timezone(&Local).naive_local());
    }

    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|err| Error::bad_request("Invalid timestamp").with_description(err))
}

/// Parse a date sent by a client, only the date part of a timestamp is used
pub fn parse_date(date: &str) -> Result<NaiveDate, Error> {
    date.get(..10)
        .unwrap_or(date)
        .parse::<NaiveDate>()
        .map_err(|err| Error::bad_request("Invalid date").with_description(err))
}

/// Parse a counter sent by a client, it can not be negative
pub fn parse_count(count: Option<i64>, name: &str) -> Result<Option<u32>, Error> {
    count
        .map(|count| {
            u32::try_from(count)
                .map_err(|_| Error::bad_request(format!("{name} must be a positive number")))
        })
        .transpose()
}
