//! Wearable devices and their exercise telemetry

use axum::Extension;
use chrono::DateTime;
use chrono::Local;
use chrono::NaiveDateTime;
use chrono::Utc;
use serde::Deserialize;

use crate::clock::now;
use crate::devices::DEFAULT_READINGS_LIMIT;
use crate::devices::DeviceReading;
use crate::devices::SessionStats;
use crate::devices::UserDevice;
use crate::devices::session_stats;
use crate::storage::CreateDeviceReadingValues;
use crate::storage::DeviceReadingFilter;
use crate::storage::Storage;
use crate::storage::UpdateUserValues;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::QueryParameters;
use super::Success;
use super::utils::parse_timestamp;

/// Measurements of a single telemetry message
#[derive(Debug, Default, Deserialize)]
pub struct MetricsForm {
    angle_deg: Option<f64>,
    force_n: Option<f64>,
    velocity: Option<f64>,
}

/// Repetition progress of a single telemetry message
#[derive(Debug, Default, Deserialize)]
pub struct RepsForm {
    current: Option<i32>,
    target: Option<i32>,
}

/// Timestamp of a device, either text or milliseconds since the epoch
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DeviceTimestamp {
    Millis(i64),
    Text(String),
}

impl DeviceTimestamp {
    fn parse(&self) -> Result<NaiveDateTime, Error> {
        match self {
            Self::Millis(millis) => DateTime::<Utc>::from_timestamp_millis(*millis)
                .map(|timestamp| timestamp.with_timezone(&Local).naive_local())
                .ok_or_else(|| Error::bad_request("Invalid timestamp")),
            Self::Text(text) => parse_timestamp(text),
        }
    }
}

/// Telemetry form, as sent by the devices
#[derive(Debug, Deserialize)]
pub struct DeviceDataForm {
    device_id: Option<String>,
    patient_id: Option<String>,
    session_id: Option<String>,
    exercise: Option<String>,
    #[serde(default)]
    metrics: MetricsForm,
    #[serde(default)]
    reps: RepsForm,
    battery: Option<i32>,

    /// Moment of the measurement, now when left out
    timestamp: Option<DeviceTimestamp>,
}

/// Store a telemetry message of a device
///
/// The device is remembered for the user as well
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "device_id": "esp32-1", "session_id": "s-42", "exercise": "ankle-flex", "metrics": { "angle_deg": 32.5 }, "reps": { "current": 3, "target": 10 }, "battery": 87 }' \
///     http://localhost:5000/api/device/data
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "...", "device_id": "esp32-1", "session_id": "s-42", "exercise": "ankle-flex", "angle_deg": 32.5, "current_reps": 3, "target_reps": 10, ... } }
/// ```
pub async fn data<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<DeviceDataForm>,
) -> Result<Success<DeviceReading>, Error> {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let (Some(device_id), Some(session_id), Some(exercise)) = (
        non_empty(&form.device_id),
        non_empty(&form.session_id),
        non_empty(&form.exercise),
    ) else {
        return Err(Error::bad_request(
            "Please provide device_id, session_id and exercise",
        ));
    };

    let now = now();
    let device_timestamp = match &form.timestamp {
        Some(timestamp) => timestamp.parse()?,
        None => now,
    };

    let values = CreateDeviceReadingValues {
        user_id: &current_user.id,
        device_id: &device_id,
        patient_id: form.patient_id.as_deref().filter(|id| !id.is_empty()),
        session_id: &session_id,
        exercise: &exercise,
        angle_deg: form.metrics.angle_deg,
        force_n: form.metrics.force_n,
        velocity: form.metrics.velocity,
        current_reps: form.reps.current.unwrap_or_default(),
        target_reps: form.reps.target.unwrap_or_default(),
        battery: form.battery,
        device_timestamp,
    };

    let reading = storage
        .create_device_reading(&values)
        .await
        .map_err(Error::internal_server_error)?;

    storage
        .save_user_device(&current_user.id, &device_id, None, now)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::created(reading))
}

/// Telemetry query, every field is optional
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsQuery {
    #[serde(alias = "session_id")]
    session_id: Option<String>,
    exercise: Option<String>,
    limit: Option<usize>,
}

/// List telemetry of the current user, newest first
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     'http://localhost:5000/api/device/sessions?sessionId=s-42&limit=20'
/// ```
///
/// Response:
/// ```json
/// { "data": [ { "id": "...", "device_id": "esp32-1", "session_id": "s-42", ... } ] }
/// ```
pub async fn sessions<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    QueryParameters(query): QueryParameters<SessionsQuery>,
) -> Result<Success<Vec<DeviceReading>>, Error> {
    let filter = DeviceReadingFilter {
        session_id: query.session_id.as_deref(),
        exercise: query.exercise.as_deref(),
        limit: Some(query.limit.unwrap_or(DEFAULT_READINGS_LIMIT)),
    };

    let readings = storage
        .find_device_readings(&current_user.id, &filter)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(readings))
}

/// Latest telemetry query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestQuery {
    #[serde(alias = "session_id")]
    session_id: Option<String>,
}

/// The most recent telemetry message of the current user, if any
///
/// Optionally limited to a single session
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     'http://localhost:5000/api/device/latest?sessionId=s-42'
/// ```
///
/// Response:
/// ```json
/// { "data": null }
/// ```
pub async fn latest<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    QueryParameters(query): QueryParameters<LatestQuery>,
) -> Result<Success<Option<DeviceReading>>, Error> {
    let filter = DeviceReadingFilter {
        session_id: query.session_id.as_deref(),
        limit: Some(1),
        ..DeviceReadingFilter::default()
    };

    let mut readings = storage
        .find_device_readings(&current_user.id, &filter)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(readings.drain(..).next()))
}

/// Summary of a single session
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/device/sessions/s-42/stats
/// ```
///
/// Response:
/// ```json
/// { "data": { "session_id": "s-42", "exercise": "ankle-flex", "total_readings": 30, "max_reps": 10, ... } }
/// ```
pub async fn stats<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(session_id): PathParameters<String>,
) -> Result<Success<SessionStats>, Error> {
    let filter = DeviceReadingFilter {
        session_id: Some(session_id.as_str()),
        ..DeviceReadingFilter::default()
    };

    let readings = storage
        .find_device_readings(&current_user.id, &filter)
        .await
        .map_err(Error::internal_server_error)?;

    session_stats(&readings)
        .map(Success::ok)
        .ok_or_else(|| Error::not_found("Session not found"))
}

/// Delete all telemetry of a session
///
/// Request:
/// ```sh
/// curl -v -X DELETE -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/device/sessions/s-42
/// ```
pub async fn delete_session<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(session_id): PathParameters<String>,
) -> Result<Success<&'static str>, Error> {
    let deleted = storage
        .delete_device_session(&current_user.id, &session_id)
        .await
        .map_err(Error::internal_server_error)?;

    if deleted == 0 {
        return Err(Error::not_found("Session not found"));
    }

    tracing::debug!(%session_id, "Deleted {deleted} readings");

    Ok(Success::<&'static str>::no_content())
}

/// List the devices of the current user, most recently seen first
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/device/devices
/// ```
///
/// Response:
/// ```json
/// { "data": [ { "id": "...", "device_id": "esp32-1", "device_name": "Left ankle", "last_seen": "2024-03-01T09:00:00" } ] }
/// ```
pub async fn devices<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<UserDevice>>, Error> {
    let devices = storage
        .find_user_devices(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(devices))
}

/// Register device form
#[derive(Debug, Deserialize)]
pub struct RegisterDeviceForm {
    device_id: Option<String>,
    device_name: Option<String>,
}

/// Register a device, or rename a known one
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "device_id": "esp32-1", "device_name": "Left ankle" }' \
///     http://localhost:5000/api/device/register
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "...", "device_id": "esp32-1", "device_name": "Left ankle", "last_seen": "2024-03-01T09:00:00" } }
/// ```
pub async fn register<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<RegisterDeviceForm>,
) -> Result<Success<UserDevice>, Error> {
    let Some(device_id) = form
        .device_id
        .as_deref()
        .map(str::trim)
        .filter(|device_id| !device_id.is_empty())
    else {
        return Err(Error::bad_request("Please provide device_id"));
    };

    let device_name = form.device_name.as_deref().filter(|name| !name.is_empty());

    let device = storage
        .save_user_device(
            &current_user.id,
            device_id,
            Some(device_name),
            now(),
        )
        .await
        .map_err(Error::internal_server_error)?;

    tracing::debug!(%device_id, "Device registered");

    Ok(Success::created(device))
}

/// Push token form
#[derive(Debug, Deserialize)]
pub struct PushTokenForm {
    #[serde(alias = "fcmToken")]
    fcm_token: Option<String>,
}

/// Replace the push token of the current user
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "fcm_token": "device token" }' \
///     http://localhost:5000/api/device/fcm-token
/// ```
pub async fn fcm_token<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<PushTokenForm>,
) -> Result<Success<&'static str>, Error> {
    let Some(fcm_token) = form
        .fcm_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
    else {
        return Err(Error::bad_request("Please provide fcm_token"));
    };

    let values = UpdateUserValues {
        fcm_token: Some(fcm_token),
        ..UpdateUserValues::default()
    };

    storage
        .update_user(&current_user, &values)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}
