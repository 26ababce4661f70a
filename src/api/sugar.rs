//! Blood sugar readings

use axum::Extension;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::clock::now;
use crate::storage::CreateSugarReadingValues;
use crate::storage::Storage;
use crate::sugar::Insights;
use crate::sugar::ReadingType;
use crate::sugar::SugarReading;
use crate::sugar::is_valid_value;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::utils::fetch_sugar_reading;
use super::utils::parse_timestamp;

/// The sugar reading response information
#[derive(Debug, Serialize)]
pub struct SugarReadingResponse {
    id: Uuid,
    value: f64,
    #[serde(rename = "type")]
    reading_type: ReadingType,
    notes: Option<String>,
    timestamp: NaiveDateTime,
}

impl SugarReadingResponse {
    /// Create a sugar reading response from a [`SugarReading`](SugarReading)
    fn from_reading(reading: SugarReading) -> Self {
        Self {
            id: reading.id,
            value: reading.value,
            reading_type: reading.reading_type,
            notes: reading.notes,
            timestamp: reading.timestamp,
        }
    }

    /// Create sugar reading responses from multiple [`SugarReading`](SugarReading)s
    fn from_reading_multiple(mut readings: Vec<SugarReading>) -> Vec<Self> {
        readings
            .drain(..)
            .map(Self::from_reading)
            .collect::<Vec<Self>>()
    }
}

/// List all sugar readings of the current user, newest first
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/sugar
/// ```
///
/// Response:
/// ```json
/// { "data": [ { "id": "...", "value": 112.0, "type": "Fasting", "notes": null, "timestamp": "2024-03-01T07:30:00" } ] }
/// ```
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<SugarReadingResponse>>, Error> {
    let readings = storage
        .find_sugar_readings_by_user(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(SugarReadingResponse::from_reading_multiple(
        readings,
    )))
}

/// Create sugar reading form
#[derive(Debug, Deserialize)]
pub struct CreateSugarReadingForm {
    /// In mg/dL
    value: Option<f64>,
    #[serde(rename = "type")]
    reading_type: Option<String>,
    notes: Option<String>,

    /// Moment of the reading, now when left out
    timestamp: Option<String>,
}

/// Log a sugar reading
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "value": 112, "type": "Fasting" }' \
///     http://localhost:5000/api/sugar
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "...", "value": 112.0, "type": "Fasting", "notes": null, "timestamp": "2024-03-01T07:30:00" } }
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<CreateSugarReadingForm>,
) -> Result<Success<SugarReadingResponse>, Error> {
    let Some(value) = form.value.filter(|value| is_valid_value(*value)) else {
        return Err(Error::bad_request(
            "Please provide a valid sugar value (0-600)",
        ));
    };

    let reading_type = form
        .reading_type
        .as_deref()
        .and_then(|reading_type| reading_type.parse::<ReadingType>().ok())
        .ok_or_else(|| {
            Error::bad_request("Invalid reading type").with_description(
                r#"Must be "Fasting", "Before Meal", "After Meal" or "Bedtime""#,
            )
        })?;

    let timestamp = match form.timestamp.as_deref() {
        Some(timestamp) => parse_timestamp(timestamp)?,
        None => now(),
    };

    let values = CreateSugarReadingValues {
        user_id: &current_user.id,
        value,
        reading_type,
        notes: form.notes.as_deref().filter(|notes| !notes.is_empty()),
        timestamp,
    };

    let reading = storage
        .create_sugar_reading(&values)
        .await
        .map_err(Error::internal_server_error)?;

    tracing::debug!(reading_id = %reading.id, "Sugar reading of {value} logged");

    Ok(Success::created(SugarReadingResponse::from_reading(reading)))
}

/// Delete a sugar reading
///
/// Request:
/// ```sh
/// curl -v -X DELETE -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/sugar/0f6d1c1e-3a4b-4f7e-8d52-52f8c1d7a9b3
/// ```
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(reading_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    let reading = fetch_sugar_reading(&storage, &current_user.id, &reading_id).await?;

    storage
        .delete_sugar_reading(&reading)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}

/// Insights into all sugar readings of the current user
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/sugar/insights
/// ```
///
/// Response:
/// ```json
/// { "data": { "insights": ["Great job! ..."], "statistics": { "total": 4, "high": 1, "low": 0, "normal": 3, "average": 131 } } }
/// ```
pub async fn insights<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<Insights>, Error> {
    let mut readings = storage
        .find_sugar_readings_by_user(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    // oldest first
    readings.reverse();

    Ok(Success::ok(crate::sugar::insights(&readings)))
}
