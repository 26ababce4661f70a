//! Foot-care exercise logs
//!
//! A user has a single record per day, logging again on the same day adds to it

use axum::Extension;
use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::clock::now;
use crate::foot_health::FootHealthRecord;
use crate::foot_health::Period;
use crate::foot_health::Statistics;
use crate::foot_health::statistics;
use crate::storage::CreateFootHealthValues;
use crate::storage::Storage;
use crate::storage::UpdateFootHealthValues;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::QueryParameters;
use super::Success;
use super::utils::fetch_foot_health_record;
use super::utils::parse_count;
use super::utils::parse_date;

/// The foot health record response information
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FootHealthResponse {
    id: Uuid,
    date: NaiveDate,
    steps: u32,
    rollers: u32,
    resisted_exercise: u32,
    notes: Option<String>,
}

impl FootHealthResponse {
    /// Create a foot health response from a [`FootHealthRecord`](FootHealthRecord)
    fn from_record(record: FootHealthRecord) -> Self {
        Self {
            id: record.id,
            date: record.date,
            steps: record.steps,
            rollers: record.rollers,
            resisted_exercise: record.resisted_exercise,
            notes: record.notes,
        }
    }

    /// Create foot health responses from multiple [`FootHealthRecord`](FootHealthRecord)s
    fn from_record_multiple(mut records: Vec<FootHealthRecord>) -> Vec<Self> {
        records
            .drain(..)
            .map(Self::from_record)
            .collect::<Vec<Self>>()
    }
}

/// Exercise counters sent by a client, validated
struct Counters {
    steps: Option<u32>,
    rollers: Option<u32>,
    resisted_exercise: Option<u32>,
}

impl Counters {
    fn parse(
        steps: Option<i64>,
        rollers: Option<i64>,
        resisted_exercise: Option<i64>,
    ) -> Result<Self, Error> {
        Ok(Self {
            steps: parse_count(steps, "Steps")?,
            rollers: parse_count(rollers, "Rollers")?,
            resisted_exercise: parse_count(resisted_exercise, "Resisted exercise")?,
        })
    }
}

/// List all foot health records of the current user, newest date first
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/foot-health
/// ```
///
/// Response:
/// ```json
/// { "data": [ { "id": "...", "date": "2024-03-01", "steps": 4200, "rollers": 2, "resistedExercise": 1, "notes": null } ] }
/// ```
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<FootHealthResponse>>, Error> {
    let records = storage
        .find_foot_health_records_by_user(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(FootHealthResponse::from_record_multiple(records)))
}

/// Log foot health form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFootHealthForm {
    /// Today when left out
    date: Option<String>,
    steps: Option<i64>,
    rollers: Option<i64>,
    #[serde(alias = "resisted_exercise")]
    resisted_exercise: Option<i64>,
    notes: Option<String>,
}

/// Log exercises for a day
///
/// When the day already has a record the counters are added to it (`200 OK`), otherwise a new
/// record is created (`201 Created`)
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "date": "2024-03-01", "steps": 1200, "rollers": 1 }' \
///     http://localhost:5000/api/foot-health
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "...", "date": "2024-03-01", "steps": 1200, "rollers": 1, "resistedExercise": 0, "notes": null } }
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<CreateFootHealthForm>,
) -> Result<Success<FootHealthResponse>, Error> {
    let counters = Counters::parse(form.steps, form.rollers, form.resisted_exercise)?;

    let date = match form.date.as_deref() {
        Some(date) => parse_date(date)?,
        None => now().date(),
    };

    let notes = form.notes.as_deref().filter(|notes| !notes.is_empty());

    let existing = storage
        .find_foot_health_record_by_date(&current_user.id, date)
        .await
        .map_err(Error::internal_server_error)?;

    if let Some(record) = existing {
        let values = UpdateFootHealthValues {
            steps: Some(record.steps.saturating_add(counters.steps.unwrap_or_default())),
            rollers: Some(
                record
                    .rollers
                    .saturating_add(counters.rollers.unwrap_or_default()),
            ),
            resisted_exercise: Some(
                record
                    .resisted_exercise
                    .saturating_add(counters.resisted_exercise.unwrap_or_default()),
            ),
            notes,
        };

        let record = storage
            .update_foot_health_record(&record, &values)
            .await
            .map_err(Error::internal_server_error)?;

        return Ok(Success::ok(FootHealthResponse::from_record(record)));
    }

    let values = CreateFootHealthValues {
        user_id: &current_user.id,
        date,
        steps: counters.steps.unwrap_or_default(),
        rollers: counters.rollers.unwrap_or_default(),
        resisted_exercise: counters.resisted_exercise.unwrap_or_default(),
        notes,
    };

    let record = storage
        .create_foot_health_record(&values)
        .await
        .map_err(Error::internal_server_error)?;

    tracing::debug!(record_id = %record.id, "Foot health logged for {date}");

    Ok(Success::created(FootHealthResponse::from_record(record)))
}

/// Update foot health form, every field is optional
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFootHealthForm {
    steps: Option<i64>,
    rollers: Option<i64>,
    #[serde(alias = "resisted_exercise")]
    resisted_exercise: Option<i64>,
    notes: Option<String>,
}

/// Overwrite the counters of a record
///
/// Request:
/// ```sh
/// curl -v -X PUT -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "steps": 5000 }' \
///     http://localhost:5000/api/foot-health/5b0f8b52-93a3-4c71-b1a4-3f1e6f0e2d11
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "...", "date": "2024-03-01", "steps": 5000, "rollers": 1, "resistedExercise": 0, "notes": null } }
/// ```
pub async fn update<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(record_id): PathParameters<Uuid>,
    Form(form): Form<UpdateFootHealthForm>,
) -> Result<Success<FootHealthResponse>, Error> {
    let record = fetch_foot_health_record(&storage, &current_user.id, &record_id).await?;

    let counters = Counters::parse(form.steps, form.rollers, form.resisted_exercise)?;

    let values = UpdateFootHealthValues {
        steps: counters.steps,
        rollers: counters.rollers,
        resisted_exercise: counters.resisted_exercise,
        notes: form.notes.as_deref(),
    };

    let record = storage
        .update_foot_health_record(&record, &values)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(FootHealthResponse::from_record(record)))
}

/// Delete a foot health record
///
/// Request:
/// ```sh
/// curl -v -X DELETE -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/foot-health/5b0f8b52-93a3-4c71-b1a4-3f1e6f0e2d11
/// ```
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(record_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    let record = fetch_foot_health_record(&storage, &current_user.id, &record_id).await?;

    storage
        .delete_foot_health_record(&record)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}

/// Statistics query
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// `today`, `week`, `month` or `all` (default)
    period: Option<Period>,
}

/// Totals and daily averages over a period
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     'http://localhost:5000/api/foot-health/stats?period=week'
/// ```
///
/// Response:
/// ```json
/// { "data": { "totalSteps": 8400, "totalRollers": 4, "totalResistedExercise": 2, "avgSteps": 4200, "avgRollers": 2, "avgResistedExercise": 1, "totalDays": 2 } }
/// ```
pub async fn stats<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    QueryParameters(query): QueryParameters<StatsQuery>,
) -> Result<Success<Statistics>, Error> {
    let records = storage
        .find_foot_health_records_by_user(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    let period = query.period.unwrap_or_default();

    Ok(Success::ok(statistics(
        &records,
        period,
        now().date(),
    )))
}
