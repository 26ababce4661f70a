//! User profile management

use std::ops::Deref;

use axum::Extension;
use chrono::Datelike;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::clock::now;
use crate::storage::Storage;
use crate::storage::UpdateUserValues;
use crate::users::DiabetesType;
use crate::users::Gender;
use crate::users::MAX_AGE;
use crate::users::MIN_DIAGNOSIS_YEAR;
use crate::users::User;
use crate::users::is_valid_diagnosis_year;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::Success;

/// The user response information
///
/// A subset of all the information, ready to be serialized for the outside world
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub profile_image: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    pub diabetes_type: Option<DiabetesType>,
    pub diagnosis_year: Option<i32>,
    pub medications: Vec<String>,
    pub is_developer: bool,

    /// Can the user receive push notifications?
    pub has_push_token: bool,

    pub created_at: NaiveDateTime,
    pub last_active: Option<NaiveDateTime>,
}

impl UserResponse {
    /// Create a user response from a [`User`](User)
    pub fn from_user(user: User) -> Self {
        Self {
            id: user.id,
            has_push_token: user.push_token().is_some(),
            email: user.email,
            name: user.name,
            profile_image: user.profile_image,
            age: user.age,
            gender: user.gender,
            diabetes_type: user.diabetes_type,
            diagnosis_year: user.diagnosis_year,
            medications: user.medications,
            is_developer: user.is_developer,
            created_at: user.created_at,
            last_active: user.last_active,
        }
    }
}

/// Get the profile of the current user
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/users/profile
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "...", "email": "ayesha@example.com", "name": "Ayesha", "medications": [] } }
/// ```
pub async fn profile<S: Storage>(current_user: CurrentUser<S>) -> Success<UserResponse> {
    Success::ok(UserResponse::from_user(current_user.deref().clone()))
}

/// Update profile form, every field is optional
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileForm {
    name: Option<String>,
    #[serde(alias = "profile_image")]
    profile_image: Option<String>,
    age: Option<i64>,
    gender: Option<String>,
    #[serde(alias = "diabetes_type")]
    diabetes_type: Option<String>,
    #[serde(alias = "diagnosis_year")]
    diagnosis_year: Option<i32>,

    /// Replaces all medications of the user
    medications: Option<Vec<String>>,
}

/// Update the profile of the current user
///
/// Request:
/// ```sh
/// curl -v -X PUT -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "age": 42, "diabetesType": "Type 2", "medications": ["Metformin"] }' \
///     http://localhost:5000/api/users/profile
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "...", "age": 42, "diabetesType": "Type 2", "medications": ["Metformin"] } }
/// ```
pub async fn update_profile<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<UpdateProfileForm>,
) -> Result<Success<UserResponse>, Error> {
    let name = form.name.as_deref().map(str::trim);
    if name.is_some_and(str::is_empty) {
        return Err(Error::bad_request("Name can not be empty"));
    }

    let age = form
        .age
        .map(|age| {
            u8::try_from(age)
                .ok()
                .filter(|age| *age <= MAX_AGE)
                .ok_or_else(|| Error::bad_request("Please provide a valid age"))
        })
        .transpose()?;

    let gender = form
        .gender
        .as_deref()
        .map(|gender| {
            gender
                .parse::<Gender>()
                .map_err(|_| Error::bad_request("Invalid gender value"))
        })
        .transpose()?;

    let diabetes_type = form
        .diabetes_type
        .as_deref()
        .map(|diabetes_type| {
            diabetes_type.parse::<DiabetesType>().map_err(|_| {
                Error::bad_request(
                    r#"Invalid diabetes type, must be "Type 1", "Type 2" or "Gestational""#,
                )
            })
        })
        .transpose()?;

    let now = now();
    if let Some(year) = form.diagnosis_year
        && !is_valid_diagnosis_year(year, now)
    {
        return Err(Error::bad_request(format!(
            "Please provide a valid diagnosis year between {MIN_DIAGNOSIS_YEAR} and {}",
            now.year()
        )));
    }

    let medications = form.medications.map(|medications| {
        medications
            .iter()
            .map(|medication| medication.trim().to_string())
            .filter(|medication| !medication.is_empty())
            .collect::<Vec<_>>()
    });

    let values = UpdateUserValues {
        name,
        profile_image: form.profile_image.as_deref(),
        age,
        gender,
        diabetes_type,
        diagnosis_year: form.diagnosis_year,
        medications: medications.as_deref(),
        ..UpdateUserValues::default()
    };

    let user = storage
        .update_user(&current_user, &values)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(UserResponse::from_user(user)))
}

/// A user as seen on the developer dashboard
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardUserResponse {
    #[serde(flatten)]
    user: UserResponse,
    sugar_readings_count: usize,
    active_reminders_count: usize,
    foot_health_count: usize,
}

/// List all (non-developer) users with the amount of data they track
///
/// Only available for developers
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/users/all
/// ```
///
/// Response:
/// ```json
/// { "data": [ { "id": "...", "email": "ayesha@example.com", "sugarReadingsCount": 12, "activeRemindersCount": 2, "footHealthCount": 4 } ] }
/// ```
pub async fn all<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<DashboardUserResponse>>, Error> {
    current_user.require_developer()?;

    let users = storage
        .find_all_users()
        .await
        .map_err(Error::internal_server_error)?;

    let mut responses = Vec::with_capacity(users.len());
    for user in users.into_iter().filter(|user| !user.is_developer) {
        let sugar_readings_count = storage
            .find_sugar_readings_by_user(&user.id)
            .await
            .map_err(Error::internal_server_error)?
            .len();

        let active_reminders_count = storage
            .find_all_reminders_by_user(&user.id)
            .await
            .map_err(Error::internal_server_error)?
            .iter()
            .filter(|reminder| reminder.is_active)
            .count();

        let foot_health_count = storage
            .find_foot_health_records_by_user(&user.id)
            .await
            .map_err(Error::internal_server_error)?
            .len();

        responses.push(DashboardUserResponse {
            user: UserResponse::from_user(user),
            sugar_readings_count,
            active_reminders_count,
            foot_health_count,
        });
    }

    Ok(Success::ok(responses))
}
