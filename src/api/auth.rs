//! Registration and sessions

use axum::Extension;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::clock::now;
use crate::password::MIN_PASSWORD_LENGTH;
use crate::password::hash;
use crate::password::verify;
use crate::storage::CreateUserValues;
use crate::storage::Storage;
use crate::storage::UpdateUserValues;
use crate::users::is_valid_email;
use crate::users::normalize_email;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::JwtKeys;
use super::Success;
use super::current_user::Token;
use super::current_user::generate_token;
use super::users::UserResponse;

/// A token together with the user it belongs to
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    token: Token,
    user: UserResponse,
}

/// Register form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    email: String,
    password: String,
    name: String,

    /// Push token of the device registering
    #[serde(alias = "fcm_token")]
    fcm_token: Option<String>,
}

/// Create a new account
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "email": "ayesha@example.com", "password": "verysecret", "name": "Ayesha" }' \
///     http://localhost:5000/api/auth/register
/// ```
///
/// Response:
/// ```json
/// { "data": { "token": { "token_type": "Bearer", "expires_in": 3600, "access_token": "some token" }, "user": { ... } } }
/// ```
pub async fn register<S: Storage>(
    Extension(jwt_keys): Extension<JwtKeys>,
    Extension(storage): Extension<S>,
    Form(form): Form<RegisterForm>,
) -> Result<Success<AuthResponse>, Error> {
    let email = normalize_email(&form.email);
    if !is_valid_email(&email) {
        return Err(Error::bad_request("Please provide a valid email address"));
    }

    if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }

    let name = form.name.trim();
    if name.is_empty() {
        return Err(Error::bad_request("Please provide a name"));
    }

    let existing_user = storage
        .find_single_user_by_email(&email)
        .await
        .map_err(Error::internal_server_error)?;

    if existing_user.is_some() {
        return Err(Error::bad_request("Email already registered"));
    }

    let hashed_password = hash(&form.password).map_err(Error::internal_server_error)?;

    let values = CreateUserValues {
        session_id: &Uuid::new_v4(),
        email: &email,
        name,
        hashed_password: &hashed_password,
        fcm_token: form.fcm_token.as_deref().filter(|token| !token.is_empty()),
        is_developer: false,
    };

    let user = storage
        .create_user(&values)
        .await
        .map_err(Error::internal_server_error)?;

    tracing::info!(user_id = %user.id, "User registered");

    let token = generate_token(&jwt_keys, &user)?;

    Ok(Success::created(AuthResponse {
        token,
        user: UserResponse::from_user(user),
    }))
}

/// Login form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    email: String,
    password: String,

    /// Push token of the device logging in, replaces the current one
    #[serde(alias = "fcm_token")]
    fcm_token: Option<String>,
}

/// Get a token for a user "session"
///
/// The token can then be used to access the rest of the API routes by using it in the
/// `Authorization` header
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "email": "ayesha@example.com", "password": "verysecret", "fcmToken": "device token" }' \
///     http://localhost:5000/api/auth/login
/// ```
///
/// Response:
/// ```json
/// { "data": { "token": { "token_type": "Bearer", "expires_in": 3600, "access_token": "some token" }, "user": { ... } } }
/// ```
pub async fn login<S: Storage>(
    Extension(jwt_keys): Extension<JwtKeys>,
    Extension(storage): Extension<S>,
    Form(form): Form<LoginForm>,
) -> Result<Success<AuthResponse>, Error> {
    let user = storage
        .find_single_user_by_email(&normalize_email(&form.email))
        .await
        .map_err(Error::internal_server_error)?;

    let Some(user) = user.filter(|user| verify(&user.hashed_password, &form.password)) else {
        return Err(Error::unauthorized("Invalid email or password"));
    };

    let values = UpdateUserValues {
        fcm_token: form.fcm_token.as_deref().filter(|token| !token.is_empty()),
        last_active: Some(now()),
        ..UpdateUserValues::default()
    };

    let user = storage
        .update_user(&user, &values)
        .await
        .map_err(Error::internal_server_error)?;

    let token = generate_token(&jwt_keys, &user)?;

    Ok(Success::ok(AuthResponse {
        token,
        user: UserResponse::from_user(user),
    }))
}

/// Revoke all tokens of the current user
///
/// Request:
/// ```sh
/// curl -v -X POST -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:5000/api/auth/logout
/// ```
pub async fn logout<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<&'static str>, Error> {
    let session_id = Uuid::new_v4();
    let values = UpdateUserValues {
        session_id: Some(&session_id),
        ..UpdateUserValues::default()
    };

    storage
        .update_user(&current_user, &values)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}
