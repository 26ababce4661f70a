use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use http_body_util::BodyExt;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tower::Service;
use uuid::Uuid;

use crate::api::JwtKeys;
use crate::create_router;
use crate::password::hash;
use crate::push::Dispatcher;
use crate::push::testing::RecordingGateway;
use crate::storage::CreateUserValues;
use crate::storage::Memory;
use crate::storage::Storage;

pub const DEVELOPER_EMAIL: &str = "developer@pakhealth.test";
pub const PASSWORD: &str = "verysecret";

/// Test helper version of User struct
#[derive(Debug)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_developer: bool,
    pub has_push_token: bool,
}

/// Test helper version of Reminder struct
#[derive(Debug)]
pub struct Reminder {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub time: String,
    pub days: Map<String, Value>,
    pub notes: Option<String>,
    pub is_active: bool,
}

/// Test helper version of Notification struct
#[derive(Debug)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub notification_type: String,
    pub data: Value,
    pub is_read: bool,
    pub is_sent: bool,
}

/// Error response
#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    pub error: String,
    pub description: Option<String>,
}

/// Setup the PakHealth app with in-memory storage
pub async fn setup_test_app() -> Router {
    setup_test_app_with_gateway().await.0
}

/// Setup the PakHealth app, with a gateway that records every push
///
/// A developer account is available with [`DEVELOPER_EMAIL`] and [`PASSWORD`]
pub async fn setup_test_app_with_gateway() -> (Router, Arc<RecordingGateway>) {
    let storage = Memory::new();

    let hashed_password = hash(PASSWORD).unwrap();
    storage
        .create_user(&CreateUserValues {
            session_id: &Uuid::new_v4(),
            email: DEVELOPER_EMAIL,
            name: "Developer",
            hashed_password: &hashed_password,
            fcm_token: None,
            is_developer: true,
        })
        .await
        .unwrap();

    let gateway = RecordingGateway::new();
    let dispatcher = Dispatcher::new(gateway.clone(), Duration::from_secs(1));

    let router = create_router(storage, dispatcher, JwtKeys::new(b"verysecret"));

    (router, gateway)
}

/// Send a request, with an optional token and JSON payload
///
/// The body is parsed as JSON, an empty body is `null`
pub async fn send(
    app: &mut Router,
    method: Method,
    uri: &str,
    access_token: Option<&str>,
    payload: Option<&Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(access_token) = access_token {
        builder = builder.header(AUTHORIZATION, access_token);
    }

    let body = match payload {
        Some(payload) => {
            builder = builder.header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
            Body::from(serde_json::to_vec(payload).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (status_code, parse_body(&body))
}

/// Register with a raw body, to test malformed requests
pub async fn maybe_register_with_raw_body(
    app: &mut Router,
    body: &'static str,
    include_content_type: bool,
) -> (StatusCode, Option<Error>) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/register");

    if include_content_type {
        builder = builder.header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
    }

    let request = builder.body(Body::from(body.as_bytes())).unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (
        status_code,
        if status_code == StatusCode::BAD_REQUEST {
            Some(get_error(&parse_body(&body)))
        } else {
            None
        },
    )
}

pub async fn maybe_register(
    app: &mut Router,
    payload: &Value,
) -> (StatusCode, Option<String>, Option<String>) {
    let (status_code, body) = send(app, Method::POST, "/api/auth/register", None, Some(payload)).await;

    (
        status_code,
        if status_code == StatusCode::CREATED {
            Some(get_access_token(&body))
        } else {
            None
        },
        if status_code == StatusCode::BAD_REQUEST {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

/// Register a new user, returns the `Authorization` header value
pub async fn register_with_token(app: &mut Router, email: &str, fcm_token: Option<&str>) -> String {
    let mut payload = json!({
        "email": email,
        "password": PASSWORD,
        "name": "Ayesha",
    });

    if let Some(fcm_token) = fcm_token {
        payload["fcmToken"] = Value::String(fcm_token.to_string());
    }

    let (status_code, access_token, _) = maybe_register(app, &payload).await;
    assert_eq!(StatusCode::CREATED, status_code);

    access_token.unwrap()
}

pub async fn register(app: &mut Router, email: &str) -> String {
    register_with_token(app, email, None).await
}

pub async fn maybe_login(
    app: &mut Router,
    email: &str,
    password: &str,
) -> (StatusCode, Option<String>, Option<String>) {
    let payload = json!({
        "email": email,
        "password": password,
    });

    let (status_code, body) = send(app, Method::POST, "/api/auth/login", None, Some(&payload)).await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_access_token(&body))
        } else {
            None
        },
        if status_code == StatusCode::UNAUTHORIZED {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn login_developer(app: &mut Router) -> String {
    let (status_code, access_token, _) = maybe_login(app, DEVELOPER_EMAIL, PASSWORD).await;
    assert_eq!(StatusCode::OK, status_code);

    access_token.unwrap()
}

pub async fn profile(app: &mut Router, access_token: &str) -> (StatusCode, Option<User>) {
    let (status_code, body) = send(app, Method::GET, "/api/users/profile", Some(access_token), None).await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_user(&body))
        } else {
            None
        },
    )
}

pub async fn maybe_update_profile(
    app: &mut Router,
    access_token: &str,
    payload: &Value,
) -> (StatusCode, Option<Value>, Option<String>) {
    let (status_code, body) = send(
        app,
        Method::PUT,
        "/api/users/profile",
        Some(access_token),
        Some(payload),
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(body["data"].clone())
        } else {
            None
        },
        if status_code == StatusCode::BAD_REQUEST {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn maybe_create_reminder(
    app: &mut Router,
    access_token: &str,
    payload: &Value,
) -> (StatusCode, Option<Reminder>, Option<String>) {
    let (status_code, body) = send(
        app,
        Method::POST,
        "/api/reminders",
        Some(access_token),
        Some(payload),
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::CREATED {
            Some(get_reminder(&body))
        } else {
            None
        },
        if status_code == StatusCode::BAD_REQUEST {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn create_reminder(
    app: &mut Router,
    access_token: &str,
    title: &str,
    time: &str,
) -> Reminder {
    let payload = json!({
        "title": title,
        "type": "Medication",
        "time": time,
    });

    let (status_code, reminder, _) = maybe_create_reminder(app, access_token, &payload).await;
    assert_eq!(StatusCode::CREATED, status_code);

    reminder.unwrap()
}

pub async fn list_reminders(
    app: &mut Router,
    access_token: &str,
) -> (StatusCode, Option<Vec<Reminder>>) {
    let (status_code, body) = send(app, Method::GET, "/api/reminders", Some(access_token), None).await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_reminders(&body))
        } else {
            None
        },
    )
}

pub async fn maybe_update_reminder(
    app: &mut Router,
    access_token: &str,
    reminder_id: &Uuid,
    payload: &Value,
) -> (StatusCode, Option<Reminder>, Option<String>) {
    let (status_code, body) = send(
        app,
        Method::PUT,
        &format!("/api/reminders/{reminder_id}"),
        Some(access_token),
        Some(payload),
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_reminder(&body))
        } else {
            None
        },
        if status_code == StatusCode::BAD_REQUEST || status_code == StatusCode::NOT_FOUND {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn maybe_toggle_reminder(
    app: &mut Router,
    access_token: &str,
    reminder_id: &Uuid,
) -> (StatusCode, Option<Reminder>, Option<String>) {
    let (status_code, body) = send(
        app,
        Method::PATCH,
        &format!("/api/reminders/{reminder_id}/toggle"),
        Some(access_token),
        None,
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_reminder(&body))
        } else {
            None
        },
        if status_code == StatusCode::NOT_FOUND {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn maybe_delete_reminder(
    app: &mut Router,
    access_token: &str,
    reminder_id: &Uuid,
) -> (StatusCode, Option<String>) {
    let (status_code, body) = send(
        app,
        Method::DELETE,
        &format!("/api/reminders/{reminder_id}"),
        Some(access_token),
        None,
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::NOT_FOUND {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn list_notifications(
    app: &mut Router,
    access_token: &str,
    query: &str,
) -> (StatusCode, Option<(Vec<Notification>, u64)>) {
    let (status_code, body) = send(
        app,
        Method::GET,
        &format!("/api/notifications{query}"),
        Some(access_token),
        None,
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some((
                get_notifications(&body),
                body["data"]["unreadCount"].as_u64().unwrap(),
            ))
        } else {
            None
        },
    )
}

pub async fn maybe_create_notification(
    app: &mut Router,
    access_token: &str,
    payload: &Value,
) -> (StatusCode, Option<(Notification, Value)>, Option<String>) {
    let (status_code, body) = send(
        app,
        Method::POST,
        "/api/notifications",
        Some(access_token),
        Some(payload),
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::CREATED {
            Some((
                value_to_notification(body["data"]["notification"].as_object().unwrap()),
                body["data"]["fcmResult"].clone(),
            ))
        } else {
            None
        },
        if status_code == StatusCode::BAD_REQUEST {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

fn parse_body(body: &Bytes) -> Value {
    if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&body[..]).unwrap()
    }
}

fn value_to_user(user: &Map<String, Value>) -> User {
    User {
        id: user["id"].as_str().map(Uuid::parse_str).unwrap().unwrap(),
        email: user["email"].as_str().map(ToString::to_string).unwrap(),
        name: user["name"].as_str().map(ToString::to_string).unwrap(),
        is_developer: user["isDeveloper"].as_bool().unwrap(),
        has_push_token: user["hasPushToken"].as_bool().unwrap(),
    }
}

fn get_user(body: &Value) -> User {
    body["data"].as_object().map(value_to_user).unwrap()
}

fn value_to_reminder(reminder: &Map<String, Value>) -> Reminder {
    Reminder {
        id: reminder["id"].as_str().map(Uuid::parse_str).unwrap().unwrap(),
        title: reminder["title"].as_str().map(ToString::to_string).unwrap(),
        category: reminder["type"].as_str().map(ToString::to_string).unwrap(),
        time: reminder["time"].as_str().map(ToString::to_string).unwrap(),
        days: reminder["days"].as_object().cloned().unwrap(),
        notes: reminder
            .get("notes")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        is_active: reminder["isActive"].as_bool().unwrap(),
    }
}

fn get_reminder(body: &Value) -> Reminder {
    body["data"].as_object().map(value_to_reminder).unwrap()
}

fn get_reminders(body: &Value) -> Vec<Reminder> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_object().unwrap())
        .map(value_to_reminder)
        .collect()
}

fn value_to_notification(notification: &Map<String, Value>) -> Notification {
    Notification {
        id: notification["id"]
            .as_str()
            .map(Uuid::parse_str)
            .unwrap()
            .unwrap(),
        title: notification["title"]
            .as_str()
            .map(ToString::to_string)
            .unwrap(),
        body: notification["body"]
            .as_str()
            .map(ToString::to_string)
            .unwrap(),
        notification_type: notification["type"]
            .as_str()
            .map(ToString::to_string)
            .unwrap(),
        data: notification["data"].clone(),
        is_read: notification["isRead"].as_bool().unwrap(),
        is_sent: notification["isSent"].as_bool().unwrap(),
    }
}

fn get_notifications(body: &Value) -> Vec<Notification> {
    body["data"]["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_object().unwrap())
        .map(value_to_notification)
        .collect()
}

fn value_to_error(error: &Map<String, Value>) -> Error {
    Error {
        error: error["error"].as_str().map(ToString::to_string).unwrap(),
        description: error
            .get("description")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    }
}

pub fn get_error(body: &Value) -> Error {
    body.as_object().map(value_to_error).unwrap()
}

pub fn get_error_message(body: &Value) -> String {
    body["error"].as_str().map(ToString::to_string).unwrap()
}

fn get_access_token(body: &Value) -> String {
    body["data"]["token"]["access_token"]
        .as_str()
        .map(|access_token| format!("Bearer {access_token}"))
        .unwrap()
}
