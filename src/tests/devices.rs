use axum::http::Method;
use axum::http::StatusCode;
use chrono::DateTime;
use chrono::Local;
use serde_json::Value;
use serde_json::json;

use crate::tests::helper;

async fn send_data(
    app: &mut axum::Router,
    access_token: &str,
    payload: &Value,
) -> (StatusCode, Value) {
    helper::send(
        app,
        Method::POST,
        "/api/device/data",
        Some(access_token),
        Some(payload),
    )
    .await
}

fn reading(session_id: &str, exercise: &str, reps: i32, timestamp: &str) -> Value {
    json!({
        "device_id": "esp32-1",
        "session_id": session_id,
        "exercise": exercise,
        "metrics": { "angle_deg": 30.0 + f64::from(reps), "force_n": 12.5 },
        "reps": { "current": reps, "target": 10 },
        "battery": 90 - reps,
        "timestamp": timestamp,
    })
}

#[tokio::test]
async fn test_data() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::register(&mut app, "ayesha@example.com").await;

    let (status_code, body) = helper::send(
        &mut app,
        Method::GET,
        "/api/device/latest",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    assert!(body["data"].is_null());

    let payload = reading("s-1", "ankle-flex", 3, "2024-03-01T09:00:00");
    let (status_code, body) = send_data(&mut app, &access_token, &payload).await;
    assert_eq!(StatusCode::CREATED, status_code);
    assert_eq!("esp32-1", body["data"]["device_id"]);
    assert_eq!("s-1", body["data"]["session_id"]);
    assert_eq!(Some(3), body["data"]["current_reps"].as_i64());
    assert_eq!(Some(10), body["data"]["target_reps"].as_i64());
    assert_eq!(Some(33.0), body["data"]["angle_deg"].as_f64());
    assert!(body["data"]["velocity"].is_null());

    // milliseconds since the epoch, 2024-03-02T09:01:00Z
    let millis = 1_709_370_060_000_i64;
    let expected = DateTime::from_timestamp_millis(millis)
        .unwrap()
        .with_timezone(&Local)
        .naive_local();

    let payload = json!({
        "device_id": "esp32-1",
        "session_id": "s-1",
        "exercise": "ankle-flex",
        "timestamp": millis,
    });
    let (status_code, body) = send_data(&mut app, &access_token, &payload).await;
    assert_eq!(StatusCode::CREATED, status_code);
    assert_eq!(json!(expected), body["data"]["device_timestamp"]);
    assert_eq!(Some(0), body["data"]["current_reps"].as_i64());

    let (status_code, body) = helper::send(
        &mut app,
        Method::GET,
        "/api/device/latest",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(json!(expected), body["data"]["device_timestamp"]);

    // the device is remembered
    let (status_code, body) = helper::send(
        &mut app,
        Method::GET,
        "/api/device/devices",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    let devices = body["data"].as_array().unwrap();
    assert_eq!(1, devices.len());
    assert_eq!("esp32-1", devices[0]["device_id"]);
    assert!(devices[0]["device_name"].is_null());
}

#[tokio::test]
async fn test_data_validation() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::register(&mut app, "ayesha@example.com").await;

    for payload in [
        json!({ "session_id": "s-1", "exercise": "ankle-flex" }),
        json!({ "device_id": "esp32-1", "exercise": "ankle-flex" }),
        json!({ "device_id": "esp32-1", "session_id": " ", "exercise": "ankle-flex" }),
        json!({ "device_id": "esp32-1", "session_id": "s-1" }),
    ] {
        let (status_code, body) = send_data(&mut app, &access_token, &payload).await;
        assert_eq!(StatusCode::BAD_REQUEST, status_code);
        assert_eq!(
            "Please provide device_id, session_id and exercise",
            helper::get_error_message(&body)
        );
    }

    let payload = reading("s-1", "ankle-flex", 1, "not a time");
    let (status_code, body) = send_data(&mut app, &access_token, &payload).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!("Invalid timestamp", helper::get_error_message(&body));
}

#[tokio::test]
async fn test_sessions() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::register(&mut app, "ayesha@example.com").await;

    for (session_id, exercise, reps, timestamp) in [
        ("s-1", "ankle-flex", 1, "2024-03-01T09:00:00"),
        ("s-1", "ankle-flex", 2, "2024-03-01T09:00:10"),
        ("s-1", "ankle-flex", 4, "2024-03-01T09:00:20"),
        ("s-2", "toe-curl", 1, "2024-03-02T09:00:00"),
    ] {
        let payload = reading(session_id, exercise, reps, timestamp);
        let (status_code, _) = send_data(&mut app, &access_token, &payload).await;
        assert_eq!(StatusCode::CREATED, status_code);
    }

    let (status_code, body) = helper::send(
        &mut app,
        Method::GET,
        "/api/device/sessions",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    let readings = body["data"].as_array().unwrap();
    assert_eq!(4, readings.len());
    // newest first
    assert_eq!("s-2", readings[0]["session_id"]);

    let (_, body) = helper::send(
        &mut app,
        Method::GET,
        "/api/device/latest?sessionId=s-1",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!("s-1", body["data"]["session_id"]);
    assert_eq!(Some(4), body["data"]["current_reps"].as_i64());

    let (_, body) = helper::send(
        &mut app,
        Method::GET,
        "/api/device/sessions?sessionId=s-1&limit=2",
        Some(&access_token),
        None,
    )
    .await;
    let readings = body["data"].as_array().unwrap();
    assert_eq!(2, readings.len());
    assert!(readings.iter().all(|reading| reading["session_id"] == "s-1"));
    assert_eq!(Some(4), readings[0]["current_reps"].as_i64());

    let (_, body) = helper::send(
        &mut app,
        Method::GET,
        "/api/device/sessions?exercise=toe-curl",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!(1, body["data"].as_array().unwrap().len());

    // stats
    let (status_code, body) = helper::send(
        &mut app,
        Method::GET,
        "/api/device/sessions/s-1/stats",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!("s-1", body["data"]["session_id"]);
    assert_eq!("ankle-flex", body["data"]["exercise"]);
    assert_eq!(Some(3), body["data"]["total_readings"].as_u64());
    assert_eq!(Some(4), body["data"]["max_reps"].as_i64());
    assert_eq!(Some(34.0), body["data"]["max_angle"].as_f64());
    assert_eq!(Some(86), body["data"]["min_battery"].as_i64());
    assert_eq!("2024-03-01T09:00:00", body["data"]["session_start"]);
    assert_eq!("2024-03-01T09:00:20", body["data"]["session_end"]);

    let (status_code, body) = helper::send(
        &mut app,
        Method::GET,
        "/api/device/sessions/s-9/stats",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!("Session not found", helper::get_error_message(&body));

    // sessions are private
    let other_token = helper::register(&mut app, "bilal@example.com").await;
    let (status_code, _) = helper::send(
        &mut app,
        Method::GET,
        "/api/device/sessions/s-1/stats",
        Some(&other_token),
        None,
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    // delete
    let (status_code, _) = helper::send(
        &mut app,
        Method::DELETE,
        "/api/device/sessions/s-1",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!(StatusCode::NO_CONTENT, status_code);

    let (status_code, body) = helper::send(
        &mut app,
        Method::DELETE,
        "/api/device/sessions/s-1",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!("Session not found", helper::get_error_message(&body));

    let (_, body) = helper::send(
        &mut app,
        Method::GET,
        "/api/device/sessions",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!(1, body["data"].as_array().unwrap().len());
}

#[tokio::test]
async fn test_register_device() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::register(&mut app, "ayesha@example.com").await;

    let payload = json!({ "device_name": "Left ankle" });
    let (status_code, body) = helper::send(
        &mut app,
        Method::POST,
        "/api/device/register",
        Some(&access_token),
        Some(&payload),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!("Please provide device_id", helper::get_error_message(&body));

    let payload = json!({ "device_id": "esp32-1", "device_name": "Left ankle" });
    let (status_code, body) = helper::send(
        &mut app,
        Method::POST,
        "/api/device/register",
        Some(&access_token),
        Some(&payload),
    )
    .await;
    assert_eq!(StatusCode::CREATED, status_code);
    assert_eq!("esp32-1", body["data"]["device_id"]);
    assert_eq!("Left ankle", body["data"]["device_name"]);

    // telemetry keeps the name
    let payload = reading("s-1", "ankle-flex", 1, "2024-03-01T09:00:00");
    send_data(&mut app, &access_token, &payload).await;

    // renaming keeps a single device
    let payload = json!({ "device_id": "esp32-1", "device_name": "Right ankle" });
    helper::send(
        &mut app,
        Method::POST,
        "/api/device/register",
        Some(&access_token),
        Some(&payload),
    )
    .await;

    let (_, body) = helper::send(
        &mut app,
        Method::GET,
        "/api/device/devices",
        Some(&access_token),
        None,
    )
    .await;
    let devices = body["data"].as_array().unwrap();
    assert_eq!(1, devices.len());
    assert_eq!("Right ankle", devices[0]["device_name"]);
}

#[tokio::test]
async fn test_push_token() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::register(&mut app, "ayesha@example.com").await;

    let (_, user) = helper::profile(&mut app, &access_token).await;
    assert!(!user.unwrap().has_push_token);

    let payload = json!({ "fcm_token": "  " });
    let (status_code, body) = helper::send(
        &mut app,
        Method::POST,
        "/api/device/fcm-token",
        Some(&access_token),
        Some(&payload),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!("Please provide fcm_token", helper::get_error_message(&body));

    let payload = json!({ "fcmToken": "device-token" });
    let (status_code, _) = helper::send(
        &mut app,
        Method::POST,
        "/api/device/fcm-token",
        Some(&access_token),
        Some(&payload),
    )
    .await;
    assert_eq!(StatusCode::NO_CONTENT, status_code);

    let (_, user) = helper::profile(&mut app, &access_token).await;
    assert!(user.unwrap().has_push_token);
}
