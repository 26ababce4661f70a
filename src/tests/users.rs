use axum::http::Method;
use axum::http::StatusCode;
use serde_json::json;

use crate::tests::helper;

#[tokio::test]
async fn test_update_profile() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::register(&mut app, "ayesha@example.com").await;

    let payload = json!({
        "name": "Ayesha Khan",
        "age": 54,
        "gender": "Female",
        "diabetesType": "Type 2",
        "diagnosisYear": 2015,
        "medications": ["Metformin", "  ", " Insulin "],
    });
    let (status_code, user, _) =
        helper::maybe_update_profile(&mut app, &access_token, &payload).await;
    assert_eq!(StatusCode::OK, status_code);
    let user = user.unwrap();
    assert_eq!("Ayesha Khan", user["name"]);
    assert_eq!(Some(54), user["age"].as_u64());
    assert_eq!("Female", user["gender"]);
    assert_eq!("Type 2", user["diabetesType"]);
    assert_eq!(Some(2015), user["diagnosisYear"].as_i64());
    assert_eq!(json!(["Metformin", "Insulin"]), user["medications"]);

    // fields left out are untouched
    let (status_code, user, _) =
        helper::maybe_update_profile(&mut app, &access_token, &json!({ "age": 55 })).await;
    assert_eq!(StatusCode::OK, status_code);
    let user = user.unwrap();
    assert_eq!("Ayesha Khan", user["name"]);
    assert_eq!(Some(55), user["age"].as_u64());
    assert_eq!("Type 2", user["diabetesType"]);
}

#[tokio::test]
async fn test_update_profile_validation() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::register(&mut app, "ayesha@example.com").await;

    let (status_code, _, error) =
        helper::maybe_update_profile(&mut app, &access_token, &json!({ "name": " " })).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Name can not be empty".to_string()), error);

    let (status_code, _, error) =
        helper::maybe_update_profile(&mut app, &access_token, &json!({ "age": -1 })).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Please provide a valid age".to_string()), error);

    let (status_code, _, error) =
        helper::maybe_update_profile(&mut app, &access_token, &json!({ "age": 151 })).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Please provide a valid age".to_string()), error);

    let (status_code, _, error) =
        helper::maybe_update_profile(&mut app, &access_token, &json!({ "gender": "unknown" }))
            .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Invalid gender value".to_string()), error);

    let (status_code, _, error) = helper::maybe_update_profile(
        &mut app,
        &access_token,
        &json!({ "diabetesType": "Type 3" }),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert!(error.unwrap().starts_with("Invalid diabetes type"));

    let (status_code, _, error) =
        helper::maybe_update_profile(&mut app, &access_token, &json!({ "diagnosisYear": 1850 }))
            .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert!(
        error
            .unwrap()
            .starts_with("Please provide a valid diagnosis year between 1900 and")
    );
}

#[tokio::test]
async fn test_developer_dashboard() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::register(&mut app, "ayesha@example.com").await;
    helper::create_reminder(&mut app, &access_token, "Metformin", "08:00").await;
    let reminder = helper::create_reminder(&mut app, &access_token, "Insulin", "20:00").await;
    helper::maybe_toggle_reminder(&mut app, &access_token, &reminder.id).await;

    let (status_code, _) = helper::send(
        &mut app,
        Method::POST,
        "/api/sugar",
        Some(&access_token),
        Some(&json!({ "value": 120, "type": "Fasting" })),
    )
    .await;
    assert_eq!(StatusCode::CREATED, status_code);

    // regular users have no access
    let (status_code, body) =
        helper::send(&mut app, Method::GET, "/api/users/all", Some(&access_token), None).await;
    assert_eq!(StatusCode::FORBIDDEN, status_code);
    assert_eq!("Developer access required", helper::get_error_message(&body));

    let developer_token = helper::login_developer(&mut app).await;
    let (status_code, body) =
        helper::send(&mut app, Method::GET, "/api/users/all", Some(&developer_token), None).await;
    assert_eq!(StatusCode::OK, status_code);

    // developers are not listed
    let users = body["data"].as_array().unwrap();
    assert_eq!(1, users.len());
    assert_eq!("ayesha@example.com", users[0]["email"]);
    assert_eq!(Some(1), users[0]["sugarReadingsCount"].as_u64());
    assert_eq!(Some(1), users[0]["activeRemindersCount"].as_u64());
    assert_eq!(Some(0), users[0]["footHealthCount"].as_u64());
}
