use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use crate::tests::helper;

#[tokio::test]
async fn test_reminders() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::register(&mut app, "ayesha@example.com").await;

    // every day when the days are left out
    let reminder = helper::create_reminder(&mut app, &access_token, "Metformin", "08:00").await;
    assert_eq!("Metformin", reminder.title);
    assert_eq!("Medication", reminder.category);
    assert_eq!("08:00", reminder.time);
    assert!(reminder.is_active);
    assert_eq!(7, reminder.days.len());
    assert!(reminder.days.values().all(|enabled| enabled.as_bool() == Some(true)));

    // given days, the others are off
    let payload = json!({
        "title": "Check feet",
        "type": "Foot Check",
        "time": "21:30",
        "days": { "monday": true, "friday": true },
        "notes": "Use the mirror",
    });
    let (status_code, foot_check, _) =
        helper::maybe_create_reminder(&mut app, &access_token, &payload).await;
    assert_eq!(StatusCode::CREATED, status_code);
    let foot_check = foot_check.unwrap();
    assert_eq!(json!(true), foot_check.days["monday"]);
    assert_eq!(json!(false), foot_check.days["tuesday"]);
    assert_eq!(json!(true), foot_check.days["friday"]);
    assert_eq!(Some("Use the mirror".to_string()), foot_check.notes);

    let (status_code, reminders) = helper::list_reminders(&mut app, &access_token).await;
    assert_eq!(StatusCode::OK, status_code);
    let reminders = reminders.unwrap();
    assert_eq!(2, reminders.len());
    assert!(reminders.iter().any(|r| r.id == reminder.id));
    assert!(reminders.iter().any(|r| r.id == foot_check.id));

    // reminders are private
    let other_token = helper::register(&mut app, "bilal@example.com").await;
    let (status_code, reminders) = helper::list_reminders(&mut app, &other_token).await;
    assert_eq!(StatusCode::OK, status_code);
    assert!(reminders.unwrap().is_empty());

    let (status_code, error) =
        helper::maybe_delete_reminder(&mut app, &other_token, &reminder.id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(Some("Reminder not found".to_string()), error);

    // delete
    let (status_code, _) =
        helper::maybe_delete_reminder(&mut app, &access_token, &reminder.id).await;
    assert_eq!(StatusCode::NO_CONTENT, status_code);

    let (status_code, _) =
        helper::maybe_delete_reminder(&mut app, &access_token, &reminder.id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
}

#[tokio::test]
async fn test_create_reminder_validation() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::register(&mut app, "ayesha@example.com").await;

    let payload = json!({ "title": " ", "type": "Medication", "time": "08:00" });
    let (status_code, _, error) =
        helper::maybe_create_reminder(&mut app, &access_token, &payload).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Please provide a title".to_string()), error);

    let payload = json!({ "title": "Walk", "type": "Exercise", "time": "08:00" });
    let (status_code, _, error) =
        helper::maybe_create_reminder(&mut app, &access_token, &payload).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Invalid reminder type".to_string()), error);

    for time in ["8:00", "24:00", "08:60", "08:00:00", "noon"] {
        let payload = json!({ "title": "Walk", "type": "Other", "time": time });
        let (status_code, _, error) =
            helper::maybe_create_reminder(&mut app, &access_token, &payload).await;
        assert_eq!(StatusCode::BAD_REQUEST, status_code, "{time}");
        assert_eq!(
            Some("Invalid time format, use HH:MM".to_string()),
            error,
            "{time}"
        );
    }
}

#[tokio::test]
async fn test_update_reminder() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::register(&mut app, "ayesha@example.com").await;
    let reminder = helper::create_reminder(&mut app, &access_token, "Metformin", "08:00").await;

    // only the given days change
    let payload = json!({
        "time": "09:15",
        "days": { "sunday": false },
        "notes": "After breakfast",
    });
    let (status_code, updated, _) =
        helper::maybe_update_reminder(&mut app, &access_token, &reminder.id, &payload).await;
    assert_eq!(StatusCode::OK, status_code);
    let updated = updated.unwrap();
    assert_eq!("Metformin", updated.title);
    assert_eq!("09:15", updated.time);
    assert_eq!(json!(false), updated.days["sunday"]);
    assert_eq!(json!(true), updated.days["saturday"]);
    assert_eq!(Some("After breakfast".to_string()), updated.notes);

    let payload = json!({ "isActive": false, "type": "Sugar Check" });
    let (status_code, updated, _) =
        helper::maybe_update_reminder(&mut app, &access_token, &reminder.id, &payload).await;
    assert_eq!(StatusCode::OK, status_code);
    let updated = updated.unwrap();
    assert!(!updated.is_active);
    assert_eq!("Sugar Check", updated.category);
    assert_eq!("09:15", updated.time);

    let payload = json!({ "time": "9am" });
    let (status_code, _, error) =
        helper::maybe_update_reminder(&mut app, &access_token, &reminder.id, &payload).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Invalid time format, use HH:MM".to_string()), error);

    let (status_code, _, error) =
        helper::maybe_update_reminder(&mut app, &access_token, &Uuid::new_v4(), &json!({}))
            .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(Some("Reminder not found".to_string()), error);
}

#[tokio::test]
async fn test_toggle_reminder() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::register(&mut app, "ayesha@example.com").await;
    let reminder = helper::create_reminder(&mut app, &access_token, "Metformin", "08:00").await;

    let (status_code, toggled, _) =
        helper::maybe_toggle_reminder(&mut app, &access_token, &reminder.id).await;
    assert_eq!(StatusCode::OK, status_code);
    assert!(!toggled.unwrap().is_active);

    let (status_code, toggled, _) =
        helper::maybe_toggle_reminder(&mut app, &access_token, &reminder.id).await;
    assert_eq!(StatusCode::OK, status_code);
    assert!(toggled.unwrap().is_active);

    let (status_code, _, error) =
        helper::maybe_toggle_reminder(&mut app, &access_token, &Uuid::new_v4()).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(Some("Reminder not found".to_string()), error);
}
