use axum::http::Method;
use axum::http::StatusCode;

use crate::tests::helper;

#[tokio::test]
async fn test_root() {
    let mut app = helper::setup_test_app().await;

    let (status_code, body) = helper::send(&mut app, Method::GET, "/", None, None).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!("PakHealth API Server", body["data"]["name"]);
    assert_eq!("/api/reminders", body["data"]["endpoints"]["reminders"]);
}

#[tokio::test]
async fn test_health() {
    let mut app = helper::setup_test_app().await;

    let (status_code, body) = helper::send(&mut app, Method::GET, "/api/health", None, None).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!("ok", body["data"]["status"]);
    assert!(body["data"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_unknown_route() {
    let mut app = helper::setup_test_app().await;

    let (status_code, body) =
        helper::send(&mut app, Method::GET, "/does-not-exist", None, None).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!("Route not found", helper::get_error_message(&body));

    let (status_code, _) =
        helper::send(&mut app, Method::GET, "/api/does-not-exist", None, None).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
}
