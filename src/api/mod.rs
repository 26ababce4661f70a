//! All API endpoint setup

use axum::Router;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::patch;
use axum::routing::post;
use axum::routing::put;

use crate::root;
use crate::storage::Storage;

pub use current_user::CurrentUser;
pub use current_user::JwtKeys;
pub use request::Form;
pub use request::PathParameters;
pub use request::QueryParameters;
pub use response::Error;
pub use response::Success;

mod auth;
mod current_user;
mod devices;
mod foot_health;
mod notifications;
mod reminders;
mod request;
mod response;
mod sugar;
mod users;
mod utils;

/// Get the Axum router for all API routes
pub fn router<S: Storage>() -> Router {
    let auth = Router::new()
        .route("/register", post(auth::register::<S>))
        .route("/login", post(auth::login::<S>))
        .route("/logout", post(auth::logout::<S>));

    let users = Router::new()
        .route("/profile", get(users::profile::<S>))
        .route("/profile", put(users::update_profile::<S>))
        .route("/all", get(users::all::<S>));

    let sugar = Router::new()
        .route("/", get(sugar::list::<S>))
        .route("/", post(sugar::create::<S>))
        .route("/insights", get(sugar::insights::<S>))
        .route("/{id}", delete(sugar::delete::<S>));

    let foot_health = Router::new()
        .route("/", get(foot_health::list::<S>))
        .route("/", post(foot_health::create::<S>))
        .route("/stats", get(foot_health::stats::<S>))
        .route("/{id}", put(foot_health::update::<S>))
        .route("/{id}", delete(foot_health::delete::<S>));

    let reminders = Router::new()
        .route("/", get(reminders::list::<S>))
        .route("/", post(reminders::create::<S>))
        .route("/{id}", put(reminders::update::<S>))
        .route("/{id}", delete(reminders::delete::<S>))
        .route("/{id}/toggle", patch(reminders::toggle::<S>));

    let notifications = Router::new()
        .route("/", get(notifications::list::<S>))
        .route("/", post(notifications::create::<S>))
        .route("/unread-count", get(notifications::unread_count::<S>))
        .route("/test", post(notifications::test::<S>))
        .route("/read-all", patch(notifications::read_all::<S>))
        .route("/clear-all", delete(notifications::clear_all::<S>))
        .route("/preferences", get(notifications::preferences::<S>))
        .route("/preferences", put(notifications::update_preferences::<S>))
        .route("/{id}/read", patch(notifications::read::<S>))
        .route("/{id}", delete(notifications::delete::<S>));

    let device = Router::new()
        .route("/data", post(devices::data::<S>))
        .route("/sessions", get(devices::sessions::<S>))
        .route("/latest", get(devices::latest::<S>))
        .route("/sessions/{session_id}/stats", get(devices::stats::<S>))
        .route("/sessions/{session_id}", delete(devices::delete_session::<S>))
        .route("/devices", get(devices::devices::<S>))
        .route("/register", post(devices::register::<S>))
        .route("/fcm-token", post(devices::fcm_token::<S>));

    Router::new()
        .route("/health", get(root::health))
        .nest("/auth", auth)
        .nest("/users", users)
        .nest("/sugar", sugar)
        .nest("/foot-health", foot_health)
        .nest("/reminders", reminders)
        .nest("/notifications", notifications)
        .nest("/device", device)
}
