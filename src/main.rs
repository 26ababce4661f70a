#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
// easier to use when using the functions as callback of foreign functions
#![allow(clippy::needless_pass_by_value)]
// #![doc = include_str!("../README.md")]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Extension;
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use crate::api::JwtKeys;
use crate::api::router;
use crate::clock::SystemClock;
use crate::push::Dispatcher;
use crate::push::setup_dispatcher;
use crate::scheduler::Scheduler;
use crate::scheduler::lead_minutes_from_env;
use crate::scheduler::start_scheduler;
use crate::storage::Storage;
use crate::storage::setup;
use crate::users::ensure_developer_user;
use crate::utils::env_var_or_else;

mod api;
mod clock;
mod devices;
mod foot_health;
mod graceful_shutdown;
mod notifications;
mod password;
mod push;
mod reminders;
mod root;
mod scheduler;
mod storage;
mod sugar;
#[cfg(test)]
mod tests;
mod users;
mod utils;

const DEFAULT_RUST_LOG: &str = "pakhealth=debug,tower_http=debug";
const DEFAULT_ADDRESS: &str = "0.0.0.0:5000";

#[tokio::main]
async fn main() -> Result<()> {
    setup_environment();
    setup_tracing();

    let (app, scheduler) = setup_app().await?;

    let shutdown = CancellationToken::new();
    let scheduler = start_scheduler(scheduler, shutdown.clone());

    let address = setup_address()?;
    let listener = TcpListener::bind(address).await?;
    tracing::info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(graceful_shutdown::handler())
        .await?;

    shutdown.cancel();
    scheduler.await?;

    Ok(())
}

/// Create and setup the app with its dependencies
///
/// # Errors
///
/// Will return `Err` if any of its dependencies fail to load:
/// - Database connection
/// - Developer user setup
pub async fn setup_app() -> Result<(Router, Scheduler<impl Storage>)> {
    let storage = setup().await?;

    ensure_developer_user(&storage).await?;

    let dispatcher = setup_dispatcher();
    let jwt_keys = setup_jwt_keys();

    let scheduler = Scheduler::new(
        storage.clone(),
        dispatcher.clone(),
        Arc::new(SystemClock),
        &lead_minutes_from_env(),
    );

    Ok((create_router(storage, dispatcher, jwt_keys), scheduler))
}

/// Create the router for PakHealth
fn create_router<S: Storage>(storage: S, dispatcher: Dispatcher, jwt_keys: JwtKeys) -> Router {
    Router::new()
        .route("/", get(root::info))
        .nest("/api", router::<S>())
        .fallback(root::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(storage))
        .layer(Extension(dispatcher))
        .layer(Extension(jwt_keys))
}

fn setup_environment() {
    dotenvy::dotenv().ok();
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;

    registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.into()),
        ))
        .with(fmt::layer())
        .init();
}

fn setup_jwt_keys() -> JwtKeys {
    use crate::password::generate;

    let jwt_secret = env_var_or_else("JWT_SECRET", || {
        let jwt_secret = generate();
        tracing::info!("`JWT_SECRET` is not set, generating temporary one: {jwt_secret}");
        jwt_secret
    });

    JwtKeys::new(jwt_secret.as_bytes())
}

fn setup_address() -> Result<SocketAddr> {
    let mut address =
        env_var_or_else("ADDRESS", || String::from(DEFAULT_ADDRESS)).parse::<SocketAddr>()?;

    // optional override of just the port
    if let Ok(port) = std::env::var("PORT") {
        // only check non-empty strings
        if !port.is_empty() {
            let port = port.parse::<u16>()?;

            address.set_port(port);
        }
    }

    Ok(address)
}
