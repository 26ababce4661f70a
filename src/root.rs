//! Service information outside of the resource endpoints

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::api::Error;
use crate::api::Success;
use crate::clock::now;

/// Service information
#[derive(Debug, Serialize)]
pub struct Info {
    name: &'static str,
    version: &'static str,
    endpoints: BTreeMap<&'static str, &'static str>,
}

/// Describe the service and where its resources live
///
/// Request:
/// ```sh
/// curl -v http://localhost:5000/
/// ```
///
/// Response:
/// ```json
/// { "data": { "name": "PakHealth API Server", "version": "0.1.0", "endpoints": { ... } } }
/// ```
pub async fn info() -> Success<Info> {
    let endpoints = BTreeMap::from([
        ("auth", "/api/auth"),
        ("device", "/api/device"),
        ("footHealth", "/api/foot-health"),
        ("health", "/api/health"),
        ("notifications", "/api/notifications"),
        ("reminders", "/api/reminders"),
        ("sugar", "/api/sugar"),
        ("users", "/api/users"),
    ]);

    Success::ok(Info {
        name: "PakHealth API Server",
        version: env!("CARGO_PKG_VERSION"),
        endpoints,
    })
}

/// Liveness of the service
#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    timestamp: NaiveDateTime,
}

/// Is the service running?
///
/// Request:
/// ```sh
/// curl -v http://localhost:5000/api/health
/// ```
///
/// Response:
/// ```json
/// { "data": { "status": "ok", "timestamp": "2024-01-01T08:00:00.000" } }
/// ```
pub async fn health() -> Success<Health> {
    Success::ok(Health {
        status: "ok",
        timestamp: now(),
    })
}

/// Everything without a route ends up here
pub async fn not_found() -> Error {
    Error::not_found("Route not found")
}
