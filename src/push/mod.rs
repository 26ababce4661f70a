//! Push notifications
//!
//! The [`Dispatcher`] is the only way to reach a device, it never fails loudly: every outcome is
//! a [`Delivery`]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::utils::env_var;

pub use fcm::FcmGateway;
pub use fcm::ServiceAccount;

mod fcm;

/// Default timeout of a single push, in seconds
const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 10;

/// A push message for a single device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushMessage {
    /// Device token
    pub token: String,
    pub title: String,
    pub body: String,
    /// Push data only carries strings
    pub data: BTreeMap<String, String>,
}

/// Errors of the push gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Credentials are missing or invalid
    #[error("Invalid credentials: {0}")]
    Credentials(String),

    /// No access token could be obtained
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The gateway could not be reached
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway refused the message
    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Something that can deliver push messages
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Send a message, returns the message ID assigned by the gateway
    async fn send(&self, message: &PushMessage) -> Result<String, GatewayError>;
}

/// Outcome of a single push
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    Delivered {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    Failed {
        reason: String,
    },
}

impl Delivery {
    fn failed<R: ToString>(reason: R) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Sends notifications through the gateway, when there is one
#[derive(Clone)]
pub struct Dispatcher {
    /// `None` when no credentials were configured
    gateway: Option<Arc<dyn PushGateway>>,

    /// Upper bound of a single gateway call
    timeout: Duration,
}

impl Dispatcher {
    /// Dispatcher using the given gateway
    pub fn new(gateway: Arc<dyn PushGateway>, timeout: Duration) -> Self {
        Self {
            gateway: Some(gateway),
            timeout,
        }
    }

    /// Dispatcher without gateway, every push fails
    pub fn uninitialized() -> Self {
        Self {
            gateway: None,
            timeout: Duration::from_secs(DEFAULT_PUSH_TIMEOUT_SECS),
        }
    }

    /// Is there a gateway to send to?
    pub fn is_initialized(&self) -> bool {
        self.gateway.is_some()
    }

    /// Send a push to a single device
    ///
    /// The gateway is only called with a gateway and a non-empty token
    pub async fn send(&self, token: Option<&str>, title: &str, body: &str, data: &Value) -> Delivery {
        let Some(gateway) = &self.gateway else {
            tracing::warn!("Push gateway not initialized, skipping push");
            return Delivery::failed("gateway not initialized");
        };

        let Some(token) = token.filter(|token| !token.is_empty()) else {
            return Delivery::failed("no token");
        };

        let message = PushMessage {
            token: token.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            data: stringify_data(data),
        };

        match tokio::time::timeout(self.timeout, gateway.send(&message)).await {
            Ok(Ok(message_id)) => {
                tracing::debug!(%message_id, "Push delivered");
                Delivery::Delivered { message_id }
            }
            Ok(Err(err)) => {
                tracing::warn!("Push failed: {err}");
                Delivery::failed(err)
            }
            Err(_) => {
                tracing::warn!("Push timed out after {:?}", self.timeout);
                Delivery::failed(format!("timed out after {}s", self.timeout.as_secs()))
            }
        }
    }
}

/// Turn a JSON object into string values, nested values are serialized
///
/// Anything but an object results in no data
pub fn stringify_data(data: &Value) -> BTreeMap<String, String> {
    let Some(data) = data.as_object() else {
        return BTreeMap::new();
    };

    data.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                Value::String(value) => value.clone(),
                value => value.to_string(),
            };

            (key.clone(), value)
        })
        .collect()
}

/// Setup the dispatcher from the environment
///
/// - `FIREBASE_SERVICE_ACCOUNT`: the service account JSON itself
/// - `GOOGLE_APPLICATION_CREDENTIALS`: path to the service account JSON
/// - `PUSH_TIMEOUT_SECS`: timeout of a single push
///
/// Missing or invalid credentials leave the dispatcher uninitialized
pub fn setup_dispatcher() -> Dispatcher {
    let timeout = env_var("PUSH_TIMEOUT_SECS")
        .and_then(|value| {
            value
                .parse::<u64>()
                .inspect_err(|err| tracing::warn!("Invalid `PUSH_TIMEOUT_SECS`: {err}"))
                .ok()
        })
        .unwrap_or(DEFAULT_PUSH_TIMEOUT_SECS);

    match ServiceAccount::from_env() {
        Ok(Some(account)) => match FcmGateway::new(account) {
            Ok(gateway) => {
                tracing::info!("Push gateway initialized for project {}", gateway.project_id());
                Dispatcher::new(Arc::new(gateway), Duration::from_secs(timeout))
            }
            Err(err) => {
                tracing::warn!("Push gateway not initialized: {err}");
                Dispatcher::uninitialized()
            }
        },
        Ok(None) => {
            tracing::warn!("Push gateway not initialized: no credentials provided");
            Dispatcher::uninitialized()
        }
        Err(err) => {
            tracing::warn!("Push gateway not initialized: {err}");
            Dispatcher::uninitialized()
        }
    }
}

/// Gateways to test with
#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Records every message, optionally failing or stalling
    #[derive(Default)]
    pub struct RecordingGateway {
        sent: Mutex<Vec<PushMessage>>,
        failure: Option<String>,
        delay: Option<Duration>,
    }

    impl RecordingGateway {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Gateway that rejects every message
        pub fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                failure: Some(reason.to_string()),
                ..Self::default()
            })
        }

        /// Gateway that takes its time for every message
        pub fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay: Some(delay),
                ..Self::default()
            })
        }

        /// All messages sent so far
        pub fn sent(&self) -> Vec<PushMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PushGateway for RecordingGateway {
        async fn send(&self, message: &PushMessage) -> Result<String, GatewayError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.sent.lock().unwrap().push(message.clone());

            match &self.failure {
                Some(reason) => Err(GatewayError::Rejected {
                    status: 400,
                    body: reason.clone(),
                }),
                None => Ok(format!("projects/test/messages/{}", self.sent.lock().unwrap().len())),
            }
        }
    }
}
