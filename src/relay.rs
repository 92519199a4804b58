//! Best-effort forwarding of access payloads to the webhook endpoint.

use crate::error::RelayError;
use reqwest::{Client, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Default timeout for a single relay attempt.
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on concurrent relay attempts.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Fire-and-forget webhook forwarder.
pub struct WebhookRelay {
    client: Client,
    endpoint: Url,
    permits: Arc<Semaphore>,
}

impl WebhookRelay {
    pub fn new(endpoint: Url, timeout: Duration, max_in_flight: usize) -> Result<Self, RelayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            permits: Arc::new(Semaphore::new(max_in_flight)),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Post the payload once. Any non-2xx response is an error.
    pub async fn send(&self, payload: &Value) -> Result<(), RelayError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status(status));
        }
        debug!(%status, "Relayed payload to webhook");
        Ok(())
    }

    /// Run `send` on a detached task. Returns without waiting.
    ///
    /// When the in-flight cap is reached the payload is dropped and
    /// `RelayError::Saturated` is returned to the caller for logging.
    pub fn dispatch(self: &Arc<Self>, payload: Value) -> Result<(), RelayError> {
        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| RelayError::Saturated)?;

        let relay = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = relay.send(&payload).await {
                warn!(error = %e, "Failed to relay access to webhook");
            }
            drop(permit);
        });
        Ok(())
    }
}
