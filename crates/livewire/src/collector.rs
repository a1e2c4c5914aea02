//! HTTP delivery of decisions and forwarded events.
//!
//! [`HttpCollector`] is both the battle engine's [`ResultReporter`] and
//! the router's [`Forwarder`]. Every payload becomes one JSON `POST` to
//! `{base_url}/{endpoint}`, sent from its own task so callers never wait
//! on the network. Failures are logged, not retried.

use livewire_battle::{Decision, ResultReporter};
use livewire_router::{Endpoints, Forwarder, HandlerError};
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::config::CollectorSection;
use crate::LivewireError;

#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: reqwest::Client,
    base_url: String,
    endpoints: Endpoints,
}

impl HttpCollector {
    /// Builds the HTTP client with the configured request timeout.
    pub fn new(section: &CollectorSection) -> Result<Self, LivewireError> {
        let client = reqwest::Client::builder()
            .timeout(section.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: section.base_url.trim_end_matches('/').to_string(),
            endpoints: section.endpoints.clone(),
        })
    }

    /// Full URL for an endpoint name.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Spawns one POST.
    ///
    /// Returns `false` if there is no tokio runtime to spawn on.
    pub fn post(&self, endpoint: &str, payload: Value) -> bool {
        let Ok(handle) = Handle::try_current() else {
            warn!(endpoint, "no runtime, payload dropped");
            return false;
        };

        let request = self.client.post(self.url(endpoint)).json(&payload);
        let endpoint = endpoint.to_string();
        handle.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(%endpoint, status = %resp.status(), "collector accepted payload");
                }
                Ok(resp) => {
                    error!(%endpoint, status = %resp.status(), "collector rejected payload");
                }
                Err(e) => {
                    error!(%endpoint, error = %e, "collector request failed");
                }
            }
        });
        true
    }
}

impl ResultReporter for HttpCollector {
    fn report(&self, decision: Decision) {
        info!(
            room = %decision.room_id,
            category = %decision.category,
            endpoint = %self.endpoints.battle,
            "reporting battle decision"
        );
        self.post(&self.endpoints.battle, decision.to_payload());
    }
}

impl Forwarder for HttpCollector {
    fn forward(&self, endpoint: &str, payload: Value) -> Result<(), HandlerError> {
        if self.post(endpoint, payload) {
            Ok(())
        } else {
            Err(HandlerError::Forward {
                endpoint: endpoint.to_string(),
                reason: "no tokio runtime".to_string(),
            })
        }
    }
}
