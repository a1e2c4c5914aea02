//! Where stateless handlers send what they extract.

use std::sync::Arc;

use livewire_protocol::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::HandlerError;

/// Delivers a JSON payload to a named collector endpoint.
///
/// Fire-and-forget: `forward` must not wait for delivery. An `Err` means
/// the payload was not even accepted (e.g. the channel behind it closed);
/// delivery failures after that are the forwarder's to log.
pub trait Forwarder: Send + Sync + 'static {
    fn forward(&self, endpoint: &str, payload: Value) -> Result<(), HandlerError>;
}

/// A channel of `(endpoint, payload)` pairs is a forwarder.
impl Forwarder for mpsc::UnboundedSender<(String, Value)> {
    fn forward(&self, endpoint: &str, payload: Value) -> Result<(), HandlerError> {
        self.send((endpoint.to_string(), payload))
            .map_err(|_| HandlerError::Forward {
                endpoint: endpoint.to_string(),
                reason: "receiver dropped".to_string(),
            })
    }
}

/// Collector endpoint names, relative to the collector's base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Endpoints {
    /// Battle decisions.
    pub battle: String,
    /// Comments matching a keyword.
    pub ticket: String,
    /// Comments addressed to the robot.
    pub setting: String,
    /// Gifts.
    pub money: String,
    /// Stopped-room listings.
    pub live_room_spider: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            battle: "pk_wanzun".to_string(),
            ticket: "ticket".to_string(),
            setting: "setting".to_string(),
            money: "money".to_string(),
            live_room_spider: "live_room_spider".to_string(),
        }
    }
}

/// What every forwarding handler needs: which room we are, where to
/// send, and who sends it.
#[derive(Clone)]
pub struct ForwardContext {
    pub room_id: RoomId,
    pub endpoints: Endpoints,
    pub forwarder: Arc<dyn Forwarder>,
}

impl ForwardContext {
    pub fn new(room_id: RoomId, endpoints: Endpoints, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            room_id,
            endpoints,
            forwarder,
        }
    }
}

impl std::fmt::Debug for ForwardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardContext")
            .field("room_id", &self.room_id)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

/// Which comments get forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordFilter {
    pub keywords: Vec<String>,
    pub robot_keyword: String,
}

impl KeywordFilter {
    /// `true` if `comment` contains any keyword as a substring.
    pub fn matches_keyword(&self, comment: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && comment.contains(k.as_str()))
    }

    /// `true` if `comment` contains the robot keyword.
    pub fn addresses_robot(&self, comment: &str) -> bool {
        !self.robot_keyword.is_empty() && comment.contains(self.robot_keyword.as_str())
    }
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self {
            keywords: vec!["观测站".to_string(), "鱼豆腐".to_string()],
            robot_keyword: "记仇机器人".to_string(),
        }
    }
}
