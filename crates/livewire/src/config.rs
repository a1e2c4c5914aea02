//! Client configuration (strict YAML).
//!
//! Every section rejects unknown keys, so a typo fails loudly at startup
//! instead of silently falling back to a default.
//!
//! ```yaml
//! version: 1
//! room_id: 21452505
//! stream:
//!   url: "wss://broadcastlv.chat.bilibili.com/sub"
//!   token: "..."
//! collector:
//!   base_url: "http://127.0.0.1:8081"
//! battle:
//!   early_check_secs: 170
//! features:
//!   spider: true
//! ```

use std::fs;
use std::time::Duration;

use livewire_battle::BattleConfig;
use livewire_protocol::RoomId;
use livewire_router::{Endpoints, KeywordFilter};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// The only config version this build understands.
pub const CONFIG_VERSION: u32 = 1;

/// Reads and validates a config file.
pub fn load_from_file(path: &str) -> Result<LivewireConfig, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    load_from_str(&s)
}

/// Parses and validates YAML.
pub fn load_from_str(s: &str) -> Result<LivewireConfig, ConfigError> {
    let cfg: LivewireConfig = serde_yaml::from_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LivewireConfig {
    pub version: u32,

    /// The room to listen to. Also "our side" in battles.
    pub room_id: RoomId,

    pub stream: StreamSection,

    #[serde(default)]
    pub collector: CollectorSection,

    #[serde(default)]
    pub battle: BattleConfig,

    #[serde(default)]
    pub features: FeaturesSection,
}

impl LivewireConfig {
    /// A config with defaults everywhere except the two required values.
    pub fn new(room_id: RoomId, url: impl Into<String>) -> Self {
        Self {
            version: CONFIG_VERSION,
            room_id,
            stream: StreamSection {
                url: url.into(),
                token: String::new(),
                uid: 0,
                buvid: None,
                heartbeat_interval_secs: default_heartbeat_interval_secs(),
            },
            collector: CollectorSection::default(),
            battle: BattleConfig::default(),
            features: FeaturesSection::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {} (expected {CONFIG_VERSION})",
                self.version
            )));
        }
        if self.room_id.0 == 0 {
            return Err(ConfigError::Invalid("room_id must not be 0".into()));
        }
        self.stream.validate()?;
        self.collector.validate()?;
        if self.battle.early_check_secs > self.battle.end_check_secs {
            return Err(ConfigError::Invalid(
                "battle.early_check_secs must not exceed battle.end_check_secs".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// The live-event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamSection {
    /// `ws://` or `wss://` endpoint.
    pub url: String,

    /// Auth key sent in the handshake.
    #[serde(default)]
    pub token: String,

    /// Viewer uid sent in the handshake; 0 is anonymous.
    #[serde(default)]
    pub uid: u64,

    #[serde(default)]
    pub buvid: Option<String>,

    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

impl StreamSection {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(
                "stream.url must start with ws:// or wss://".into(),
            ));
        }
        if !(1..=300).contains(&self.heartbeat_interval_secs) {
            return Err(ConfigError::Invalid(
                "stream.heartbeat_interval_secs must be between 1 and 300".into(),
            ));
        }
        Ok(())
    }
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

/// The HTTP collector decisions and forwarded events are posted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub endpoints: Endpoints,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            endpoints: Endpoints::default(),
        }
    }
}

impl CollectorSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(
                "collector.base_url must start with http:// or https://".into(),
            ));
        }
        if !(100..=60_000).contains(&self.timeout_ms) {
            return Err(ConfigError::Invalid(
                "collector.timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8081".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

/// Optional behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesSection {
    /// Forward stopped-room listings to the spider endpoint.
    #[serde(default)]
    pub spider: bool,

    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    #[serde(default = "default_robot_keyword")]
    pub robot_keyword: String,
}

impl Default for FeaturesSection {
    fn default() -> Self {
        Self {
            spider: false,
            keywords: default_keywords(),
            robot_keyword: default_robot_keyword(),
        }
    }
}

impl FeaturesSection {
    pub fn keyword_filter(&self) -> KeywordFilter {
        KeywordFilter {
            keywords: self.keywords.clone(),
            robot_keyword: self.robot_keyword.clone(),
        }
    }
}

fn default_keywords() -> Vec<String> {
    KeywordFilter::default().keywords
}

fn default_robot_keyword() -> String {
    KeywordFilter::default().robot_keyword
}
