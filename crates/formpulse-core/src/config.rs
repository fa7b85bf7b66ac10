use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8090;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const FORM_ID_LEN: usize = 24; // canonical form identifier: 24 hex chars
pub const MAX_INBOUND_FRAME_BYTES: usize = 64 * 1024; // larger peer frames end the read loop
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_REGISTER_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_HOUSEKEEPING_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_WELCOME_MESSAGE: &str = "Connected to analytics updates";

/// Top-level config (formpulse.toml + FORMPULSE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormpulseConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hub: HubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Broadcast hub tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Outbound frames buffered per client before it counts as a slow consumer.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    /// Pending broadcasts the event loop accepts before new ones are dropped.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
    #[serde(default = "default_register_queue_capacity")]
    pub register_queue_capacity: usize,
    /// Diagnostic sweep cadence. 0 disables the sweep.
    #[serde(default = "default_housekeeping_interval_secs")]
    pub housekeeping_interval_secs: u64,
    /// Text of the `connected` frame sent to every new client.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            register_queue_capacity: DEFAULT_REGISTER_QUEUE_CAPACITY,
            housekeeping_interval_secs: DEFAULT_HOUSEKEEPING_INTERVAL_SECS,
            welcome_message: default_welcome_message(),
        }
    }
}

impl HubConfig {
    /// Reject capacities no channel can be built with.
    pub fn validate(&self) -> crate::error::Result<()> {
        let capacities = [
            ("mailbox_capacity", self.mailbox_capacity),
            ("event_queue_capacity", self.event_queue_capacity),
            ("register_queue_capacity", self.register_queue_capacity),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(crate::error::FormpulseError::Config(format!(
                    "hub.{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_mailbox_capacity() -> usize {
    DEFAULT_MAILBOX_CAPACITY
}
fn default_event_queue_capacity() -> usize {
    DEFAULT_EVENT_QUEUE_CAPACITY
}
fn default_register_queue_capacity() -> usize {
    DEFAULT_REGISTER_QUEUE_CAPACITY
}
fn default_housekeeping_interval_secs() -> u64 {
    DEFAULT_HOUSEKEEPING_INTERVAL_SECS
}
fn default_welcome_message() -> String {
    DEFAULT_WELCOME_MESSAGE.to_string()
}

impl FormpulseConfig {
    /// Load config from a TOML file with FORMPULSE_* env var overrides
    /// (nested keys use `__`, e.g. FORMPULSE_HUB__MAILBOX_CAPACITY).
    ///
    /// Uses the explicit path when given, otherwise ~/.formpulse/formpulse.toml.
    /// A missing file is fine: every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: FormpulseConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("FORMPULSE_").split("__"))
            .extract()
            .map_err(|e| crate::error::FormpulseError::Config(e.to_string()))?;

        config.hub.validate()?;
        tracing::debug!(path = %path, "configuration loaded");
        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.formpulse/formpulse.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = FormpulseConfig::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.hub.mailbox_capacity, 256);
        assert_eq!(config.hub.housekeeping_interval_secs, 60);
        assert!(config.hub.validate().is_ok());
    }

    #[test]
    fn zero_capacity_rejected() {
        let hub = HubConfig {
            event_queue_capacity: 0,
            ..HubConfig::default()
        };
        let err = hub.validate().unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("event_queue_capacity"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: FormpulseConfig = Figment::new()
            .merge(Toml::string("[hub]\nmailbox_capacity = 8\n"))
            .extract()
            .unwrap();
        assert_eq!(config.hub.mailbox_capacity, 8);
        assert_eq!(config.hub.event_queue_capacity, DEFAULT_EVENT_QUEUE_CAPACITY);
        assert_eq!(config.server.bind, DEFAULT_BIND);
    }
}
