//! Figment-layered configuration for the terminal client.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chat_transport::ReconnectPolicy;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [reconnect]
//                    max_attempts = 3
//
//   env var:         MAMBO_RECONNECT__MAX_ATTEMPTS=3  (double underscore = nesting)
//
// CLI flags override both for the handful of options they cover.

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub reconnect: ReconnectFileConfig,
    #[serde(default)]
    pub chat: ChatFileConfig,
    #[serde(default)]
    pub idle: IdleFileConfig,
}

/// Endpoint roots (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP base URL for the history and assistance endpoints.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// WebSocket base URL for the live channel. Derived from `base_url`
    /// when unset.
    #[serde(default)]
    pub ws_url: Option<String>,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: None,
        }
    }
}

impl ServerFileConfig {
    /// WebSocket root for the live channel: the explicit `ws_url`, or
    /// `base_url` with its scheme swapped to ws/wss.
    pub fn ws_base_url(&self) -> String {
        if let Some(ws_url) = &self.ws_url {
            return ws_url.clone();
        }
        if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

/// Reconnection tunables (lives under `[reconnect]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconnectFileConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectFileConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ReconnectFileConfig {
    pub fn to_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
        }
    }
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    5
}

/// Chat behavior (lives under `[chat]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatFileConfig {
    /// Display name attached to outbound messages.
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Append sent messages locally instead of waiting for the server echo.
    #[serde(default)]
    pub local_echo: bool,
}

impl Default for ChatFileConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            local_echo: false,
        }
    }
}

fn default_display_name() -> String {
    std::env::var("USER")
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Anonymous".to_string())
}

/// Idle-assistance monitor (lives under `[idle]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdleFileConfig {
    #[serde(default = "default_idle_enabled")]
    pub enabled: bool,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

impl Default for IdleFileConfig {
    fn default() -> Self {
        Self {
            enabled: default_idle_enabled(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

fn default_idle_enabled() -> bool {
    true
}

fn default_check_interval_secs() -> u64 {
    30
}

/// Build the layered figment: struct defaults, then `config.toml` from the
/// data dir, then `MAMBO_`-prefixed env vars.
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("MAMBO_").split("__"))
}
