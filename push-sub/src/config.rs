//! Daemon configuration file.
//!
//! ```toml
//! address = "127.0.0.1:17889"
//! base_path = "https://sub.example.com/"
//!
//! [subscriptions.blog_feed]
//! topic = "https://example.com/feed.xml"
//! hub = "https://example.com/hub"
//! bin = "/usr/bin/env"
//! args = ["tee", "/tmp/output.txt"]
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use url::Url;

/// Errors loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} missing on subscription {subscription}")]
    MissingField {
        subscription: String,
        field: &'static str,
    },

    #[error("No configuration directory found; pass --config")]
    NoConfigDir,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address the callback server listens on.
    pub address: SocketAddr,

    /// Public URL of the callback server, as hubs reach it. Only scheme,
    /// host and port are used; callback paths are generated.
    pub base_path: Url,

    #[serde(default)]
    pub subscriptions: BTreeMap<String, SubscriptionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionConfig {
    /// The feed to subscribe to.
    pub topic: Url,

    /// The hub for the topic. Discovered from the topic when absent.
    #[serde(default)]
    pub hub: Option<Url>,

    /// Program run for every verified message, with the body on stdin.
    #[serde(default)]
    pub bin: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Keep a discovered `http` hub instead of switching it to `https`.
    /// Without https nothing proves verification requests come from the hub.
    #[serde(default)]
    pub allow_insecure: bool,

    /// Lease to suggest to the hub. The hub picks one when absent.
    #[serde(default)]
    pub lease_seconds: Option<u32>,
}

impl Config {
    /// Read and validate the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    /// `<config dir>/push-sub/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("push-sub").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, subscription) in &self.subscriptions {
            if subscription.bin.is_empty() {
                return Err(ConfigError::MissingField {
                    subscription: name.clone(),
                    field: "bin",
                });
            }
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
