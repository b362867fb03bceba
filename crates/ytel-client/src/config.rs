// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client configuration and its storage port.

use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use ytel_proto::SubscriptionMode;

use crate::options::{Options, SetEncoding};

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Serializes config values as JSON and delegates storage to a [`ConfigStore`].
#[derive(Debug)]
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

/// Persisted client settings. Every field is optional in the stored JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Target device name.
    pub target: Option<String>,
    /// Subscription mode for streaming calls.
    pub mode: SubscriptionMode,
    /// Sample interval in milliseconds; zero lets the target choose.
    pub sample_interval_ms: u64,
    /// Set payload encoding.
    pub encoding: SetEncoding,
    /// Qualify top-level JSON members with module names.
    pub append_module_name: bool,
    /// Serve lookups with Get.
    pub use_get: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target: None,
            mode: SubscriptionMode::default(),
            sample_interval_ms: 0,
            encoding: SetEncoding::default(),
            append_module_name: true,
            use_get: false,
        }
    }
}

impl ClientConfig {
    /// Store key for the client config.
    pub const KEY: &'static str = "client";

    /// Load the stored config, or the defaults when none is stored.
    pub fn load<S: ConfigStore>(service: &ConfigService<S>) -> Result<Self, ConfigError> {
        Ok(service.load(Self::KEY)?.unwrap_or_default())
    }

    /// Persist this config.
    pub fn save<S: ConfigStore>(&self, service: &ConfigService<S>) -> Result<(), ConfigError> {
        service.save(Self::KEY, self)
    }

    /// Call options described by this config.
    pub fn options(&self) -> Options {
        let mut opts = Options::new()
            .with_mode(self.mode)
            .with_encoding(self.encoding)
            .with_module_names(self.append_module_name);
        if self.sample_interval_ms > 0 {
            opts = opts.with_sample_interval(Duration::from_millis(self.sample_interval_ms));
        }
        if self.use_get {
            opts = opts.with_get();
        }
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ClientConfig = serde_json::from_str(r#"{"use_get": true, "encoding": "prefer_proto"}"#).unwrap();
        assert!(cfg.use_get);
        assert!(cfg.append_module_name);
        assert_eq!(cfg.encoding, SetEncoding::PreferProto);
        let opts = cfg.options();
        assert!(opts.use_get);
        assert_eq!(opts.sample_interval, None);
    }

    #[test]
    fn sample_interval_becomes_duration() {
        let cfg = ClientConfig {
            sample_interval_ms: 250,
            ..ClientConfig::default()
        };
        assert_eq!(cfg.options().sample_interval, Some(Duration::from_millis(250)));
    }
}
