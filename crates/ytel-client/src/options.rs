// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-client call options.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use ytel_proto::SubscriptionMode;

use crate::accumulator::Datapoint;

/// Caller hook run on every accepted datapoint. An error marks the datapoint
/// as a validation failure on values it contributes to.
pub type Validator = Arc<dyn Fn(&Datapoint) -> Result<(), anyhow::Error> + Send + Sync>;

/// Payload encoding for set requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetEncoding {
    /// RFC 7951 JSON.
    #[default]
    JsonIetf,
    /// Plain JSON.
    Json,
    /// Native scalar values for leaves where the type has one, JSON otherwise.
    PreferProto,
}

/// Options shared by every call on a [`Client`](crate::Client).
#[derive(Clone, Default)]
pub struct Options {
    /// Subscription mode for streaming calls.
    pub mode: SubscriptionMode,
    /// Sample interval for sampled subscriptions.
    pub sample_interval: Option<Duration>,
    /// Serve one-shot lookups with Get instead of a once-subscription.
    pub use_get: bool,
    /// Set payload encoding.
    pub encoding: SetEncoding,
    /// Qualify top-level JSON members with their module name.
    pub append_module_name: Option<bool>,
    /// Datapoint validator.
    pub validator: Option<Validator>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("mode", &self.mode)
            .field("sample_interval", &self.sample_interval)
            .field("use_get", &self.use_get)
            .field("encoding", &self.encoding)
            .field("append_module_name", &self.append_module_name)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl Options {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream with `mode`.
    pub fn with_mode(mut self, mode: SubscriptionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sample every `interval`.
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = Some(interval);
        self
    }

    /// Use Get for one-shot lookups.
    pub fn with_get(mut self) -> Self {
        self.use_get = true;
        self
    }

    /// Encode set payloads with `encoding`.
    pub fn with_encoding(mut self, encoding: SetEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Toggle module-qualified JSON member names.
    pub fn with_module_names(mut self, on: bool) -> Self {
        self.append_module_name = Some(on);
        self
    }

    /// Install a datapoint validator.
    pub fn with_validator(
        mut self,
        f: impl Fn(&Datapoint) -> Result<(), anyhow::Error> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(f));
        self
    }

    pub(crate) fn module_names(&self) -> bool {
        self.append_module_name.unwrap_or(true)
    }

    pub(crate) fn sample_nanos(&self) -> u64 {
        self.sample_interval
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }
}
