// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for ytel crates.
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake
//! - [`transport`] - Scripted transport fake with request recording
//! - [`schema`] - Example device schema bindings
//! - [`paths`] - Query builders over the example schema
#![forbid(unsafe_code)]

pub mod config;
pub mod paths;
pub mod schema;
pub mod transport;

use std::sync::Arc;

use ytel_client::Client;

pub use config::InMemoryConfigStore;
pub use paths::path;
pub use schema::{Child, Device, Model, OrderedEntry, Parent, RemoteContainer, SingleKey, Three};
pub use transport::{acknowledge, FakeTransport, Script};

/// A client wired to a fresh fake, plus the fake for scripting.
pub fn fake_client() -> (Client, FakeTransport) {
    let fake = FakeTransport::new();
    (Client::new(Arc::new(fake.clone())), fake)
}
