//! # lib_odp
//!
//! Shared library for the Orbital Defence Platform binaries. It watches a
//! Pushbullet account for pushes addressed to the ODP device, runs the
//! configured command named in each push body and replies to the sender.
//!
//! ## Module layout:
//! - **`configs`**: JSON configuration loading and validation.
//! - **`loggers`**: `fern`-based log setup shared by every binary.
//! - **`retrieve`**: the generic HTTP `ApiClient` with retry middleware.
//! - **`pushbullet`**: REST and websocket clients for the provider.
//! - **`relay`**: the command-dispatch core (registry, filter, executor,
//!   processor and the two triggers).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod configs;
pub mod loggers;
pub mod pushbullet;
pub mod relay;
pub mod retrieve;

// --- Public API Re-exports ---
pub use configs::config_odp::{ConfigError, ConfigSource, OdpConfig};
pub use pushbullet::{Device, Push, PushProvider, PushbulletClient, ProviderError};
pub use relay::{RelayError, RelayService};
