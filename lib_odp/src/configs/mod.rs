//! # Configuration Modules
//!
//! Loading and validation of the relay's JSON configuration.

/// The relay configuration: credentials, device name, senders and commands.
pub mod config_odp;
