//! # Relay
//!
//! The command-dispatch core. A trigger fetches pushes, the filter keeps the
//! ones addressed to us by a trusted device, the processor runs the named
//! command through the executor and replies with the outcome.
//!
//! ## Module layout:
//! - **`registry`**: command name → action table built from config.
//! - **`filter`**: authorization by target and source device.
//! - **`runners`**: shell process and Docker Engine backends.
//! - **`executor`**: lookup plus panic-safe execution.
//! - **`processor`**: execute → reply → acknowledge, per push.
//! - **`service`**: the long-lived context shared by both triggers.
//! - **`trigger`**: polling and realtime-stream drivers.

use thiserror::Error;

use crate::pushbullet::ProviderError;

pub mod executor;
pub mod filter;
pub mod processor;
pub mod registry;
pub mod runners;
pub mod service;
pub mod trigger;

pub use executor::{CommandExecutor, ExecError, ExecResult};
pub use processor::{Acknowledge, BatchReport, PushProcessor};
pub use registry::{ActionSpec, CommandRegistry};
pub use runners::{ContainerControl, DockerSocket, ProcessRunner, RunnerError, ShellRunner};
pub use service::{resolve_own_device, show_devices, RelayService};
pub use trigger::{starting_cursor, PollingTrigger, StreamTrigger, TimeCursor, Trigger};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Could not find or register device '{name}': {source}")]
    DeviceSetup {
        name: String,
        #[source]
        source: ProviderError,
    },

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}
