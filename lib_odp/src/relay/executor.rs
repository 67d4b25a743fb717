//! # Command Executor
//!
//! Resolves a command name to its action and runs it. Whatever happens inside
//! a runner, including a panic, comes back as a typed result; nothing escapes
//! this boundary to take the batch down.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use thiserror::Error;

use super::registry::{ActionSpec, CommandRegistry};
use super::runners::{ContainerControl, RunnerError, ShellRunner};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Command '{0}' not found")]
    CommandNotFound(String),

    #[error("Command '{command}' failed to execute: {cause}")]
    ExecutionFailed { command: String, cause: String },
}

impl ExecError {
    fn failed(command: &str, cause: impl ToString) -> Self {
        ExecError::ExecutionFailed {
            command: command.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Exit code of the action; `0` for a completed container action.
pub type ExecResult = Result<i32, ExecError>;

pub struct CommandExecutor {
    registry: CommandRegistry,
    shell: Arc<dyn ShellRunner>,
    containers: Arc<dyn ContainerControl>,
}

impl CommandExecutor {
    pub fn new(
        registry: CommandRegistry,
        shell: Arc<dyn ShellRunner>,
        containers: Arc<dyn ContainerControl>,
    ) -> Self {
        Self {
            registry,
            shell,
            containers,
        }
    }

    /// Looks up `command` and runs its action.
    pub async fn execute(&self, command: &str) -> ExecResult {
        let name = command.trim();
        let action = match self.registry.lookup(name) {
            Some(action) => action,
            None => {
                log::error!("Command: '{}' not found", name);
                return Err(ExecError::CommandNotFound(name.to_string()));
            }
        };
        log::debug!("Executing command: '{}':'{}'", name, action);

        let run = AssertUnwindSafe(self.run_action(action)).catch_unwind();
        match run.await {
            Ok(Ok(code)) => Ok(code),
            Ok(Err(e)) => {
                log::error!("Execution failed for command: '{}': {}", name, e);
                Err(ExecError::failed(name, e))
            }
            Err(panic) => {
                let cause = panic_message(panic.as_ref());
                log::error!("Execution panicked for command: '{}': {}", name, cause);
                Err(ExecError::failed(name, format!("panicked: {}", cause)))
            }
        }
    }

    async fn run_action(&self, action: &ActionSpec) -> Result<i32, RunnerError> {
        match action {
            ActionSpec::Shell(argv) => self.shell.run(argv).await,
            ActionSpec::ContainerStart(id) => self.containers.start(id).await.map(|_| 0),
            ActionSpec::ContainerStop(id) => self.containers.stop(id).await.map(|_| 0),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
