//! # Push Processor
//!
//! Runs a filtered batch: for every push, execute the named command, reply to
//! the sender with the outcome, then acknowledge the push. Each push is
//! handled on its own; a failure at any step is logged and the batch moves on.

use std::fmt;
use std::sync::Arc;

use super::executor::{CommandExecutor, ExecError, ExecResult};
use crate::pushbullet::{Device, Push, PushProvider};

/// How a processed push is kept from being processed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledge {
    /// Delete the push from the account (polling relay).
    Delete,
    /// Leave it; the caller's time cursor already moved past it (stream relay).
    Cursor,
}

/// Outcome tallies for one batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub exploded: usize,
    pub reply_failures: usize,
    pub ack_failures: usize,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.exploded
    }

    pub fn is_empty(&self) -> bool {
        self.processed() == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed ({} succeeded, {} failed, {} exploded), {} reply failures, {} ack failures",
            self.processed(),
            self.succeeded,
            self.failed,
            self.exploded,
            self.reply_failures,
            self.ack_failures
        )
    }
}

/// Reply text sent back to the originating device.
pub fn reply_text(command: &str, result: &ExecResult) -> String {
    match result {
        Ok(0) => format!("Command: '{}'. Result: Success", command),
        Ok(_) => format!("Command: '{}'. Result: Failed", command),
        Err(_) => format!("Command '{}' exploded", command),
    }
}

pub struct PushProcessor {
    provider: Arc<dyn PushProvider>,
    executor: CommandExecutor,
}

impl PushProcessor {
    pub fn new(provider: Arc<dyn PushProvider>, executor: CommandExecutor) -> Self {
        Self { provider, executor }
    }

    /// Processes every push in order. Never fails as a whole.
    pub async fn process(&self, pushes: &[Push], ack: Acknowledge) -> BatchReport {
        let mut report = BatchReport::default();
        if pushes.is_empty() {
            return report;
        }

        // One device listing serves every reply in the batch.
        let devices = match self.provider.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                log::warn!("Could not list devices to resolve reply targets: {}", e);
                Vec::new()
            }
        };

        for push in pushes {
            self.process_one(push, &devices, ack, &mut report).await;
        }
        report
    }

    async fn process_one(&self, push: &Push, devices: &[Device], ack: Acknowledge, report: &mut BatchReport) {
        log::debug!("Found relevant push: {:?}", push);
        let command = push.body.as_deref().unwrap_or_default().trim();

        // 1. Execute
        let result = self.executor.execute(command).await;
        match &result {
            Ok(0) => {
                log::info!("Command '{}' succeeded", command);
                report.succeeded += 1;
            }
            Ok(code) => {
                log::warn!("Command '{}' exited with status {}", command, code);
                report.failed += 1;
            }
            Err(ExecError::CommandNotFound(_)) => {
                log::warn!("Push {} named unknown command '{}'", push.iden, command);
                report.exploded += 1;
            }
            Err(e @ ExecError::ExecutionFailed { .. }) => {
                log::error!("Push {}: {}", push.iden, e);
                report.exploded += 1;
            }
        }

        // 2. Reply to the sender
        let title = reply_text(command, &result);
        let source = push.source_device_iden.as_deref().unwrap_or_default();
        let target = resolve_reply_target(source, devices);
        let sent_at = chrono::Local::now().format("%c").to_string();
        if let Err(e) = self.provider.push_note(&target.iden, &title, &sent_at).await {
            log::error!("Failed to send reply for push {} to {}: {}", push.iden, target.iden, e);
            report.reply_failures += 1;
        } else {
            log::debug!("Replied to '{}' ({}): {}", target.name(), target.iden, title);
        }

        // 3. Acknowledge
        if ack == Acknowledge::Delete {
            log::debug!("Deleting push {}", push.iden);
            if let Err(e) = self.provider.delete_push(&push.iden).await {
                log::error!("Failed to delete push {}: {}", push.iden, e);
                report.ack_failures += 1;
            }
        }
    }
}

/// Maps a source iden back to its device; unknown idens are addressed directly.
fn resolve_reply_target(source_iden: &str, devices: &[Device]) -> Device {
    match devices.iter().find(|d| d.iden == source_iden) {
        Some(device) => device.clone(),
        None => {
            log::warn!("Source device {} is not in the device list; replying to it directly", source_iden);
            Device {
                iden: source_iden.to_string(),
                nickname: None,
                active: true,
                created: None,
                modified: None,
            }
        }
    }
}
