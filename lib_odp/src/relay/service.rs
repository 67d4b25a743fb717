//! # Relay Service
//!
//! The long-lived context a trigger drives: provider handle, our own device,
//! the authorised sender set and the push processor. Built once at startup.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use super::executor::CommandExecutor;
use super::filter;
use super::processor::{Acknowledge, BatchReport, PushProcessor};
use super::runners::{ContainerControl, ShellRunner};
use super::RelayError;
use crate::configs::config_odp::OdpConfig;
use crate::pushbullet::{Device, ProviderError, Push, PushProvider};

pub struct RelayService {
    provider: Arc<dyn PushProvider>,
    device: Device,
    authorised: HashSet<String>,
    processor: PushProcessor,
}

impl RelayService {
    /// Resolves (or registers) our device and wires up the processor.
    pub async fn bootstrap(
        config: &OdpConfig,
        provider: Arc<dyn PushProvider>,
        shell: Arc<dyn ShellRunner>,
        containers: Arc<dyn ContainerControl>,
    ) -> Result<Self, RelayError> {
        let device = resolve_own_device(provider.as_ref(), &config.device_name).await?;
        log::debug!("Our device: {:?}", device);

        let executor = CommandExecutor::new(config.commands.clone(), shell, containers);
        Ok(Self::new(provider, device, config.authorised_src_idens.clone(), executor))
    }

    pub fn new(
        provider: Arc<dyn PushProvider>,
        device: Device,
        authorised: HashSet<String>,
        executor: CommandExecutor,
    ) -> Self {
        let processor = PushProcessor::new(provider.clone(), executor);
        Self {
            provider,
            device,
            authorised,
            processor,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Raw pushes from the provider, unfiltered.
    pub async fn fetch(&self, modified_after: Option<f64>) -> Result<Vec<Push>, ProviderError> {
        self.provider.list_pushes(modified_after).await
    }

    /// Drops every push we must not act on.
    pub fn authorize(&self, pushes: Vec<Push>) -> Vec<Push> {
        filter::authorize(pushes, &self.device.iden, &self.authorised)
    }

    pub async fn process(&self, pushes: &[Push], ack: Acknowledge) -> BatchReport {
        self.processor.process(pushes, ack).await
    }
}

/// Finds our device by nickname, creating it when it is missing or the
/// lookup is refused.
pub async fn resolve_own_device(provider: &dyn PushProvider, name: &str) -> Result<Device, RelayError> {
    match provider.get_device(name).await {
        Ok(device) => Ok(device),
        Err(e @ (ProviderError::DeviceNotFound(_) | ProviderError::InvalidKey(_))) => {
            log::info!("Device lookup for '{}' failed ({}); registering it", name, e);
            provider
                .create_device(name)
                .await
                .map_err(|source| RelayError::DeviceSetup {
                    name: name.to_string(),
                    source,
                })
        }
        Err(source) => Err(RelayError::DeviceSetup {
            name: name.to_string(),
            source,
        }),
    }
}

/// Writes `  <nickname>: <iden>` for every device on the account.
pub async fn show_devices<W: Write>(provider: &dyn PushProvider, out: &mut W) -> Result<usize, RelayError> {
    let devices = provider.list_devices().await?;
    log::info!("Pushbullet devices:");
    for device in &devices {
        writeln!(out, "  {}: {}", device.name(), device.iden)?;
    }
    Ok(devices.len())
}
