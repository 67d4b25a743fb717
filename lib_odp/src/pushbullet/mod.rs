//! # Pushbullet Provider
//!
//! Everything the relay knows about its notification provider. The relay core
//! only talks to the [`PushProvider`] trait; [`PushbulletClient`] is the
//! production implementation and tests substitute an in-memory one.
//!
//! ## Contained Modules:
//! - **`models`**: serde wire types for devices, pushes and stream frames.
//! - **`client`**: REST client over the shared retrying `ApiClient`.
//! - **`stream`**: websocket subscription for the event-driven relay.
//! - **`error`**: the provider error type.

use async_trait::async_trait;

pub mod client;
pub mod error;
pub mod models;
pub mod stream;

pub use client::PushbulletClient;
pub use error::ProviderError;
pub use models::{Device, Push, StreamMessage};

/// Operations the relay consumes from the provider.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// All active devices on the account.
    async fn list_devices(&self) -> Result<Vec<Device>, ProviderError>;

    /// Finds an active device by nickname.
    async fn get_device(&self, nickname: &str) -> Result<Device, ProviderError> {
        self.list_devices()
            .await?
            .into_iter()
            .find(|d| d.name() == nickname)
            .ok_or_else(|| ProviderError::DeviceNotFound(nickname.to_string()))
    }

    /// Registers a new device with the given nickname.
    async fn create_device(&self, nickname: &str) -> Result<Device, ProviderError>;

    /// Active pushes, optionally only those modified strictly after `modified_after`.
    async fn list_pushes(&self, modified_after: Option<f64>) -> Result<Vec<Push>, ProviderError>;

    async fn delete_push(&self, iden: &str) -> Result<(), ProviderError>;

    /// Sends a note push to one device.
    async fn push_note(&self, device_iden: &str, title: &str, body: &str) -> Result<(), ProviderError>;
}
