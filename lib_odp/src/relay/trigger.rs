//! # Triggers
//!
//! A trigger decides *when* the relay fetches and processes pushes. Both
//! implementations drive the same [`RelayService`] and differ only in timing
//! and in how processed pushes are acknowledged.
//!
//! - **`PollingTrigger`**: fixed interval, first cycle immediately. Pushes are
//!   deleted after processing.
//! - **`StreamTrigger`**: waits for a `tickle`/`push` on the realtime stream,
//!   then fetches everything modified after its time cursor. Pushes are left
//!   in place; the cursor moves past them.
//!
//! Cancellation is only observed between cycles, so a batch that has started
//! always runs to the end.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::processor::Acknowledge;
use super::service::RelayService;
use super::RelayError;
use crate::pushbullet::{ProviderError, StreamMessage};

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// The provider sends a `nop` every 30 seconds; three missed ones mean the
/// connection is gone.
pub const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_secs(90);

#[async_trait]
pub trait Trigger: Send {
    fn name(&self) -> &'static str;

    /// Runs until `shutdown` is cancelled (`Ok`) or the trigger can no
    /// longer make progress (`Err`).
    async fn run(&mut self, service: &RelayService, shutdown: CancellationToken) -> Result<(), RelayError>;
}

pub struct PollingTrigger {
    interval: Duration,
    cycles: u64,
}

impl PollingTrigger {
    pub fn new(interval: Duration) -> Self {
        Self { interval, cycles: 0 }
    }

    /// Completed fetch/process cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// One fetch → filter → process → delete cycle.
    pub async fn poll_once(&mut self, service: &RelayService) {
        log::debug!("Refreshing pushes...");
        self.cycles += 1;

        let pushes = match service.fetch(None).await {
            Ok(pushes) => pushes,
            Err(e) => {
                log::error!("Failed to fetch pushes: {}", e);
                return;
            }
        };

        let ours = service.authorize(pushes);
        let report = service.process(&ours, Acknowledge::Delete).await;
        if !report.is_empty() {
            log::info!("Poll cycle {}: {}", self.cycles, report);
        }
    }
}

impl Default for PollingTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[async_trait]
impl Trigger for PollingTrigger {
    fn name(&self) -> &'static str {
        "polling"
    }

    async fn run(&mut self, service: &RelayService, shutdown: CancellationToken) -> Result<(), RelayError> {
        log::info!("Polling for pushes every {}s", self.interval.as_secs());

        // A cycle that overruns the interval swallows the missed ticks
        // instead of queueing them.
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    log::info!("Polling trigger shutting down.");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.poll_once(service).await;
                }
            }
        }
    }
}

/// Latest push modification time seen; only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeCursor(f64);

impl TimeCursor {
    pub fn new(start: f64) -> Self {
        Self(start)
    }

    /// Cursor at the current wall-clock time.
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0)
    }

    pub fn get(&self) -> f64 {
        self.0
    }

    /// Moves the cursor to `modified` if that is later. Returns whether it moved.
    pub fn advance(&mut self, modified: f64) -> bool {
        if modified > self.0 {
            self.0 = modified;
            true
        } else {
            false
        }
    }
}

/// Cursor at the newest push the provider already holds, so only pushes
/// created after startup are acted on. Provider timestamps are used instead of
/// the local clock, which may run ahead of the server's.
///
/// An empty account yields `0.0`; a failed fetch falls back to the local clock.
pub async fn starting_cursor(service: &RelayService) -> TimeCursor {
    match service.fetch(None).await {
        Ok(pushes) => {
            let newest = pushes.iter().map(|p| p.modified).fold(0.0, f64::max);
            log::debug!("Stream cursor starts at {} ({} existing pushes)", newest, pushes.len());
            TimeCursor::new(newest)
        }
        Err(e) => {
            log::warn!("Could not read existing pushes ({}); starting the cursor at the local clock", e);
            TimeCursor::now()
        }
    }
}

pub struct StreamTrigger<S> {
    events: S,
    cursor: TimeCursor,
    silence_timeout: Duration,
}

impl<S> StreamTrigger<S>
where
    S: Stream<Item = Result<StreamMessage, ProviderError>> + Unpin + Send,
{
    pub fn new(events: S, cursor: TimeCursor) -> Self {
        Self {
            events,
            cursor,
            silence_timeout: DEFAULT_SILENCE_TIMEOUT,
        }
    }

    pub fn with_silence_timeout(mut self, timeout: Duration) -> Self {
        self.silence_timeout = timeout;
        self
    }

    pub fn cursor(&self) -> TimeCursor {
        self.cursor
    }

    /// Fetches pushes newer than the cursor, advances it, and processes ours.
    pub async fn on_push_changed(&mut self, service: &RelayService) {
        let after = self.cursor.get();
        log::debug!("Push tickle: fetching pushes modified after {}", after);

        let pushes = match service.fetch(Some(after)).await {
            Ok(pushes) => pushes,
            Err(e) => {
                // Cursor untouched: the next tickle retries the same window.
                log::error!("Failed to fetch pushes modified after {}: {}", after, e);
                return;
            }
        };

        for push in &pushes {
            self.cursor.advance(push.modified);
        }
        log::debug!("Cursor {} -> {} ({} pushes)", after, self.cursor.get(), pushes.len());

        let ours = service.authorize(pushes);
        let report = service.process(&ours, Acknowledge::Cursor).await;
        if !report.is_empty() {
            log::info!("Stream batch: {}", report);
        }
    }
}

#[async_trait]
impl<S> Trigger for StreamTrigger<S>
where
    S: Stream<Item = Result<StreamMessage, ProviderError>> + Unpin + Send,
{
    fn name(&self) -> &'static str {
        "stream"
    }

    async fn run(&mut self, service: &RelayService, shutdown: CancellationToken) -> Result<(), RelayError> {
        log::info!("Listening for push changes (cursor {})", self.cursor.get());

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    log::info!("Stream trigger shutting down.");
                    return Ok(());
                }
                next = tokio::time::timeout(self.silence_timeout, self.events.next()) => next,
            };

            match next {
                Err(_) => {
                    log::warn!("Inactivity timeout ({}s) on the push stream.", self.silence_timeout.as_secs());
                    return Err(ProviderError::StreamSilent(self.silence_timeout.as_secs()).into());
                }
                Ok(None) => return Err(ProviderError::StreamClosed.into()),
                Ok(Some(Err(ProviderError::StreamDecode(e)))) => {
                    log::warn!("Skipping unreadable stream message: {}", e);
                }
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(Some(Ok(message))) => {
                    if message.is_push_tickle() {
                        self.on_push_changed(service).await;
                    } else {
                        log::trace!("Stream message ignored: {:?}", message);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_never_regresses() {
        let mut cursor = TimeCursor::new(90.0);
        assert!(cursor.advance(100.0));
        assert!(cursor.advance(105.0));
        assert!(!cursor.advance(100.0));
        assert!(!cursor.advance(105.0));
        assert!(!cursor.advance(f64::NAN));
        assert_eq!(cursor.get(), 105.0);
    }

    #[test]
    fn test_cursor_now_is_recent() {
        let cursor = TimeCursor::now();
        assert!(cursor.get() > 1_600_000_000.0);
    }
}
