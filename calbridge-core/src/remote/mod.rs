//! Boundaries to the source and sink calendars.

pub mod protocol;
mod provider;

use async_trait::async_trait;

use crate::error::CalBridgeResult;
use crate::sink_event::SinkEvent;
use crate::source_event::SourceEvent;

pub use provider::Provider;

/// The authoritative calendar.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fails with `Authentication` when credentials are no longer usable.
    async fn verify_session(&self) -> CalBridgeResult<()> {
        Ok(())
    }

    /// Every event currently in the source, in source order.
    async fn pull(&self) -> CalBridgeResult<Vec<SourceEvent>>;
}

/// The calendar that receives replicated changes.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Fails with `Authentication` when credentials are no longer usable.
    async fn verify_session(&self) -> CalBridgeResult<()> {
        Ok(())
    }

    /// `None` when no item has this id.
    async fn get(&self, remote_id: &str) -> CalBridgeResult<Option<SinkEvent>>;

    async fn create(&self, event: &SinkEvent) -> CalBridgeResult<SinkEvent>;

    /// Write `event` with the given sequence (one past the stored one).
    async fn update(&self, event: &SinkEvent, sequence: i64) -> CalBridgeResult<SinkEvent>;

    /// Fails with `NotFound` when no item has this id.
    async fn delete(&self, remote_id: &str) -> CalBridgeResult<()>;

    async fn list(&self, calendar_id: &str) -> CalBridgeResult<Vec<SinkEvent>>;
}
