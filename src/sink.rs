use crate::sentry::event::RemoteEvent;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for [`RemoteEvent`]s.
///
/// Implementations own the actual delivery to an event tracker (HTTP store
/// endpoint, message queue, local spool...). The crate never calls `send`
/// on the application thread: [`ChannelTransport`](crate::transport::ChannelTransport)
/// drives it from a background Tokio task.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver a single event.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the event.
    /// - `Err(..)` on any failure. The transport treats it as transient and
    ///   retries with backoff until its retry budget is spent, after which
    ///   the event's delivery handle resolves to an error.
    async fn send(&self, event: &RemoteEvent) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any records buffered by the backend.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
