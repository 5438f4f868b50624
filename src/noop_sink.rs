use crate::sentry::event::RemoteEvent;
use crate::sink::EventSink;
use async_trait::async_trait;
use std::error::Error;

/// A sink that accepts and discards every event.
///
/// Useful for measuring the cost of event assembly on its own, and wherever
/// a core is required but nothing should leave the process.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn send(&self, _event: &RemoteEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Core;
    use crate::level::Level;
    use crate::record::Entry;
    use crate::sentry::SentryCore;
    use crate::transport::{ChannelTransport, TransportConfig};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn accepts_everything() {
        let (transport, _task) =
            ChannelTransport::new(Arc::new(NoopSink), TransportConfig::default());
        let stats = Arc::clone(&transport.stats);
        let core = SentryCore::new(Level::Debug, transport);

        for i in 0..10 {
            core.write(&Entry::new(Level::Info, format!("event {}", i)), &[]).unwrap();
        }
        core.sync().unwrap();

        assert_eq!(stats.enqueued.load(Ordering::Relaxed), 10);
        assert_eq!(stats.delivered.load(Ordering::Relaxed), 10);
        assert_eq!(stats.failed.load(Ordering::Relaxed), 0);
    }
}
