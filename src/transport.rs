use crate::error::{Error, Result};
use crate::sentry::event::RemoteEvent;
use crate::sink::EventSink;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Why an event did not reach its sink.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("event {event_id} rejected after {attempts} attempts: {reason}")]
    Rejected {
        event_id: String,
        attempts: u32,
        reason: String,
    },

    #[error("transport queue is full")]
    QueueFull,

    #[error("transport shut down before the event was delivered")]
    Disconnected,

    #[error("no delivery confirmation within {0:?}")]
    Timeout(Duration),

    /// Waiting would block the only thread of a current-thread runtime.
    #[error("cannot wait for delivery on a current-thread runtime")]
    WouldBlock,
}

pub type DeliveryResult = std::result::Result<(), DeliveryError>;

/// Handle on the outcome of one dispatched event.
///
/// Dropping it is the fire-and-forget path; [`Delivery::wait`] blocks until
/// the transport reports the outcome. On a multi-thread Tokio runtime the wait
/// goes through `block_in_place`. On a current-thread runtime an unresolved
/// handle yields [`DeliveryError::WouldBlock`] instead of blocking the thread
/// that has to run the delivery task.
#[derive(Debug)]
pub struct Delivery {
    rx: Receiver<DeliveryResult>,
}

/// Sending half of a [`Delivery`].
#[derive(Debug)]
pub struct Acknowledger {
    tx: Sender<DeliveryResult>,
}

impl Acknowledger {
    pub fn ack(self, result: DeliveryResult) {
        // The waiter may be long gone; nobody to tell then.
        let _ = self.tx.send(result);
    }
}

impl Delivery {
    pub fn pending() -> (Acknowledger, Delivery) {
        let (tx, rx) = bounded(1);
        (Acknowledger { tx }, Delivery { rx })
    }

    /// A handle that is already resolved.
    pub fn ready(result: DeliveryResult) -> Delivery {
        let (ack, delivery) = Delivery::pending();
        ack.ack(result);
        delivery
    }

    pub fn wait(self) -> DeliveryResult {
        if let Ok(result) = self.rx.try_recv() {
            return result;
        }
        blocking(|| self.rx.recv().unwrap_or(Err(DeliveryError::Disconnected)))
            .unwrap_or(Err(DeliveryError::WouldBlock))
    }

    pub fn wait_timeout(self, timeout: Duration) -> DeliveryResult {
        if let Ok(result) = self.rx.try_recv() {
            return result;
        }
        blocking(|| match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(DeliveryError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(DeliveryError::Disconnected),
        })
        .unwrap_or(Err(DeliveryError::WouldBlock))
    }
}

/// Run a blocking wait without starving the runtime that has to complete it.
///
/// `None` when called from a current-thread runtime, where the wait could
/// never finish.
fn blocking<T>(wait: impl FnOnce() -> T) -> Option<T> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => None,
        Ok(_) => Some(tokio::task::block_in_place(wait)),
        Err(_) => Some(wait()),
    }
}

/// Outbound capability used by the sentry adapter.
pub trait Transport: Send + Sync {
    /// Hand `event` over for delivery. Never blocks on the delivery itself.
    fn send(&self, event: RemoteEvent) -> Result<Delivery>;

    /// Wait up to `timeout` for everything already sent to be delivered.
    fn flush(&self, timeout: Duration) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, event: RemoteEvent) -> Result<Delivery> {
        (**self).send(event)
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        (**self).flush(timeout)
    }
}

/// Tuning of [`ChannelTransport`].
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Maximum queued events before new ones are rejected.
    pub buffer: usize,
    pub batch_size: usize,
    /// Longest time a partial batch waits before being sent.
    pub flush_interval: Duration,
    /// Retries after the first failed attempt of an event.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            buffer: 1024,
            batch_size: 32,
            flush_interval: Duration::from_secs(1),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Counters maintained by [`ChannelTransport`].
#[derive(Debug, Default)]
pub struct TransportStats {
    pub enqueued: AtomicU64,
    pub dropped: AtomicU64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
}

enum Message {
    Event(RemoteEvent, Acknowledger),
    Flush(Sender<()>),
}

/// [`Transport`] that queues events on a bounded channel and delivers them
/// to an [`EventSink`] from a background Tokio task, in batches, with
/// exponential backoff between retries.
pub struct ChannelTransport {
    sender: mpsc::Sender<Message>,
    pub stats: Arc<TransportStats>,
}

impl ChannelTransport {
    /// Spawn the delivery task on the current Tokio runtime.
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations.
    ///
    /// # Panics
    ///
    /// When called outside of a Tokio runtime.
    pub fn new(sink: Arc<dyn EventSink>, config: TransportConfig) -> (Self, JoinHandle<()>) {
        ChannelTransport::spawn_on(&Handle::current(), sink, config)
    }

    /// Spawn the delivery task on `handle`.
    pub fn spawn_on(
        handle: &Handle,
        sink: Arc<dyn EventSink>,
        config: TransportConfig,
    ) -> (Self, JoinHandle<()>) {
        let config = TransportConfig {
            buffer: config.buffer.max(16),
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval.max(Duration::from_millis(10)),
            ..config
        };

        let (tx, rx) = mpsc::channel::<Message>(config.buffer);
        let stats = Arc::new(TransportStats::default());
        let task = handle.spawn(run_worker(sink, config, rx, Arc::clone(&stats)));

        (ChannelTransport { sender: tx, stats }, task)
    }
}

async fn run_worker(
    sink: Arc<dyn EventSink>,
    config: TransportConfig,
    mut rx: mpsc::Receiver<Message>,
    stats: Arc<TransportStats>,
) {
    let mut batch = Vec::with_capacity(config.batch_size);

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(Message::Event(event, ack)) => {
                    batch.push((event, ack));
                    if batch.len() >= config.batch_size {
                        send_batch(&*sink, &mut batch, &config, &stats).await;
                    }
                }
                Some(Message::Flush(done)) => {
                    send_batch(&*sink, &mut batch, &config, &stats).await;
                    if let Err(e) = sink.flush().await {
                        tracing::warn!(
                            target: "tracing_sink_ext",
                            error = %e,
                            "event sink flush failed"
                        );
                    }
                    let _ = done.send(());
                }
                None => {
                    send_batch(&*sink, &mut batch, &config, &stats).await;
                    break;
                }
            },
            _ = sleep(config.flush_interval) => {
                if !batch.is_empty() {
                    send_batch(&*sink, &mut batch, &config, &stats).await;
                }
            }
        }
    }
}

async fn send_batch(
    sink: &dyn EventSink,
    batch: &mut Vec<(RemoteEvent, Acknowledger)>,
    config: &TransportConfig,
    stats: &TransportStats,
) {
    for (event, ack) in batch.drain(..) {
        let result = deliver(sink, &event, config).await;
        match &result {
            Ok(()) => stats.delivered.fetch_add(1, Ordering::Relaxed),
            Err(_) => stats.failed.fetch_add(1, Ordering::Relaxed),
        };
        ack.ack(result);
    }
}

async fn deliver(
    sink: &dyn EventSink,
    event: &RemoteEvent,
    config: &TransportConfig,
) -> DeliveryResult {
    let mut backoff = config.initial_backoff;
    let mut attempts = 0;
    loop {
        attempts += 1;
        match sink.send(event).await {
            Ok(()) => return Ok(()),
            Err(e) if attempts > config.max_retries => {
                tracing::warn!(
                    target: "tracing_sink_ext",
                    event_id = %event.event_id,
                    attempts,
                    error = %e,
                    "giving up on event delivery"
                );
                return Err(DeliveryError::Rejected {
                    event_id: event.event_id.clone(),
                    attempts,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                tracing::debug!(
                    target: "tracing_sink_ext",
                    error = %e,
                    "event delivery failed, retrying in {:?}",
                    backoff
                );
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}

impl Transport for ChannelTransport {
    fn send(&self, event: RemoteEvent) -> Result<Delivery> {
        let (ack, delivery) = Delivery::pending();
        match self.sender.try_send(Message::Event(event, ack)) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(delivery)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(DeliveryError::QueueFull.into())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Error::TransportClosed),
        }
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        blocking(|| self.flush_blocking(timeout))
            .unwrap_or(Err(Error::Delivery(DeliveryError::WouldBlock)))
    }
}

impl ChannelTransport {
    fn flush_blocking(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let (done_tx, done_rx) = bounded(1);
        let mut message = Message::Flush(done_tx);
        loop {
            match self.sender.try_send(message) {
                Ok(()) => break,
                Err(mpsc::error::TrySendError::Closed(_)) => return Err(Error::TransportClosed),
                Err(mpsc::error::TrySendError::Full(back)) => {
                    if Instant::now() >= deadline {
                        return Err(Error::FlushTimeout(timeout));
                    }
                    message = back;
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        done_rx
            .recv_timeout(remaining)
            .map_err(|_| Error::FlushTimeout(timeout))
    }
}

/// [`Transport`] that keeps every event in memory and acknowledges it on the
/// spot. Meant for tests and for inspecting what would have been sent.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    events: Mutex<Vec<RemoteEvent>>,
    fail_with: Option<DeliveryError>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        MemoryTransport::default()
    }

    /// Record events, but resolve every delivery handle with `error`.
    pub fn failing(error: DeliveryError) -> Self {
        MemoryTransport {
            events: Mutex::new(Vec::new()),
            fail_with: Some(error),
        }
    }

    pub fn events(&self) -> Vec<RemoteEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<RemoteEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl Transport for MemoryTransport {
    fn send(&self, event: RemoteEvent) -> Result<Delivery> {
        self.events.lock().push(event);
        Ok(Delivery::ready(match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }))
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}
