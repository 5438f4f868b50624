use crate::chain::FieldChain;
use crate::core::Core;
use crate::error::Result;
use crate::field::Field;
use crate::level::{Level, LevelEnabler};
use crate::record::Entry;
use crate::sentry::classify::{accumulate, Accumulated};
use crate::sentry::event::{build, EventDefaults, RemoteEvent};
use crate::sentry::stacktrace::{resolve, BacktraceFrames, FramePolicy, FrameSource};
use crate::transport::{DeliveryError, Transport};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// [`Core`] that reports entries as events to an error tracker.
///
/// Every write classifies the attached and per-call fields, resolves an
/// exception with a stack trace and hands the resulting [`RemoteEvent`] to
/// the [`Transport`]. Entries whose level satisfies the sync level block
/// until the transport confirms delivery; all others are fire-and-forget.
#[derive(Clone)]
pub struct SentryCore {
    enabler: Arc<dyn LevelEnabler>,
    transport: Arc<dyn Transport>,
    frames: Arc<dyn FrameSource>,
    policy: Arc<FramePolicy>,
    sync_level: Option<Arc<dyn LevelEnabler>>,
    stack_trace_skip: usize,
    flush_timeout: Duration,
    defaults: EventDefaults,
    fields: FieldChain,
}

impl SentryCore {
    pub fn new<E, T>(enabler: E, transport: T) -> Self
    where
        E: LevelEnabler + 'static,
        T: Transport + 'static,
    {
        SentryCore {
            enabler: Arc::new(enabler),
            transport: Arc::new(transport),
            frames: Arc::new(BacktraceFrames),
            policy: Arc::new(FramePolicy::default()),
            sync_level: None,
            stack_trace_skip: 0,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            defaults: EventDefaults::default(),
            fields: FieldChain::new(),
        }
    }

    /// Drop this many of the most recent frames from synthesized stacks.
    pub fn stack_trace_skip(mut self, skip: usize) -> Self {
        self.stack_trace_skip = skip;
        self
    }

    /// Block writes at these levels until delivery is confirmed.
    pub fn sync_level<E: LevelEnabler + 'static>(mut self, enabler: E) -> Self {
        self.sync_level = Some(Arc::new(enabler));
        self
    }

    /// Upper bound for [`Core::sync`].
    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn defaults(mut self, defaults: EventDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn frame_source<F: FrameSource + 'static>(mut self, frames: F) -> Self {
        self.frames = Arc::new(frames);
        self
    }

    pub fn frame_policy(mut self, policy: FramePolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Concrete counterpart of [`Core::with`].
    pub fn with_fields(&self, fields: &[Field]) -> SentryCore {
        SentryCore {
            fields: self.fields.push(fields),
            ..self.clone()
        }
    }

    /// Run the assembly pipeline without dispatching. `None` when a skip
    /// field suppressed the entry.
    pub fn event(&self, entry: &Entry, fields: &[Field]) -> Result<Option<RemoteEvent>> {
        let classified = match accumulate(self.fields.iter(), fields)? {
            Accumulated::Fields(classified) => classified,
            Accumulated::Skipped => return Ok(None),
        };
        let exception = resolve(
            classified.error.as_ref(),
            &entry.message,
            self.stack_trace_skip,
            self.frames.as_ref(),
            &self.policy,
        );
        Ok(Some(build(entry, classified, Some(exception), &self.defaults)))
    }

    fn dispatch(&self, level: Level, event: RemoteEvent) -> Result<()> {
        let wait = self
            .sync_level
            .as_ref()
            .is_some_and(|enabler| enabler.enabled(level));
        if wait {
            return match self.transport.send(event)?.wait() {
                Err(DeliveryError::WouldBlock) => {
                    tracing::debug!(
                        target: "tracing_sink_ext",
                        "not waiting for delivery on a current-thread runtime"
                    );
                    Ok(())
                }
                result => Ok(result?),
            };
        }
        if let Err(e) = self.transport.send(event) {
            tracing::debug!(target: "tracing_sink_ext", error = %e, "dropping event");
        }
        Ok(())
    }
}

impl Core for SentryCore {
    fn enabled(&self, level: Level) -> bool {
        self.enabler.enabled(level)
    }

    fn with(&self, fields: &[Field]) -> Box<dyn Core> {
        Box::new(self.with_fields(fields))
    }

    fn write(&self, entry: &Entry, fields: &[Field]) -> Result<()> {
        match self.event(entry, fields)? {
            Some(event) => self.dispatch(entry.level, event),
            None => Ok(()),
        }
    }

    fn sync(&self) -> Result<()> {
        self.transport.flush(self.flush_timeout)
    }
}
