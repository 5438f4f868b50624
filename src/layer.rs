use crate::core::Core;
use crate::field::{ErrorSnapshot, ErrorValue, Field, FieldValue};
use crate::level::Level;
use crate::record::{Caller, Entry};
use crate::sentry::keys::TAG_PREFIX;
use chrono::Utc;
use std::sync::Arc;
use tracing::field::{Field as TracingField, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Target of the crate's own diagnostics. Events with exactly this target are
/// never fed back into a core.
pub const INTERNAL_TARGET: &str = "tracing_sink_ext";

/// `tracing` field names cannot contain `#`; `tags.name = ..` is accepted as
/// the spelling of the `#name` tag key instead.
pub const TRACING_TAG_PREFIX: &str = "tags.";

/// `tracing_subscriber` layer that feeds events into a [`Core`].
///
/// Fields recorded on enclosing spans act as attached fields, outermost span
/// first; the event's own fields follow and therefore win on conflicts. The
/// event's target becomes the logger name. Errors recorded with
/// `error = &err as &dyn Error` keep their whole `source()` chain.
pub struct CoreLayer<C> {
    core: C,
}

impl<C: Core> CoreLayer<C> {
    pub fn new(core: C) -> Self {
        CoreLayer { core }
    }

    pub fn core(&self) -> &C {
        &self.core
    }
}

/// Fields recorded on a span, stored in its extensions.
struct SpanFields(Vec<Field>);

impl<S, C> Layer<S> for CoreLayer<C>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    C: Core + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = Vec::new();
        let mut message = None;
        attrs.record(&mut FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        });
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanFields(fields));
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() {
            let mut message = None;
            values.record(&mut FieldVisitor {
                fields,
                message: &mut message,
            });
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target() == INTERNAL_TARGET {
            return;
        }
        let level = Level::from(meta.level());
        if !self.core.enabled(level) {
            return;
        }

        let mut event_fields = Vec::new();
        let mut message: Option<String> = None;
        event.record(&mut FieldVisitor {
            fields: &mut event_fields,
            message: &mut message,
        });

        let entry = Entry {
            timestamp: Utc::now(),
            level,
            logger_name: meta.target().to_string(),
            message: message.unwrap_or_default(),
            caller: Some(Caller {
                module_path: meta.module_path().map(|s| s.to_string()),
                file: meta.file().map(|s| s.to_string()),
                line: meta.line(),
            }),
        };
        if !self.core.check(&entry) {
            return;
        }

        let mut fields = Vec::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(SpanFields(span_fields)) = span.extensions().get::<SpanFields>() {
                    fields.extend(span_fields.iter().cloned());
                }
            }
        }
        fields.append(&mut event_fields);

        if let Err(e) = self.core.write(&entry, &fields) {
            eprintln!("tracing-sink-ext: failed to write log entry: {}", e);
        }
    }
}

/// Collects `tracing` values into [`Field`]s; the `message` field is kept
/// apart.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut Vec<Field>,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn push(&mut self, field: &TracingField, value: FieldValue) {
        let name = field.name();
        let key = match name.strip_prefix(TRACING_TAG_PREFIX) {
            Some(tag) => format!("{}{}", TAG_PREFIX, tag),
            None => name.to_string(),
        };
        self.fields.push(Field::new(key, value));
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &TracingField, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.push(field, FieldValue::Str(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.push(field, FieldValue::I64(value));
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.push(field, FieldValue::U64(value));
    }

    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.push(field, FieldValue::F64(value));
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.push(field, FieldValue::Bool(value));
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn std::error::Error + 'static)) {
        let snapshot = ErrorSnapshot::capture(value);
        let type_name = snapshot.type_name.clone();
        self.push(
            field,
            FieldValue::Error(ErrorValue::from_arc(Arc::new(snapshot), type_name)),
        );
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.push(field, FieldValue::Str(format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentry::stacktrace::{recorded_backtrace, Frame, FrameSource, TracedError};
    use crate::sentry::SentryCore;
    use crate::transport::MemoryTransport;
    use serde_json::json;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[derive(Debug, thiserror::Error)]
    #[error("query failed")]
    struct QueryError {
        #[source]
        cause: std::io::Error,
    }

    fn capture(f: impl FnOnce()) -> Vec<crate::sentry::RemoteEvent> {
        let transport = Arc::new(MemoryTransport::new());
        let layer = CoreLayer::new(SentryCore::new(Level::Warn, Arc::clone(&transport)));
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, f);
        transport.take()
    }

    #[test]
    fn events_become_entries() {
        let events = capture(|| {
            tracing::info!("below threshold");
            tracing::error!(server_name = "host1", tags.team = "infra", latency_ms = 42, "boom");
        });

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.message, "boom");
        assert_eq!(event.server_name.as_deref(), Some("host1"));
        assert_eq!(event.tags.as_ref().unwrap()["team"], "infra");
        assert_eq!(event.context.as_ref().unwrap()["latency_ms"], json!(42));
        assert_eq!(event.logger, module_path!());
    }

    #[test]
    fn span_fields_are_attached_and_overridable() {
        let events = capture(|| {
            let outer = tracing::info_span!("request", server_name = "a", request_id = 7);
            let _outer = outer.enter();
            let inner = tracing::info_span!("db", tags.component = "pg");
            let _inner = inner.enter();
            tracing::warn!(server_name = "b", "slow");
        });

        let event = &events[0];
        assert_eq!(event.server_name.as_deref(), Some("b"));
        assert_eq!(event.tags.as_ref().unwrap()["component"], "pg");
        assert_eq!(event.context.as_ref().unwrap()["request_id"], json!(7));
    }

    #[test]
    fn recorded_errors_keep_their_chain() {
        let err = QueryError {
            cause: std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timeout"),
        };
        let events = capture(|| {
            tracing::error!(error = &err as &(dyn std::error::Error + 'static), "lookup failed");
        });

        let exception = events[0].exception().unwrap();
        assert_eq!(exception.value, "socket timeout");
        assert_eq!(exception.ty, "Custom");
    }

    /// Reports `app::origin` for errors that recorded a stack and
    /// `app::callsite` for everything else.
    struct OriginFrames;

    impl FrameSource for OriginFrames {
        fn current_frames(&self) -> Vec<Frame> {
            vec![Frame::new("app::callsite")]
        }

        fn error_frames(&self, error: &(dyn std::error::Error + 'static)) -> Option<Vec<Frame>> {
            recorded_backtrace(error).map(|_| vec![Frame::new("app::origin")])
        }
    }

    #[test]
    fn traced_errors_keep_their_origin_stack() {
        let transport = Arc::new(MemoryTransport::new());
        let core = SentryCore::new(Level::Warn, Arc::clone(&transport)).frame_source(OriginFrames);
        let subscriber = Registry::default().with(CoreLayer::new(core));

        let err = TracedError::wrap(
            std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timeout"),
            "loading profile",
        );
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(
                error = &err as &(dyn std::error::Error + 'static),
                "profile lookup failed"
            );
        });

        let events = transport.take();
        let exception = events[0].exception().unwrap();
        let frames = &exception.stacktrace.as_ref().unwrap().frames;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].function.as_deref(), Some("app::origin"));
        assert_eq!(exception.value, "socket timeout");
    }

    #[test]
    fn own_diagnostics_are_ignored() {
        let events = capture(|| {
            tracing::error!(target: "tracing_sink_ext", "internal");
        });
        assert!(events.is_empty());
    }

    #[test]
    fn skip_field_works_through_tracing() {
        let events = capture(|| {
            tracing::error!(_sinkext_skip = true, "ignored");
        });
        assert!(events.is_empty());
    }
}
