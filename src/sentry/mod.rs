//! Error-tracker adapter.
//!
//! Turns log entries into tracker events: reserved keys fill event
//! attributes, `#`-prefixed keys become tags, everything else ends up as
//! extra context, and an `error` field becomes the event's exception.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tracing_sink_ext::core::Core;
//! use tracing_sink_ext::field::Field;
//! use tracing_sink_ext::level::Level;
//! use tracing_sink_ext::record::Entry;
//! use tracing_sink_ext::sentry::SentryCore;
//! use tracing_sink_ext::transport::MemoryTransport;
//!
//! let transport = Arc::new(MemoryTransport::new());
//! let core = SentryCore::new(Level::Error, Arc::clone(&transport))
//!     .with_fields(&[Field::str("#service", "billing")]);
//!
//! core.write(&Entry::new(Level::Error, "charge failed"), &[Field::i64("invoice", 7)])
//!     .unwrap();
//! assert_eq!(transport.events().len(), 1);
//! ```

pub mod classify;
pub mod core;
pub mod event;
pub mod keys;
pub mod stacktrace;
pub mod user;

pub use self::core::{SentryCore, DEFAULT_FLUSH_TIMEOUT};
pub use event::{RemoteEvent, Severity};
pub use keys::{skip, tag};
pub use stacktrace::TracedError;
pub use user::{user_field, User};
