//! Adapters that redirect structured log entries to external sinks.
//!
//! - [`sentry`]: turns entries into error-tracker events (tags, context,
//!   exception chains with stack traces) and dispatches them through a
//!   [`transport::Transport`].
//! - [`syslog`]: encodes entries as JSON and writes them with a
//!   level-derived syslog priority.
//! - [`middleware`]: filters entries before they reach another core.
//!
//! All of them implement [`core::Core`]; [`layer::CoreLayer`] plugs any core
//! into a `tracing` subscriber.

pub mod chain;
pub mod config;
pub mod core;
pub mod dsn;
pub mod env;
pub mod error;
pub mod field;
pub mod layer;
pub mod level;
pub mod middleware;
pub mod record;
pub mod sentry;
pub mod sink;
#[cfg(feature = "syslog")]
pub mod syslog;
pub mod transport;
pub mod types;

pub mod init;
pub mod noop_sink;

pub use error::{Error, Result};
