use crate::config::SentryConfig;
use crate::core::Core;
use crate::error::Result;
use crate::layer::CoreLayer;
use crate::sentry::SentryCore;
use crate::sink::EventSink;
use crate::transport::ChannelTransport;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the globally installed layer.
///
/// **Fields**
/// - `sentry`: settings of the [`SentryCore`] and of its delivery task.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked on top so entries are also printed to the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub sentry: SentryConfig,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            sentry: SentryConfig::default(),
            enable_stdout: true,
        }
    }
}

/// Flushes the core when dropped, bounded by the configured flush timeout.
///
/// Keep it alive for the lifetime of the program, typically in `main`.
#[must_use = "dropping the guard flushes immediately"]
pub struct FlushGuard {
    core: SentryCore,
}

impl FlushGuard {
    pub fn core(&self) -> &SentryCore {
        &self.core
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        if let Err(e) = self.core.sync() {
            eprintln!("tracing-sink-ext: flush on shutdown failed: {}", e);
        }
    }
}

/// Install a global `tracing` subscriber that reports to `sink`.
///
/// **Parameters**
/// - `sink`: implementation of [`EventSink`] that receives the assembled
///   events from a background task.
/// - `config`: [`LayerConfig`] controlling levels, event defaults and
///   batching.
///
/// **Effects**
///
/// Spawns the delivery task on the current Tokio runtime and installs a
/// [`Registry`] combined with [`CoreLayer`] as the global default
/// subscriber. Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    sink: Arc<dyn EventSink>,
    config: LayerConfig,
) -> Result<FlushGuard> {
    let (transport, _handle) = ChannelTransport::new(sink, config.sentry.transport.clone());
    let core = config.sentry.build_core(transport);
    let layer = CoreLayer::new(core.clone());

    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(FlushGuard { core })
}

/// Initialize tracing from `SINKEXT_*` environment variables.
///
/// Equivalent to calling [`init_tracing_with_config`] with a
/// [`SentryConfig::from_env`] configuration and console output enabled.
pub fn init_tracing(sink: Arc<dyn EventSink>) -> Result<FlushGuard> {
    let config = LayerConfig {
        sentry: SentryConfig::from_env()?,
        ..LayerConfig::default()
    };
    init_tracing_with_config(sink, config)
}
