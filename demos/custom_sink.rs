use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};
use tracing_sink_ext::{
    config::{Environment, SentryConfig},
    init::{init_tracing_with_config, LayerConfig},
    sentry::RemoteEvent,
    sink::EventSink,
};

/// Example of delivering events with a hand-written backend by implementing
/// the `EventSink` trait directly. Imagine this posting to an in-house
/// incident tracker; here it just prints the JSON payload.
struct StdoutJsonSink;

#[async_trait]
impl EventSink for StdoutJsonSink {
    async fn send(
        &self,
        event: &RemoteEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        println!("[tracker] {}", serde_json::to_string_pretty(event)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink: Arc<dyn EventSink> = Arc::new(StdoutJsonSink);
    let config = LayerConfig {
        sentry: SentryConfig {
            environment: Some(Environment::Development),
            release: Some(env!("CARGO_PKG_VERSION").to_string()),
            ..SentryConfig::default()
        },
        enable_stdout: false,
    };

    let _guard = init_tracing_with_config(sink, config)?;

    info!(tags.stage = "startup", "custom sink example started");
    let span = tracing::info_span!("checkout", order_id = 1017);
    let _entered = span.enter();
    warn!(latency_ms = 870, "payment provider is slow");
    error!(tags.provider = "acme-pay", "payment declined");
    Ok(())
}
