use std::sync::Arc;
use std::time::Instant;

use tracing_sink_ext::core::Core;
use tracing_sink_ext::field::Field;
use tracing_sink_ext::level::Level;
use tracing_sink_ext::record::Entry;
use tracing_sink_ext::sentry::{skip, tag, SentryCore, TracedError};
use tracing_sink_ext::transport::MemoryTransport;

/// Drives a `SentryCore` directly, without `tracing`, and prints what would
/// have been sent. The last part measures the cost of event assembly alone.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let transport = Arc::new(MemoryTransport::new());
    let core = SentryCore::new(Level::Error, Arc::clone(&transport))
        .sync_level(Level::Fatal)
        .with_fields(&[tag("service", "example"), Field::str("server_name", "demo-host")]);

    let event_id = uuid::Uuid::new_v4().simple().to_string();
    core.write(
        &Entry::new(Level::Error, "nuked").logger("demo"),
        &[Field::str("event_id", event_id.as_str()), Field::i64("attempt", 3)],
    )?;

    let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
    core.write(
        &Entry::new(Level::Fatal, "database unreachable"),
        &[Field::error("error", TracedError::wrap(io, "opening pool"))],
    )?;

    core.write(&Entry::new(Level::Error, "never sent"), &[skip()])?;

    for event in transport.take() {
        println!("{}", serde_json::to_string_pretty(&event)?);
    }
    println!("reported event id: {}", event_id);

    let n: u64 = 10_000;
    let start = Instant::now();
    for i in 0..n {
        core.write(&Entry::new(Level::Error, "load"), &[Field::u64("iteration", i)])?;
    }
    let elapsed = start.elapsed();
    println!(
        "assembled {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    core.sync()?;
    Ok(())
}
