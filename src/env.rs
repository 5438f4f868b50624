//! Environment variable names read by [`SentryConfig::from_env`].
//!
//! These are purely helpers; the cores themselves never touch the process
//! environment.
//!
//! [`SentryConfig::from_env`]: crate::config::SentryConfig::from_env

/// Event-tracker DSN, e.g. `https://key@o1.ingest.example.com/42`.
pub const SINKEXT_DSN_ENV: &str = "SINKEXT_DSN";

/// `development` or `production`.
pub const SINKEXT_ENVIRONMENT_ENV: &str = "SINKEXT_ENVIRONMENT";

/// Minimum level reported, overriding the environment's default.
pub const SINKEXT_LEVEL_ENV: &str = "SINKEXT_LEVEL";

/// Level from which writes block until delivery is confirmed.
pub const SINKEXT_SYNC_LEVEL_ENV: &str = "SINKEXT_SYNC_LEVEL";

/// Flush timeout in milliseconds.
pub const SINKEXT_FLUSH_TIMEOUT_MS_ENV: &str = "SINKEXT_FLUSH_TIMEOUT_MS";

/// Release identifier attached to every event.
pub const SINKEXT_RELEASE_ENV: &str = "SINKEXT_RELEASE";

/// Server name attached to every event, defaults to the hostname.
pub const SINKEXT_SERVER_NAME_ENV: &str = "SINKEXT_SERVER_NAME";

/// Read an environment variable, treating empty values as unset.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

