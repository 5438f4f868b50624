use crate::dsn::{parse_dsn, Dsn};
use crate::env::*;
use crate::error::{Error, Result};
use crate::level::Level;
use crate::sentry::event::EventDefaults;
use crate::sentry::{SentryCore, DEFAULT_FLUSH_TIMEOUT};
use crate::transport::{Transport, TransportConfig};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Deployment environment. Each one implies a default minimum level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn default_level(&self) -> Level {
        match self {
            Environment::Development => Level::Debug,
            Environment::Production => Level::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(Error::UnknownEnvironment(s.to_string())),
        }
    }
}

/// Construction-time settings of a [`SentryCore`].
///
/// **Fields**
/// - `level`: minimum reported level; falls back to the environment's
///   default, then to `Error`.
/// - `sync_level`: writes at or above it wait for delivery confirmation.
/// - `stack_trace_skip`: most recent frames dropped from synthesized stacks.
/// - `flush_timeout`: upper bound for `sync()`.
/// - `transport`: tuning of the background delivery task.
#[derive(Clone, Debug)]
pub struct SentryConfig {
    pub dsn: Option<Dsn>,
    pub environment: Option<Environment>,
    pub level: Option<Level>,
    pub sync_level: Option<Level>,
    pub stack_trace_skip: usize,
    pub flush_timeout: Duration,
    pub release: Option<String>,
    pub server_name: Option<String>,
    pub transport: TransportConfig,
}

impl Default for SentryConfig {
    fn default() -> Self {
        SentryConfig {
            dsn: None,
            environment: None,
            level: None,
            sync_level: None,
            stack_trace_skip: 0,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            release: None,
            server_name: None,
            transport: TransportConfig::default(),
        }
    }
}

impl SentryConfig {
    /// Build a configuration from `SINKEXT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        SentryConfig::from_lookup(env_opt)
    }

    /// Same as [`SentryConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = SentryConfig::default();
        if let Some(dsn) = lookup(SINKEXT_DSN_ENV) {
            config.dsn = Some(parse_dsn(&dsn)?);
        }
        if let Some(env) = lookup(SINKEXT_ENVIRONMENT_ENV) {
            config.environment = Some(env.parse()?);
        }
        if let Some(level) = lookup(SINKEXT_LEVEL_ENV) {
            config.level = Some(level.parse()?);
        }
        if let Some(level) = lookup(SINKEXT_SYNC_LEVEL_ENV) {
            config.sync_level = Some(level.parse()?);
        }
        if let Some(ms) = lookup(SINKEXT_FLUSH_TIMEOUT_MS_ENV).and_then(|ms| ms.parse().ok()) {
            config.flush_timeout = Duration::from_millis(ms);
        }
        config.release = lookup(SINKEXT_RELEASE_ENV);
        config.server_name = lookup(SINKEXT_SERVER_NAME_ENV);
        Ok(config)
    }

    pub fn min_level(&self) -> Level {
        self.level
            .or_else(|| self.environment.map(|env| env.default_level()))
            .unwrap_or(Level::Error)
    }

    pub fn event_defaults(&self) -> EventDefaults {
        EventDefaults {
            server_name: self.server_name.clone().or_else(local_hostname),
            project: self.dsn.as_ref().map(|dsn| dsn.project_id.clone()),
            environment: self.environment.map(|env| env.to_string()),
            release: self.release.clone(),
        }
    }

    /// Build a core that reports through `transport`.
    pub fn build_core<T: Transport + 'static>(&self, transport: T) -> SentryCore {
        let core = SentryCore::new(self.min_level(), transport)
            .stack_trace_skip(self.stack_trace_skip)
            .flush_timeout(self.flush_timeout)
            .defaults(self.event_defaults());
        match self.sync_level {
            Some(level) => core.sync_level(level),
            None => core,
        }
    }
}

fn local_hostname() -> Option<String> {
    hostname::get().ok().and_then(|name| name.into_string().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Core;
    use crate::transport::MemoryTransport;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn environments_imply_default_levels() {
        let dev = SentryConfig {
            environment: Some(Environment::Development),
            ..Default::default()
        };
        let prod = SentryConfig {
            environment: Some(Environment::Production),
            ..Default::default()
        };
        assert_eq!(dev.min_level(), Level::Debug);
        assert_eq!(prod.min_level(), Level::Error);
        assert_eq!(SentryConfig::default().min_level(), Level::Error);

        let explicit = SentryConfig {
            level: Some(Level::Warn),
            ..prod
        };
        assert_eq!(explicit.min_level(), Level::Warn);
    }

    #[test]
    fn reads_variables() {
        let config = SentryConfig::from_lookup(lookup(&[
            (SINKEXT_DSN_ENV, "https://key@tracker.example.com/99"),
            (SINKEXT_ENVIRONMENT_ENV, "development"),
            (SINKEXT_SYNC_LEVEL_ENV, "panic"),
            (SINKEXT_FLUSH_TIMEOUT_MS_ENV, "250"),
            (SINKEXT_RELEASE_ENV, "v9"),
            (SINKEXT_SERVER_NAME_ENV, "web-1"),
        ]))
        .unwrap();

        assert_eq!(config.min_level(), Level::Debug);
        assert_eq!(config.sync_level, Some(Level::Panic));
        assert_eq!(config.flush_timeout, Duration::from_millis(250));

        let defaults = config.event_defaults();
        assert_eq!(defaults.project.as_deref(), Some("99"));
        assert_eq!(defaults.environment.as_deref(), Some("development"));
        assert_eq!(defaults.release.as_deref(), Some("v9"));
        assert_eq!(defaults.server_name.as_deref(), Some("web-1"));
    }

    #[test]
    fn rejects_unknown_environment_and_level() {
        let err = SentryConfig::from_lookup(lookup(&[(SINKEXT_ENVIRONMENT_ENV, "staging")]))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEnvironment(_)));

        let err = SentryConfig::from_lookup(lookup(&[(SINKEXT_LEVEL_ENV, "loud")])).unwrap_err();
        assert!(matches!(err, Error::UnknownLevel(_)));

        let err = SentryConfig::from_lookup(lookup(&[(SINKEXT_DSN_ENV, "nope")])).unwrap_err();
        assert!(matches!(err, Error::Dsn(_)));
    }

    #[test]
    fn built_core_uses_the_minimum_level() {
        let config = SentryConfig {
            environment: Some(Environment::Production),
            ..Default::default()
        };
        let core = config.build_core(MemoryTransport::new());
        assert!(!core.enabled(Level::Warn));
        assert!(core.enabled(Level::Error));
    }
}
