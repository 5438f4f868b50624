use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a log [`Entry`](crate::record::Entry).
///
/// Ordered from least to most severe. The numeric discriminants follow the
/// widely used `-1..=5` scheme so raw levels coming from foreign front ends
/// can be converted with [`Level::try_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug = -1,
    Info = 0,
    Warn = 1,
    Error = 2,
    DPanic = 3,
    Panic = 4,
    Fatal = 5,
}

impl Level {
    pub const ALL: [Level; 7] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::DPanic,
        Level::Panic,
        Level::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::DPanic => "dpanic",
            Level::Panic => "panic",
            Level::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i8> for Level {
    type Error = Error;

    fn try_from(raw: i8) -> Result<Self, Error> {
        match raw {
            -1 => Ok(Level::Debug),
            0 => Ok(Level::Info),
            1 => Ok(Level::Warn),
            2 => Ok(Level::Error),
            3 => Ok(Level::DPanic),
            4 => Ok(Level::Panic),
            5 => Ok(Level::Fatal),
            other => Err(Error::UnknownLevel(other.to_string())),
        }
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "dpanic" => Ok(Level::DPanic),
            "panic" => Ok(Level::Panic),
            "fatal" => Ok(Level::Fatal),
            _ => Err(Error::UnknownLevel(s.to_string())),
        }
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Decides whether entries of a given level are enabled.
///
/// A bare [`Level`] acts as a minimum threshold; any `Fn(Level) -> bool`
/// can be used for anything more elaborate.
pub trait LevelEnabler: Send + Sync {
    fn enabled(&self, level: Level) -> bool;
}

impl LevelEnabler for Level {
    fn enabled(&self, level: Level) -> bool {
        level >= *self
    }
}

impl<F> LevelEnabler for F
where
    F: Fn(Level) -> bool + Send + Sync,
{
    fn enabled(&self, level: Level) -> bool {
        self(level)
    }
}
