use crate::level::Level;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single log call as handed over by the front end. Consumed once.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub logger_name: String,
    pub message: String,
    pub caller: Option<Caller>,
}

/// Source location of the log call, when the front end knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl Entry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Entry {
            timestamp: Utc::now(),
            level,
            logger_name: String::new(),
            message: message.into(),
            caller: None,
        }
    }

    pub fn logger(mut self, name: impl Into<String>) -> Self {
        self.logger_name = name.into();
        self
    }
}
