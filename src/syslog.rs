//! System-log adapter.
//!
//! Entries are encoded as one JSON object per line and handed to a
//! [`SyslogWriter`] together with the priority derived from their level.
//! Talking to the daemon is the writer's business.

use crate::chain::FieldChain;
use crate::core::Core;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::level::{Level, LevelEnabler};
use crate::record::Entry;
use serde_json::{Map, Value};
use std::io;
use std::sync::Arc;

/// Syslog severities used by the adapter, as in `<syslog.h>`.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    LOG_CRIT = 2,
    LOG_ERR = 3,
    LOG_WARNING = 4,
    LOG_INFO = 6,
    LOG_DEBUG = 7,
}

impl From<Level> for Priority {
    fn from(level: Level) -> Self {
        match level {
            Level::Debug => Priority::LOG_DEBUG,
            Level::Info => Priority::LOG_INFO,
            Level::Warn => Priority::LOG_WARNING,
            Level::Error => Priority::LOG_ERR,
            Level::DPanic | Level::Panic | Level::Fatal => Priority::LOG_CRIT,
        }
    }
}

/// Priority for a raw numeric level; unknown levels are an error.
pub fn priority_for_raw(raw: i8) -> Result<Priority> {
    Level::try_from(raw).map(Priority::from)
}

/// Destination of encoded syslog messages.
pub trait SyslogWriter: Send + Sync {
    fn write(&self, priority: Priority, message: &str) -> io::Result<()>;

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// [`Core`] writing entries to a [`SyslogWriter`].
#[derive(Clone)]
pub struct SyslogCore {
    enabler: Arc<dyn LevelEnabler>,
    writer: Arc<dyn SyslogWriter>,
    fields: FieldChain,
}

impl SyslogCore {
    pub fn new<E, W>(enabler: E, writer: W) -> Self
    where
        E: LevelEnabler + 'static,
        W: SyslogWriter + 'static,
    {
        SyslogCore {
            enabler: Arc::new(enabler),
            writer: Arc::new(writer),
            fields: FieldChain::new(),
        }
    }

    /// One JSON object: entry metadata first, then attached fields, then
    /// call fields. Later fields overwrite earlier ones with the same key.
    pub fn encode(&self, entry: &Entry, fields: &[Field]) -> Result<String> {
        let mut object = Map::new();
        object.insert("level".to_string(), Value::from(entry.level.as_str()));
        object.insert("ts".to_string(), Value::from(entry.timestamp.to_rfc3339()));
        if !entry.logger_name.is_empty() {
            object.insert("logger".to_string(), Value::from(entry.logger_name.as_str()));
        }
        if let Some(caller) = &entry.caller {
            if let (Some(file), Some(line)) = (&caller.file, caller.line) {
                object.insert("caller".to_string(), Value::from(format!("{}:{}", file, line)));
            }
        }
        object.insert("msg".to_string(), Value::from(entry.message.as_str()));

        for field in self.fields.iter().chain(fields) {
            let value = field.value.to_json().map_err(|source| Error::Encode {
                key: field.key.clone(),
                source,
            })?;
            object.insert(field.key.clone(), value);
        }
        Ok(Value::Object(object).to_string())
    }
}

impl Core for SyslogCore {
    fn enabled(&self, level: Level) -> bool {
        self.enabler.enabled(level)
    }

    fn with(&self, fields: &[Field]) -> Box<dyn Core> {
        Box::new(SyslogCore {
            fields: self.fields.push(fields),
            ..self.clone()
        })
    }

    fn write(&self, entry: &Entry, fields: &[Field]) -> Result<()> {
        let message = self.encode(entry, fields)?;
        self.writer
            .write(Priority::from(entry.level), &message)
            .map_err(Error::Syslog)
    }

    fn sync(&self) -> Result<()> {
        self.writer.flush().map_err(Error::Syslog)
    }
}
