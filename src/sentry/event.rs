use crate::level::Level;
use crate::record::Entry;
use crate::sentry::classify::ClassifiedFields;
use crate::sentry::stacktrace::ExceptionRecord;
use crate::sentry::user::User;
use crate::types::HttpRequest;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

pub const DEFAULT_PLATFORM: &str = "rust";

/// Severity vocabulary of the event tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::Debug => Severity::Debug,
            Level::Info => Severity::Info,
            Level::Warn => Severity::Warning,
            Level::Error => Severity::Error,
            Level::DPanic | Level::Panic | Level::Fatal => Severity::Fatal,
        }
    }
}

/// Request interface of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Request {
    pub url: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_string: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl From<&HttpRequest> for Request {
    fn from(req: &HttpRequest) -> Self {
        let mut headers: BTreeMap<String, String> = req
            .headers
            .iter()
            .map(|(name, values)| (name.clone(), values.join(",")))
            .collect();
        if !req.host.is_empty() {
            headers
                .entry("Host".to_string())
                .or_insert_with(|| req.host.clone());
        }
        let mut env = BTreeMap::new();
        if !req.remote_addr.is_empty() {
            env.insert("REMOTE_ADDR".to_string(), req.remote_addr.clone());
        }
        Request {
            url: req.url.split('?').next().unwrap_or_default().to_string(),
            method: req.method.clone(),
            query_string: req.query_string().map(str::to_string),
            headers,
            env,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exceptions {
    pub values: Vec<ExceptionRecord>,
}

/// The record handed to the transport. Built fresh for every write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub level: Severity,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub logger: String,
    pub platform: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub culprit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(rename = "extra", skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<Exceptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Request>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl RemoteEvent {
    /// The single exception, if any.
    pub fn exception(&self) -> Option<&ExceptionRecord> {
        self.exception.as_ref().and_then(|e| e.values.first())
    }
}

/// Values applied when no field overrides them.
#[derive(Debug, Clone, Default)]
pub struct EventDefaults {
    pub server_name: Option<String>,
    pub project: Option<String>,
    pub environment: Option<String>,
    pub release: Option<String>,
}

/// Assemble the outbound event. Pure; performs no I/O.
pub fn build(
    entry: &Entry,
    classified: ClassifiedFields,
    exception: Option<ExceptionRecord>,
    defaults: &EventDefaults,
) -> RemoteEvent {
    let ClassifiedFields {
        attributes,
        request,
        user,
        tags,
        context,
        error: _,
    } = classified;

    let timestamp = attributes.timestamp.unwrap_or(entry.timestamp);

    RemoteEvent {
        event_id: attributes
            .event_id
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
        timestamp,
        level: Severity::from(entry.level),
        logger: attributes
            .logger
            .unwrap_or_else(|| entry.logger_name.clone()),
        platform: attributes
            .platform
            .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
        message: entry.message.clone(),
        culprit: attributes.culprit,
        server_name: attributes.server_name.or_else(|| defaults.server_name.clone()),
        project: attributes.project.or_else(|| defaults.project.clone()),
        environment: defaults.environment.clone(),
        release: defaults.release.clone(),
        tags: (!tags.is_empty()).then_some(tags),
        context: (!context.is_empty()).then_some(context),
        exception: exception.map(|record| Exceptions {
            values: vec![record],
        }),
        request: request.map(|req| Request::from(req.as_ref())),
        user,
    }
}
