//! HTTP request/response snapshots that can be attached to log entries.
//!
//! Both types marshal into structured context through `serde`, so when they
//! are logged under an ordinary key they show up as nested objects. Under the
//! `http_request` key the sentry adapter lifts a request into the event's
//! request interface instead.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Header or form values; a key may repeat.
pub type Values = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub proto: String,
    pub headers: Values,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<Values>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_form: Option<Values>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub remote_addr: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_uri: String,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        HttpRequest {
            method: method.into(),
            url: url.into(),
            proto: "HTTP/1.1".to_string(),
            ..Default::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = addr.into();
        self
    }

    /// Query string part of the URL, if any.
    pub fn query_string(&self) -> Option<&str> {
        self.url
            .split_once('?')
            .map(|(_, query)| query.split('#').next().unwrap_or(query))
            .filter(|query| !query.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HttpResponse {
    pub status: String,
    pub status_code: u16,
    pub proto: String,
    pub headers: Values,
    #[serde(rename = "http_request", skip_serializing_if = "Option::is_none")]
    pub request: Option<Arc<HttpRequest>>,
}

impl HttpResponse {
    pub fn new(status_code: u16, status: impl Into<String>) -> Self {
        HttpResponse {
            status: status.into(),
            status_code,
            proto: "HTTP/1.1".to_string(),
            ..Default::default()
        }
    }

    pub fn request(mut self, request: HttpRequest) -> Self {
        self.request = Some(Arc::new(request));
        self
    }
}
