//! Routing of fields into event attributes, tags, context and carried values.

use crate::error::{Error, Result};
use crate::field::{ErrorValue, Field, FieldValue, Object};
use crate::sentry::keys::*;
use crate::sentry::user::User;
use crate::types::HttpRequest;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::Arc;

/// Reserved attributes of an event. `None` means "not set by a field".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub event_id: Option<String>,
    pub project: Option<String>,
    pub platform: Option<String>,
    pub culprit: Option<String>,
    pub server_name: Option<String>,
    pub logger: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Attributes {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            EVENT_ID_KEY => Some(&mut self.event_id),
            PROJECT_KEY => Some(&mut self.project),
            PLATFORM_KEY => Some(&mut self.platform),
            CULPRIT_KEY => Some(&mut self.culprit),
            SERVER_NAME_KEY => Some(&mut self.server_name),
            LOGGER_KEY => Some(&mut self.logger),
            _ => None,
        }
    }
}

/// Everything extracted from the fields of one write call.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedFields {
    pub attributes: Attributes,
    pub request: Option<Arc<HttpRequest>>,
    pub user: Option<User>,
    pub tags: BTreeMap<String, String>,
    pub context: BTreeMap<String, Value>,
    pub error: Option<ErrorValue>,
}

impl ClassifiedFields {
    /// Tag when the key carries the tag prefix, context otherwise.
    fn add_free_form(&mut self, field: &Field) -> Result<()> {
        match field.key.strip_prefix(TAG_PREFIX) {
            Some(name) => {
                self.tags.insert(name.to_string(), field.value.to_string());
            }
            None => {
                let value = field.value.to_json().map_err(|source| Error::Encode {
                    key: field.key.clone(),
                    source,
                })?;
                self.context.insert(field.key.clone(), value);
            }
        }
        Ok(())
    }
}

/// Route a single field into `acc`.
///
/// Returns `ControlFlow::Break` when the field is the skip sentinel; the
/// caller must then drop the whole entry.
pub fn classify(field: &Field, acc: &mut ClassifiedFields) -> Result<ControlFlow<()>> {
    match (field.key.as_str(), &field.value) {
        (SKIP_KEY, _) => return Ok(ControlFlow::Break(())),
        (ERROR_KEY, FieldValue::Error(err)) => acc.error = Some(err.clone()),
        (HTTP_REQUEST_KEY, FieldValue::Object(Object::HttpRequest(req))) => {
            acc.request = Some(Arc::clone(req))
        }
        (USER_KEY, FieldValue::Object(Object::User(user))) => acc.user = Some(user.clone()),
        (TIMESTAMP_KEY, FieldValue::Str(s)) => match DateTime::parse_from_rfc3339(s) {
            Ok(ts) => acc.attributes.timestamp = Some(ts.with_timezone(&Utc)),
            Err(_) => acc.add_free_form(field)?,
        },
        (key, FieldValue::Str(s)) => match acc.attributes.slot(key) {
            Some(slot) => *slot = Some(s.clone()),
            None => acc.add_free_form(field)?,
        },
        _ => acc.add_free_form(field)?,
    }
    Ok(ControlFlow::Continue(()))
}

/// Outcome of folding a field list.
#[derive(Debug)]
pub enum Accumulated {
    Fields(ClassifiedFields),
    Skipped,
}

/// Classify `base` fields, then `call` fields, in order. Later fields win
/// over earlier ones for the same destination. Stops at the first sentinel.
pub fn accumulate<'a, B>(base: B, call: &'a [Field]) -> Result<Accumulated>
where
    B: IntoIterator<Item = &'a Field>,
{
    let mut acc = ClassifiedFields::default();
    for field in base.into_iter().chain(call) {
        if classify(field, &mut acc)?.is_break() {
            return Ok(Accumulated::Skipped);
        }
    }
    Ok(Accumulated::Fields(acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentry::user::user_field;
    use serde_json::json;
    use std::cell::Cell;

    fn fields(base: &[Field], call: &[Field]) -> ClassifiedFields {
        match accumulate(base, call).unwrap() {
            Accumulated::Fields(acc) => acc,
            Accumulated::Skipped => panic!("unexpected skip"),
        }
    }

    #[test]
    fn reserved_string_keys_fill_attributes() {
        let acc = fields(
            &[],
            &[
                Field::str(EVENT_ID_KEY, "abc"),
                Field::str(PROJECT_KEY, "7"),
                Field::str(PLATFORM_KEY, "other"),
                Field::str(CULPRIT_KEY, "handler"),
                Field::str(SERVER_NAME_KEY, "host1"),
            ],
        );
        assert_eq!(acc.attributes.event_id.as_deref(), Some("abc"));
        assert_eq!(acc.attributes.project.as_deref(), Some("7"));
        assert_eq!(acc.attributes.platform.as_deref(), Some("other"));
        assert_eq!(acc.attributes.culprit.as_deref(), Some("handler"));
        assert_eq!(acc.attributes.server_name.as_deref(), Some("host1"));
        assert!(acc.context.is_empty());
    }

    #[test]
    fn timestamps_must_be_rfc3339() {
        let acc = fields(&[], &[Field::str(TIMESTAMP_KEY, "2021-06-01T10:00:00+02:00")]);
        assert_eq!(
            acc.attributes.timestamp.map(|ts| ts.to_rfc3339()).as_deref(),
            Some("2021-06-01T08:00:00+00:00")
        );
        assert!(acc.context.is_empty());

        let acc = fields(&[], &[Field::str(TIMESTAMP_KEY, "yesterday")]);
        assert_eq!(acc.attributes.timestamp, None);
        assert_eq!(acc.context[TIMESTAMP_KEY], json!("yesterday"));
    }

    #[test]
    fn non_string_reserved_payload_falls_back_to_context() {
        let acc = fields(&[], &[Field::i64(SERVER_NAME_KEY, 5)]);
        assert_eq!(acc.attributes.server_name, None);
        assert_eq!(acc.context[SERVER_NAME_KEY], json!(5));
    }

    #[test]
    fn prefixed_keys_become_tags() {
        let acc = fields(&[], &[Field::str("#team", "infra"), Field::i64("#shard", 3)]);
        assert_eq!(acc.tags["team"], "infra");
        assert_eq!(acc.tags["shard"], "3");
        assert!(acc.context.is_empty());
    }

    #[test]
    fn plain_keys_never_become_tags() {
        let acc = fields(&[], &[Field::str("team", "infra")]);
        assert!(acc.tags.is_empty());
        assert_eq!(acc.context["team"], json!("infra"));
    }

    #[test]
    fn error_key_requires_an_error_payload() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let acc = fields(&[], &[Field::error(ERROR_KEY, io)]);
        assert_eq!(acc.error.unwrap().to_string(), "boom");

        let acc = fields(&[], &[Field::str(ERROR_KEY, "just text")]);
        assert!(acc.error.is_none());
        assert_eq!(acc.context[ERROR_KEY], json!("just text"));
    }

    #[test]
    fn errors_under_other_keys_are_context() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let acc = fields(&[], &[Field::error("cause", io)]);
        assert!(acc.error.is_none());
        assert_eq!(acc.context["cause"], json!("boom"));
    }

    #[test]
    fn request_and_user_are_lifted() {
        let acc = fields(
            &[],
            &[
                Field::http_request(HTTP_REQUEST_KEY, HttpRequest::new("GET", "/")),
                user_field(User::with_id("u1")),
            ],
        );
        assert_eq!(acc.request.unwrap().method, "GET");
        assert_eq!(acc.user.unwrap().id, "u1");
        assert!(acc.context.is_empty());
    }

    #[test]
    fn unrecognized_shapes_under_carrier_keys_are_context() {
        let acc = fields(
            &[],
            &[
                Field::http_response(
                    HTTP_REQUEST_KEY,
                    crate::types::HttpResponse::new(200, "200 OK"),
                ),
                Field::json(USER_KEY, json!({"id": "raw"})),
            ],
        );
        assert!(acc.request.is_none());
        assert!(acc.user.is_none());
        assert_eq!(acc.context[HTTP_REQUEST_KEY]["status_code"], json!(200));
        assert_eq!(acc.context[USER_KEY], json!({"id": "raw"}));
    }

    #[test]
    fn call_fields_override_base_fields() {
        let acc = fields(
            &[Field::str(SERVER_NAME_KEY, "a"), Field::str("#env", "x"), Field::i64("n", 1)],
            &[Field::str(SERVER_NAME_KEY, "b"), Field::str("#env", "y"), Field::i64("n", 2)],
        );
        assert_eq!(acc.attributes.server_name.as_deref(), Some("b"));
        assert_eq!(acc.tags["env"], "y");
        assert_eq!(acc.context["n"], json!(2));
    }

    #[test]
    fn sentinel_stops_processing_immediately() {
        let pulled = Cell::new(0);
        let base = vec![Field::str("a", "1"), skip(), Field::str("c", "3")];
        let counted = base.iter().inspect(|_| pulled.set(pulled.get() + 1));

        let out = accumulate(counted, &[Field::str(SERVER_NAME_KEY, "host1")]).unwrap();
        assert!(matches!(out, Accumulated::Skipped));
        assert_eq!(pulled.get(), 2);
    }
}
