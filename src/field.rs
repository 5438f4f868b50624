use crate::sentry::stacktrace::TracedError;
use crate::sentry::user::User;
use crate::types::{HttpRequest, HttpResponse};
use backtrace::Backtrace;
use serde_json::Value;
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// A typed key/value pair attached to a log entry.
#[derive(Debug, Clone)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

/// Payload of a [`Field`]. Exactly one kind per field.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Str(String),
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Json(Value),
    Error(ErrorValue),
    Object(Object),
}

/// The closed set of structured sub-objects adapters know how to lift out of
/// a field. Anything else travels as [`FieldValue::Json`].
#[derive(Debug, Clone)]
pub enum Object {
    HttpRequest(Arc<HttpRequest>),
    HttpResponse(Arc<HttpResponse>),
    User(User),
}

impl Object {
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        match self {
            Object::HttpRequest(req) => serde_json::to_value(req.as_ref()),
            Object::HttpResponse(res) => serde_json::to_value(res.as_ref()),
            Object::User(user) => serde_json::to_value(user),
        }
    }
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Field {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn str(key: impl Into<String>, value: impl Into<String>) -> Self {
        Field::new(key, FieldValue::Str(value.into()))
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Field::new(key, FieldValue::Bool(value))
    }

    pub fn i64(key: impl Into<String>, value: i64) -> Self {
        Field::new(key, FieldValue::I64(value))
    }

    pub fn u64(key: impl Into<String>, value: u64) -> Self {
        Field::new(key, FieldValue::U64(value))
    }

    pub fn f64(key: impl Into<String>, value: f64) -> Self {
        Field::new(key, FieldValue::F64(value))
    }

    pub fn json(key: impl Into<String>, value: Value) -> Self {
        Field::new(key, FieldValue::Json(value))
    }

    pub fn error<E>(key: impl Into<String>, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Field::new(key, FieldValue::Error(ErrorValue::new(error)))
    }

    pub fn object(key: impl Into<String>, object: Object) -> Self {
        Field::new(key, FieldValue::Object(object))
    }

    pub fn http_request(key: impl Into<String>, request: HttpRequest) -> Self {
        Field::object(key, Object::HttpRequest(Arc::new(request)))
    }

    pub fn http_response(key: impl Into<String>, response: HttpResponse) -> Self {
        Field::object(key, Object::HttpResponse(Arc::new(response)))
    }
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Structured form used for event context.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        Ok(match self {
            FieldValue::Str(s) => Value::String(s.clone()),
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::I64(i) => Value::from(*i),
            FieldValue::U64(u) => Value::from(*u),
            FieldValue::F64(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Json(v) => v.clone(),
            FieldValue::Error(e) => Value::String(e.to_string()),
            FieldValue::Object(o) => o.to_json()?,
        })
    }
}

/// Default string rendering, used when a non-string payload becomes a tag.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::I64(i) => write!(f, "{}", i),
            FieldValue::U64(u) => write!(f, "{}", u),
            FieldValue::F64(v) => write!(f, "{}", v),
            FieldValue::Json(Value::String(s)) => f.write_str(s),
            FieldValue::Json(v) => write!(f, "{}", v),
            FieldValue::Error(e) => write!(f, "{}", e),
            FieldValue::Object(o) => match o.to_json() {
                Ok(v) => write!(f, "{}", v),
                Err(_) => write!(f, "{:?}", o),
            },
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::I64(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::I64(i as i64)
    }
}

impl From<u64> for FieldValue {
    fn from(u: u64) -> Self {
        FieldValue::U64(u)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::F64(v)
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Json(v)
    }
}

impl From<ErrorValue> for FieldValue {
    fn from(e: ErrorValue) -> Self {
        FieldValue::Error(e)
    }
}

impl From<Object> for FieldValue {
    fn from(o: Object) -> Self {
        FieldValue::Object(o)
    }
}

/// A shared error carried by a field, together with the name of its
/// concrete type (not recoverable from a trait object later on).
#[derive(Clone)]
pub struct ErrorValue {
    error: Arc<dyn StdError + Send + Sync + 'static>,
    type_name: Cow<'static, str>,
}

impl ErrorValue {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ErrorValue {
            error: Arc::new(error),
            type_name: Cow::Borrowed(std::any::type_name::<E>()),
        }
    }

    pub fn from_arc(
        error: Arc<dyn StdError + Send + Sync + 'static>,
        type_name: impl Into<Cow<'static, str>>,
    ) -> Self {
        ErrorValue {
            error,
            type_name: type_name.into(),
        }
    }

    pub fn get(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.error.as_ref()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.error, f)
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

/// Owned copy of a borrowed error and its `source()` chain.
///
/// Front ends such as `tracing` only lend errors for the duration of a
/// callback; this keeps the messages, the best-effort type names and the
/// causal links so the chain can still be walked afterwards. The stack
/// recorded by a [`TracedError`] survives the copy.
pub struct ErrorSnapshot {
    pub type_name: String,
    pub message: String,
    pub source: Option<Box<ErrorSnapshot>>,
    pub backtrace: Option<Backtrace>,
}

impl ErrorSnapshot {
    pub fn capture(error: &(dyn StdError + 'static)) -> Self {
        ErrorSnapshot {
            type_name: type_name_from_debug(error),
            message: error.to_string(),
            source: error.source().map(|src| Box::new(ErrorSnapshot::capture(src))),
            backtrace: error
                .downcast_ref::<TracedError>()
                .map(|traced| traced.backtrace().clone()),
        }
    }
}

impl fmt::Debug for ErrorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSnapshot")
            .field("type_name", &self.type_name)
            .field("message", &self.message)
            .field("source", &self.source)
            .field("traced", &self.backtrace.is_some())
            .finish()
    }
}

impl fmt::Display for ErrorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for ErrorSnapshot {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|s| s as &(dyn StdError + 'static))
    }
}

/// Best-effort type name of an error whose concrete type is erased: the
/// leading identifier of its `Debug` form, e.g. `Custom` for
/// `Custom { kind: Other, error: "x" }`.
pub fn type_name_from_debug(error: &dyn StdError) -> String {
    let debug = format!("{:?}", error);
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if name.is_empty() {
        "Error".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failed")]
    struct Outer {
        #[source]
        inner: std::io::Error,
    }

    #[test]
    fn tag_rendering_uses_plain_strings() {
        assert_eq!(FieldValue::from("x").to_string(), "x");
        assert_eq!(FieldValue::from(42i64).to_string(), "42");
        assert_eq!(FieldValue::Json(json!("quoted")).to_string(), "quoted");
        assert_eq!(FieldValue::Json(json!({"a": 1})).to_string(), r#"{"a":1}"#);
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(FieldValue::F64(f64::NAN).to_json().unwrap(), Value::Null);
        assert_eq!(FieldValue::F64(1.5).to_json().unwrap(), json!(1.5));
    }

    #[test]
    fn error_value_remembers_concrete_type() {
        let value = ErrorValue::new(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(value.type_name().starts_with("std::io::"));
        assert_eq!(value.to_string(), "disk");
    }

    #[test]
    fn snapshot_keeps_the_source_chain() {
        let err = Outer {
            inner: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let snap = ErrorSnapshot::capture(&err);
        assert_eq!(snap.type_name, "Outer");
        assert_eq!(snap.message, "outer failed");
        let src = snap.source().unwrap();
        assert_eq!(src.to_string(), "missing");
        assert!(snap.backtrace.is_none());
    }

    #[test]
    fn snapshot_keeps_the_traced_stack() {
        let traced = TracedError::wrap(std::io::Error::new(std::io::ErrorKind::Other, "x"), "y");
        let snap = ErrorSnapshot::capture(&traced);
        assert!(snap.backtrace.is_some());
        assert!(snap.source.as_ref().unwrap().backtrace.is_none());
    }
}
