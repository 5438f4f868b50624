//! Field keys with a special meaning to the sentry adapter.

use crate::field::Field;

/// Keys starting with this prefix become event tags, prefix stripped.
pub const TAG_PREFIX: &str = "#";

pub const EVENT_ID_KEY: &str = "event_id";
pub const PROJECT_KEY: &str = "project";
pub const TIMESTAMP_KEY: &str = "timestamp";
pub const LOGGER_KEY: &str = "logger";
pub const PLATFORM_KEY: &str = "platform";
pub const CULPRIT_KEY: &str = "culprit";
pub const SERVER_NAME_KEY: &str = "server_name";
pub const ERROR_KEY: &str = "error";
pub const HTTP_REQUEST_KEY: &str = "http_request";
pub const USER_KEY: &str = "user";

/// Sentinel key: an entry carrying it is not reported at all.
pub const SKIP_KEY: &str = "_sinkext_skip";

/// Field telling the sentry adapter to drop the entry.
pub fn skip() -> Field {
    Field::bool(SKIP_KEY, true)
}

/// Field carrying `name` as a tag.
pub fn tag(name: &str, value: impl Into<String>) -> Field {
    Field::str(format!("{}{}", TAG_PREFIX, name), value)
}
