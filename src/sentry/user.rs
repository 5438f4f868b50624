use crate::field::{Field, Object};
use crate::sentry::keys::USER_KEY;
use serde::Serialize;

/// The user affected by an event.
///
/// Logged under the `user` key (see [`user_field`]) it becomes the event's
/// user interface; under any other key it is marshalled into context with
/// empty attributes left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct User {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip_address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
}

impl User {
    pub fn with_id(id: impl Into<String>) -> Self {
        User {
            id: id.into(),
            ..Default::default()
        }
    }
}

pub fn user_field(user: User) -> Field {
    Field::object(USER_KEY, Object::User(user))
}
