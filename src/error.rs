use crate::dsn::DsnError;
use crate::transport::DeliveryError;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the adapters to the logging front end.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A level that does not belong to the seven known severities.
    #[error("unknown log level: {0}")]
    UnknownLevel(String),

    #[error("unknown deployment environment: {0}")]
    UnknownEnvironment(String),

    /// A field payload could not be marshalled into event context.
    #[error("failed to encode field '{key}'")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The transport reported a failed delivery while the caller waited on it.
    #[error("event delivery failed")]
    Delivery(#[from] DeliveryError),

    #[error("transport is closed")]
    TransportClosed,

    #[error("flush did not complete within {0:?}")]
    FlushTimeout(Duration),

    #[error(transparent)]
    Dsn(#[from] DsnError),

    #[error("syslog write failed")]
    Syslog(#[source] std::io::Error),

    #[error("failed to install the global subscriber")]
    SubscriberInit(#[from] tracing::subscriber::SetGlobalDefaultError),
}
