use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors coming from the message bus.
///
/// None of them is fatal: the affected value simply keeps its previous content.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("The message bus is unavailable")]
    BusUnavailable(#[source] zbus::Error),
    #[error("{destination} refused the connection: {reason}")]
    ConnectionRefused { destination: String, reason: String },
    #[error("{method} timed out")]
    Timeout { method: &'static str },
    #[error("Malformed reply to {method}: {reason}")]
    MalformedReply { method: &'static str, reason: String },
    #[error("{method} failed")]
    Call {
        method: &'static str,
        #[source]
        source: zbus::Error,
    },
}

impl TransportError {
    const SERVICE_UNKNOWN: &'static str = "org.freedesktop.DBus.Error.ServiceUnknown";
    const NAME_HAS_NO_OWNER: &'static str = "org.freedesktop.DBus.Error.NameHasNoOwner";
    const NO_REPLY: &'static str = "org.freedesktop.DBus.Error.NoReply";
    const TIMEOUT: &'static str = "org.freedesktop.DBus.Error.Timeout";

    /// Sort a zbus error coming out of a method call into the right kind.
    pub fn from_call(destination: &str, method: &'static str, error: zbus::Error) -> Self {
        match error {
            zbus::Error::MethodError(ref name, ref description, _)
                if [Self::SERVICE_UNKNOWN, Self::NAME_HAS_NO_OWNER].contains(&name.as_str()) =>
            {
                Self::ConnectionRefused {
                    destination: destination.to_owned(),
                    reason: description.clone().unwrap_or_else(|| name.to_string()),
                }
            }
            zbus::Error::MethodError(ref name, _, _)
                if [Self::NO_REPLY, Self::TIMEOUT].contains(&name.as_str()) =>
            {
                Self::Timeout { method }
            }
            zbus::Error::Variant(e) => Self::MalformedReply {
                method,
                reason: e.to_string(),
            },
            zbus::Error::InputOutput(_) => Self::BusUnavailable(error),
            source => Self::Call { method, source },
        }
    }
}

/// Errors while reading provider descriptor files.
///
/// They only cause the offending file to be skipped.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Cannot read {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("Invalid {what} {value:?}: {reason}")]
    InvalidName {
        what: &'static str,
        value: String,
        reason: String,
    },
}
