//! Record-level error kinds.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors reported synchronously by record creation and mutation.
///
/// All variants describe caller mistakes; none of them are transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Attribute name is empty.
    InvalidAttributeName(String),
    /// Write to the identity attribute after creation.
    ProtectedFieldWrite(String),
    /// Attribute is outside the schema allow-list.
    UnknownAttribute { schema: String, name: String },
    /// Identity value is neither an integer nor a non-empty string.
    InvalidIdentity(String),
    /// Attribute source was not a JSON object.
    ExpectedObject(&'static str),
    /// Value could not be converted through `serde_json`.
    Serialization(String),
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAttributeName(name) => {
                write!(f, "attribute name must be a non-empty string, got `{name}`")
            }
            Self::ProtectedFieldWrite(name) => {
                write!(f, "attribute `{name}` is protected and cannot be written")
            }
            Self::UnknownAttribute { schema, name } => {
                write!(f, "attribute `{name}` is not declared by schema `{schema}`")
            }
            Self::InvalidIdentity(value) => {
                write!(f, "identity must be an integer or non-empty string, got {value}")
            }
            Self::ExpectedObject(kind) => write!(f, "expected a JSON object, got {kind}"),
            Self::Serialization(message) => write!(f, "attribute conversion failed: {message}"),
        }
    }
}

impl Error for RecordError {}
