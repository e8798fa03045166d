//! Error types for state operations.

use std::io;
use std::path::PathBuf;

use tally_json::{JsonError, JsonType};
use thiserror::Error;

use crate::handle::ValueId;
use crate::node::Variant;

/// Errors returned by value mutation, decoding, registration and persistence.
#[derive(Debug, Error)]
pub enum StateError {
    /// The JSON shape cannot be decoded into the target variant.
    #[error("invalid JSON type {found}: expected {}{}", join(.expected), conversions(.convertible))]
    InvalidJsonType {
        found: JsonType,
        expected: Vec<JsonType>,
        /// Additional shapes accepted through coercion.
        convertible: Vec<JsonType>,
    },

    /// The JSON shape was acceptable but its content failed validation.
    #[error("invalid JSON value {value}: {reason}")]
    InvalidJsonValue { value: String, reason: String },

    /// Value not in the enum's allowed set (compared case-insensitively).
    #[error("invalid enum {value:?}, not in {allowed:?}")]
    InvalidEnum { value: String, allowed: Vec<String> },

    /// Strict object decode found missing and/or unexpected keys.
    #[error("object key mismatch setting {object}: missing keys {missing:?}, extra keys {extra:?}")]
    ObjectKeyMismatch {
        object: String,
        missing: Vec<String>,
        extra: Vec<String>,
    },

    /// The container has no element schema to build new elements from.
    #[error("no initializer for elements of {path:?}")]
    NoInitializer { path: String },

    /// Non-identity hashes need a caller-supplied key.
    #[error("key is missing")]
    NoKey,

    /// A top-level name is already registered.
    #[error("existing key in root: {0:?}")]
    ExistingKey(String),

    /// The handle does not refer to a live value (never created, or released
    /// when its container cleared or replaced it).
    #[error("unknown value {0:?}")]
    UnknownValue(ValueId),

    /// A typed accessor was used on a value of a different variant.
    #[error("value at {path:?} is {found}, not {expected}")]
    VariantMismatch {
        path: String,
        expected: Variant,
        found: Variant,
    },

    /// JSON text could not be decoded.
    #[error("JSON decode error: {0}")]
    Json(#[from] JsonError),

    /// Filesystem error, with the path involved.
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A hash key that cannot name a file inside its backing directory.
    #[error("hash key {0:?} cannot be used as a file name")]
    UnsafeKey(String),

    /// Invalid store configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid state definition document.
    #[error("state definition error: {0}")]
    Definition(String),
}

impl StateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn wrong_type(
        json: &tally_json::Json,
        expected: &[JsonType],
        convertible: &[JsonType],
    ) -> Self {
        Self::InvalidJsonType {
            found: json.json_type(),
            expected: expected.to_vec(),
            convertible: convertible.to_vec(),
        }
    }

    pub(crate) fn invalid_value(value: &tally_json::Json, reason: impl ToString) -> Self {
        Self::InvalidJsonValue {
            value: value.to_json(false),
            reason: reason.to_string(),
        }
    }
}

fn join(types: &[JsonType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn conversions(types: &[JsonType]) -> String {
    if types.is_empty() {
        String::new()
    } else {
        format!(" (can convert from {})", join(types))
    }
}

/// Result alias for state operations.
pub type StateResult<T> = Result<T, StateError>;
