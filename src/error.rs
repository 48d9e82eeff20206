use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Error type returned by hook methods implemented on records.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to convert between a native field value and a [`Value`](crate::Value).
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid boolean '{0}'")]
    ParseBool(String),

    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),

    #[error(transparent)]
    ParseFloat(#[from] std::num::ParseFloatError),

    #[error(transparent)]
    Duration(#[from] humantime::DurationError),

    #[error(transparent)]
    Time(#[from] chrono::ParseError),

    #[error("Cannot unmarshal '{text}': {reason}")]
    CannotUnmarshal { text: String, reason: String },

    #[error("Expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Value {value} is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },

    #[error("Invalid map entry '{0}' (expected key and value)")]
    InvalidMapEntry(String),

    #[error("Malformed list: {0}")]
    Csv(String),

    #[error("{key}: {source}")]
    Nested {
        key: String,
        source: Box<CodecError>,
    },
}

impl CodecError {
    pub fn mismatch(expected: &'static str, found: &crate::Value) -> Self {
        CodecError::TypeMismatch {
            expected,
            found: found.type_name(),
        }
    }
}

/// Where a value being assigned to a field came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Flag,
    Env(String),
    File,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Flag => f.write_str("command line"),
            Origin::Env(var) => write!(f, "environment variable {var}"),
            Origin::File => f.write_str("config file"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CfgError {
    #[error("Duplicate option name '{0}'")]
    DuplicateName(String),

    #[error("Unknown tag flag '{flag}' on field '{field}'")]
    UnknownTagFlag { field: String, flag: String },

    #[error("Invalid separators '{separators}' on field '{field}' (expected 1 or 2 characters)")]
    InvalidSeparators { field: String, separators: String },

    #[error("Invalid value for '{key}' from {origin}: {source}")]
    Codec {
        key: String,
        origin: Origin,
        source: CodecError,
    },

    #[error("Field '{0}' disappeared while assigning values")]
    FieldNotFound(String),

    #[error(transparent)]
    Flags(#[from] clap::Error),

    #[error("Cannot read environment variable {var}: {reason}")]
    Env { var: String, reason: String },

    #[error("Failed to access {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid {format} data: {reason}")]
    Store { format: &'static str, reason: String },

    #[error(transparent)]
    Init(BoxError),

    #[error(transparent)]
    Hook(BoxError),
}
