use thiserror::Error;

use crate::store::StoreState;

/// A network record failed validation.
///
/// These are never auto-corrected: the command that produced the record is
/// aborted with the message.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Unknown security type {0:?} (expected \"open\" or \"wpa\")")]
    UnknownSecurity(String),

    #[error("Network {ssid:?} is open but carries a password")]
    CredentialOnOpen { ssid: String },

    #[error("Network has an empty SSID")]
    EmptySsid,

    #[error("Timestamp {field} = {value} is outside the valid range")]
    TimestampOutOfRange { field: &'static str, value: i64 },

    /// An entry of the persisted store has a missing field or a field of the
    /// wrong type.
    #[error("Malformed network entry #{index}: {source}")]
    Malformed {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of a store operation or of the backend behind it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("{operation} is not allowed while the store is {state}")]
    State {
        operation: &'static str,
        state: StoreState,
    },

    /// The source returned data we can not map unambiguously.
    #[error("Expected exactly one {field} for {value:?}, found {found}")]
    Ambiguous {
        field: &'static str,
        value: String,
        found: usize,
    },

    #[error("Unexpected output from {source_label}: {message}")]
    Parse {
        source_label: String,
        message: String,
    },

    #[error("{source_label} can not store {ssid:?}: {reason}")]
    Unsupported {
        source_label: String,
        ssid: String,
        reason: &'static str,
    },

    #[error("`{command}` exited with code {code}: {output}")]
    Command {
        command: String,
        code: i32,
        output: String,
    },

    #[error("NetworkManager D-Bus call failed: {0}")]
    DBus(#[from] zbus::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
