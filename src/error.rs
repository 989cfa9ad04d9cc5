//! Error types for archive operations.
//!
//! Every fallible operation returns [`Result<T>`]. Errors carry the path,
//! entry name or codec status code that identifies the failure; messages
//! are only built when an error is displayed.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while opening or reading an archive.
#[derive(Debug, Error)]
pub enum Error {
    /// The archive file could not be opened.
    #[error("unable to open file: {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The central directory is missing, unreadable or truncated.
    #[error("unable to process file {}: {reason}", path.display())]
    Directory { path: PathBuf, reason: String },

    /// A stored entry name exceeds [`MAX_NAME_LEN`](crate::MAX_NAME_LEN).
    /// `name` is truncated to fit.
    #[error("unsupported path length for entry: {name}")]
    NameTooLong { name: String },

    #[error("no file found by the name of '{name}'")]
    EntryNotFound { name: String },

    #[error("cannot open file {name}: archive error {code}")]
    OpenEntry { name: String, code: i32 },

    #[error("unable to allocate {size} bytes to read file {name}")]
    Allocation { name: String, size: u64 },

    #[error("error reading file {name}: archive error {code}")]
    Read { name: String, code: i32 },

    #[error("zip archive has been destroyed")]
    UseAfterDestroy,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unrecoverable failure surfaced by the control loop.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("completion callback for read of '{name}' panicked: {message}")]
    CallbackPanicked { name: String, message: String },
}

impl FatalError {
    pub(crate) fn from_panic(name: String, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        FatalError::CallbackPanicked { name, message }
    }
}
