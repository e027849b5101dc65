use std::io;
use thiserror::Error;

/// type alias for all operations on the school store that could fail with a [`SchoolError`]
pub type Result<T> = std::result::Result<T, SchoolError>;

/// boxed lower level error carried by [`SchoolError::Store`]
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The Error variants used throughout the school store.
///
/// `NotFound`, `Conflict`, `Duplicate` and `BadRequest` are expected, user facing outcomes.
/// The remaining variants describe failures of the remote store, the local machine or the
/// configuration.
#[derive(Error, Debug)]
pub enum SchoolError {
    /// the target document or entity does not exist
    #[error("{0}")]
    NotFound(String),

    /// the entity being created already exists
    #[error("{0}")]
    Conflict(String),

    /// a keyed record being inserted already exists within its document
    #[error("{0}")]
    Duplicate(String),

    /// the request was invalid
    #[error("{0}")]
    BadRequest(String),

    /// a remote I/O or protocol failure, including connection and login failures
    #[error("store error: {context}: {source}")]
    Store {
        /// what the store was doing when it failed
        context: String,
        /// the underlying cause
        #[source]
        source: BoxedCause,
    },

    /// a bounded wait on the remote store was exceeded
    #[error("timed out: {0}")]
    Timeout(String),

    /// stored bytes are not valid JSON for the expected document shape
    #[error("could not decode document {path}: {source}")]
    Decode {
        /// remote path of the document
        path: String,
        /// the serde error
        #[source]
        source: serde_json::Error,
    },

    /// required configuration is missing or invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// local I/O errors (sockets, receipt scratch area)
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// serialization errors on the wire protocol
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// an error response returned by a server, re-thrown on the client side
    #[error("server returned {code}: {detail}")]
    Protocol {
        /// http-like status code
        code: u16,
        /// human readable reason
        detail: String,
    },
}

impl SchoolError {
    /// builds a [`SchoolError::Store`] from any lower level error
    pub fn store<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxedCause>,
    {
        SchoolError::Store {
            context: context.into(),
            source: source.into(),
        }
    }

    /// the http-like status code used when this error is reported in a response
    pub fn status_code(&self) -> u16 {
        match self {
            SchoolError::BadRequest(_) => 400,
            SchoolError::NotFound(_) => 404,
            SchoolError::Conflict(_) | SchoolError::Duplicate(_) => 409,
            SchoolError::Timeout(_) => 504,
            SchoolError::Protocol { code, .. } => *code,
            _ => 500,
        }
    }
}

impl From<sled::Error> for SchoolError {
    fn from(e: sled::Error) -> Self {
        SchoolError::store("sled", e)
    }
}
