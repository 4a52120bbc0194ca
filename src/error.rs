//! Error types for the public surface of the crate.
//!
//! Internally everything is an `anyhow::Error` (`Res<T>`). At the boundary, where a command or the
//! HTTP trigger hands a result back to a user, the error is tagged with an `ErrorType` so that the
//! caller can decide how to report it (an exit code, an HTTP status).

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// Internal result type.
pub(crate) type Res<T> = std::result::Result<T, anyhow::Error>;

/// Public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The broad category of an error.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Missing or invalid configuration, credentials or document id.
    Config,
    /// The OAuth flow or a token refresh failed.
    Auth,
    /// There is no predecessor sheet to roll forward from.
    NotFound,
    /// The spreadsheet service could not be reached or rejected a request.
    Remote,
    /// The new sheet was created but not fully populated.
    PartialWrite,
    /// The caller sent something we cannot use, e.g. a malformed date.
    Request,
    #[default]
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

impl ErrorType {
    /// The HTTP status code used when an error of this type reaches the trigger surface.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorType::NotFound | ErrorType::Request => 400,
            ErrorType::Config
            | ErrorType::Auth
            | ErrorType::Remote
            | ErrorType::PartialWrite
            | ErrorType::Internal => 500,
        }
    }
}

/// The public error type. It wraps an `anyhow::Error` and remembers what kind of failure it was.
pub struct Error {
    error_type: ErrorType,
    inner: anyhow::Error,
}

impl Error {
    pub fn new(error_type: ErrorType, inner: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            inner: inner.into(),
        }
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // The alternate form prints the whole context chain on one line.
        write!(f, "{:#}", self.inner)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.error_type, self.inner)
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::new(ErrorType::Internal, value)
    }
}

/// Converts an internal `Res<T>` into a public `Result<T>` with the given `ErrorType`.
pub trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T> IntoResult<T> for Res<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}
