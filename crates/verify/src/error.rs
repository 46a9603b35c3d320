//! Verification Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use exn::ResultExt;
use spotcheck_storage::error::Result as StorageResult;

/// A verification error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for verification operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong, in terms of what the operator should do about it.
///
/// Only [`Storage`](Self::Storage) and [`Io`](Self::Io) failures may be
/// transient; retrying anything else gives the same answer.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A bucket, object, configuration entry or resume record is missing, or
    /// there are not enough objects to take the requested sample.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Something exists but breaks a rule: a stale backup, a checksum
    /// mismatch, a key that can't be stored locally.
    #[display("not valid: {_0}")]
    NotValid(#[error(not(source))] String),
    /// Freshness could not be determined at all.
    #[display("validation failed: {_0}")]
    Validation(#[error(not(source))] String),
    /// The object store failed in a way that may clear up on its own.
    #[display("storage error: {_0}")]
    Storage(#[error(not(source))] String),
    /// The object store refused the request and will keep refusing it (bad
    /// credentials, missing permissions, an unacceptable key).
    #[display("storage refused request: {_0}")]
    Refused(#[error(not(source))] String),
    /// Local filesystem failure.
    #[display("I/O error: {_0}")]
    Io(#[error(not(source))] String),
    /// The resume file could not be read, written or removed.
    #[display("resume state error: {_0}")]
    Resume(#[error(not(source))] String),
    /// Every allowed attempt at downloading an object failed.
    #[display("gave up downloading `{key}` from bucket `{bucket}` after {attempts} attempts")]
    RetriesExhausted { bucket: String, key: String, attempts: u32 },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }
}

/// Lift storage errors into this crate, keeping the storage error as the
/// cause. Missing buckets and objects become [`ErrorKind::NotFound`],
/// transient failures [`ErrorKind::Storage`], and the rest
/// [`ErrorKind::Refused`].
pub(crate) trait StorageResultExt<T> {
    fn or_storage<F: FnOnce() -> String>(self, context: F) -> Result<T>;
}
impl<T> StorageResultExt<T> for StorageResult<T> {
    fn or_storage<F: FnOnce() -> String>(self, context: F) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(e) if e.is_not_found() => Err(e).or_raise(|| ErrorKind::NotFound(context())),
            Err(e) if e.is_retryable() => Err(e).or_raise(|| ErrorKind::Storage(context())),
            Err(e) => Err(e).or_raise(|| ErrorKind::Refused(context())),
        }
    }
}
