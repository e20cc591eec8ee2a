// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache operations.

use std::fmt;

use strata_scope::DirectivesError;

type Cause = Box<dyn std::error::Error + Send + Sync>;

/// The category of a cache [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The cache was wired incorrectly, for example with the same store at both levels.
    Configuration,
    /// A backing store failed to serve an operation.
    Tier,
    /// A caller broke the usage protocol, for example by publishing without a subscription.
    Protocol,
    /// A notification could not be delivered.
    Notification,
    /// A value or message could not be serialized or deserialized.
    Serialization,
    /// A cache directives value could not be parsed.
    InvalidDirectives,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configuration => "invalid cache configuration",
            Self::Tier => "cache tier operation failed",
            Self::Protocol => "cache protocol violation",
            Self::Notification => "cache notification failed",
            Self::Serialization => "cache serialization failed",
            Self::InvalidDirectives => "invalid cache directives",
        })
    }
}

/// An error from a cache operation.
///
/// The error is opaque apart from its [`ErrorKind`]. Use
/// [`std::error::Error::source()`] to reach the underlying cause.
///
/// # Example
///
/// ```
/// use strata_tier::{Error, ErrorKind};
///
/// let error = Error::tier("connection reset");
/// assert_eq!(error.kind(), ErrorKind::Tier);
/// ```
#[ohno::error]
#[display("{kind}")]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Creates a [`ErrorKind::Configuration`] error.
    pub fn configuration(cause: impl Into<Cause>) -> Self {
        Self::caused_by(ErrorKind::Configuration, cause)
    }

    /// Creates a [`ErrorKind::Tier`] error.
    ///
    /// This is the constructor backing stores use to report their own failures.
    pub fn tier(cause: impl Into<Cause>) -> Self {
        Self::caused_by(ErrorKind::Tier, cause)
    }

    /// Creates a [`ErrorKind::Protocol`] error.
    pub fn protocol(cause: impl Into<Cause>) -> Self {
        Self::caused_by(ErrorKind::Protocol, cause)
    }

    /// Creates a [`ErrorKind::Notification`] error.
    pub fn notification(cause: impl Into<Cause>) -> Self {
        Self::caused_by(ErrorKind::Notification, cause)
    }

    /// Creates a [`ErrorKind::Serialization`] error.
    pub fn serialization(cause: impl Into<Cause>) -> Self {
        Self::caused_by(ErrorKind::Serialization, cause)
    }
}

impl From<DirectivesError> for Error {
    fn from(error: DirectivesError) -> Self {
        Self::caused_by(ErrorKind::InvalidDirectives, error)
    }
}

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
