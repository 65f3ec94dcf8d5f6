//! Error types shared by the webmsplit crates.
//!
//! Every failure falls into one [`ErrorKind`], which tells the caller how to
//! react: retry later, reject the container, fix the call, or grow a buffer.

use thiserror::Error;

/// Main error type for the webmsplit crates.
#[derive(Error, Debug)]
pub enum Error {
    /// Container structure errors.
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    /// I/O errors from the byte source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte source does not hold enough data yet.
    #[error("Need more data")]
    NeedMoreData,

    /// Invalid parameter provided by the caller.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Buffer too small for the payload.
    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Container format errors.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// Invalid or corrupted container structure.
    #[error("Invalid container structure: {0}")]
    InvalidStructure(String),

    /// Missing required element.
    #[error("Missing required element: {0}")]
    MissingElement(String),

    /// Invalid element size.
    #[error("Invalid element size at offset {offset}: {message}")]
    InvalidSize { offset: u64, message: String },

    /// Generic container error message.
    #[error("{0}")]
    Other(String),
}

/// How a failure should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Not enough bytes yet. Retry once the source has grown.
    Transient,
    /// The container is malformed and must be rejected.
    Structural,
    /// The caller broke an API contract.
    Contract,
    /// A caller-provided resource (usually a buffer) was too small.
    Resource,
    /// The byte source failed.
    Io,
}

/// Status codes surfaced to pipeline callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The operation completed.
    Ok,
    /// Retry later, not an error.
    NeedMoreData,
    /// No more samples before the stop position.
    EndOfStream,
    /// Fatal, the container is unusable.
    Malformed,
    /// Caller contract violation.
    InvalidArgument,
    /// Sink capacity smaller than the payload.
    BufferTooSmall,
    /// Byte source failure.
    Io,
}

impl From<ErrorKind> for Status {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Transient => Status::NeedMoreData,
            ErrorKind::Structural => Status::Malformed,
            ErrorKind::Contract => Status::InvalidArgument,
            ErrorKind::Resource => Status::BufferTooSmall,
            ErrorKind::Io => Status::Io,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NeedMoreData => ErrorKind::Transient,
            Error::Container(_) => ErrorKind::Structural,
            Error::InvalidParameter(_) => ErrorKind::Contract,
            Error::BufferTooSmall { .. } => ErrorKind::Resource,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Status code for this error.
    #[must_use]
    pub fn status(&self) -> Status {
        self.kind().into()
    }

    /// Check if retrying after more data arrives can succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidParameter("test parameter".into());
        assert_eq!(err.to_string(), "Invalid parameter: test parameter");
    }

    #[test]
    fn test_container_error_conversion() {
        let container_err = ContainerError::MissingElement("Tracks".into());
        let err: Error = container_err.into();
        assert!(matches!(err, Error::Container(ContainerError::MissingElement(_))));
    }

    #[test]
    fn test_kind_and_status() {
        assert_eq!(Error::NeedMoreData.status(), Status::NeedMoreData);
        assert!(Error::NeedMoreData.is_transient());

        let malformed = Error::Container(ContainerError::InvalidStructure("bad".into()));
        assert_eq!(malformed.kind(), ErrorKind::Structural);
        assert_eq!(malformed.status(), Status::Malformed);

        let small = Error::BufferTooSmall {
            needed: 10,
            available: 4,
        };
        assert_eq!(small.status(), Status::BufferTooSmall);
        assert_eq!(
            Error::InvalidParameter("mode".into()).status(),
            Status::InvalidArgument
        );
    }
}
