//! Matroska/WebM parser error types.
//!
//! Missing bytes are reported as [`MkvError::InsufficientData`] by the EBML
//! layer only. Everything above it turns that into
//! [`Progress::NeedMoreData`](crate::Progress::NeedMoreData).

use thiserror::Error;
use webmsplit_core::error::{ContainerError, ErrorKind, Status};

/// MKV-specific error types.
#[derive(Error, Debug)]
pub enum MkvError {
    /// The byte source does not yet hold the requested range.
    #[error("Insufficient data: need {needed} bytes at offset {offset}")]
    InsufficientData {
        /// Byte offset of the read.
        offset: u64,
        /// Number of bytes requested.
        needed: u64,
    },

    /// Invalid EBML header.
    #[error("Invalid EBML header: {0}")]
    InvalidEbmlHeader(String),

    /// Invalid element ID.
    #[error("Invalid element ID at offset {offset}")]
    InvalidElementId {
        /// Byte offset where the invalid ID was found.
        offset: u64,
    },

    /// Invalid element size.
    #[error("Invalid element size at offset {offset}: {message}")]
    InvalidElementSize {
        /// Byte offset where the invalid size was found.
        offset: u64,
        /// Description of the size error.
        message: String,
    },

    /// Invalid variable-length integer.
    #[error("Invalid VINT encoding at offset {offset}")]
    InvalidVint {
        /// Byte offset where the invalid VINT was found.
        offset: u64,
    },

    /// VINT overflow (value too large).
    #[error("VINT overflow: value exceeds maximum representable size")]
    VintOverflow,

    /// Missing required element.
    #[error("Missing required element: {0}")]
    MissingElement(String),

    /// Cluster timestamp goes backwards.
    #[error("Invalid timestamp at cluster offset {offset}")]
    InvalidTimestamp {
        /// Byte offset of the cluster with invalid timestamp.
        offset: u64,
    },

    /// Cluster without timestamp.
    #[error("Cluster missing timestamp at offset {offset}")]
    ClusterMissingTimestamp {
        /// Byte offset of the cluster missing a timestamp.
        offset: u64,
    },

    /// Invalid block structure.
    #[error("Invalid block structure at offset {offset}: {message}")]
    InvalidBlock {
        /// Byte offset of the block payload.
        offset: u64,
        /// Description of the block error.
        message: String,
    },

    /// Background cluster parsing stopped on malformed data. Clusters past
    /// the failure will never arrive.
    #[error("Cluster parsing stopped: {0}")]
    ParsingStopped(String),

    /// The container holds no track a stream can be built for.
    #[error("No playable tracks")]
    NoPlayableTracks,

    /// Caller contract violation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Sink too small for the block payload.
    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Payload size.
        needed: usize,
        /// Sink capacity.
        available: usize,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl MkvError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            MkvError::InsufficientData { .. } => ErrorKind::Transient,
            MkvError::InvalidArgument(_) => ErrorKind::Contract,
            MkvError::BufferTooSmall { .. } => ErrorKind::Resource,
            MkvError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::Structural,
        }
    }

    /// Check if this error only means the source has not grown far enough.
    #[must_use]
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, MkvError::InsufficientData { .. })
    }

    /// Status code for this error.
    #[must_use]
    pub fn status(&self) -> Status {
        self.kind().into()
    }
}

/// Result type for MKV operations.
pub type Result<T> = std::result::Result<T, MkvError>;

/// Convert MkvError to webmsplit_core::Error.
impl From<MkvError> for webmsplit_core::Error {
    fn from(err: MkvError) -> Self {
        match err {
            MkvError::Io(e) => webmsplit_core::Error::Io(e),
            MkvError::InsufficientData { .. } => webmsplit_core::Error::NeedMoreData,
            MkvError::InvalidArgument(msg) => webmsplit_core::Error::InvalidParameter(msg),
            MkvError::BufferTooSmall { needed, available } => {
                webmsplit_core::Error::BufferTooSmall { needed, available }
            }
            MkvError::InvalidEbmlHeader(msg) => {
                webmsplit_core::Error::Container(ContainerError::InvalidStructure(msg))
            }
            MkvError::MissingElement(name) => {
                webmsplit_core::Error::Container(ContainerError::MissingElement(name))
            }
            MkvError::InvalidElementSize { offset, message } => {
                webmsplit_core::Error::Container(ContainerError::InvalidSize { offset, message })
            }
            _ => webmsplit_core::Error::Container(ContainerError::Other(err.to_string())),
        }
    }
}
