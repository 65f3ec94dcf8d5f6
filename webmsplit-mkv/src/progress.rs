//! Resumable results.
//!
//! Parsing a file that is still being written routinely runs out of bytes.
//! That outcome is a value, [`Progress::NeedMoreData`], not an error: the
//! caller retries once the source has grown, and nothing was mutated.

use crate::error::Result;

/// Outcome of an operation that may need more input.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress<T> {
    /// The operation completed.
    Ready(T),
    /// Not enough bytes yet. Retry after the source grows.
    NeedMoreData,
}

impl<T> Progress<T> {
    /// Check if the operation completed.
    pub fn is_ready(&self) -> bool {
        matches!(self, Progress::Ready(_))
    }

    /// Check if more data is needed.
    pub fn is_need_more_data(&self) -> bool {
        matches!(self, Progress::NeedMoreData)
    }

    /// Get the value, if ready.
    pub fn ready(self) -> Option<T> {
        match self {
            Progress::Ready(value) => Some(value),
            Progress::NeedMoreData => None,
        }
    }

    /// Map the ready value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Progress<U> {
        match self {
            Progress::Ready(value) => Progress::Ready(f(value)),
            Progress::NeedMoreData => Progress::NeedMoreData,
        }
    }
}

/// Turn `InsufficientData` errors into [`Progress::NeedMoreData`].
pub(crate) trait Transient<T> {
    fn transient(self) -> Result<Progress<T>>;
}

impl<T> Transient<T> for Result<T> {
    fn transient(self) -> Result<Progress<T>> {
        match self {
            Ok(value) => Ok(Progress::Ready(value)),
            Err(err) if err.is_insufficient_data() => {
                tracing::trace!(error = %err, "Waiting for more data");
                Ok(Progress::NeedMoreData)
            }
            Err(err) => Err(err),
        }
    }
}

/// Unwrap a [`Progress`], returning `Ok(NeedMoreData)` from the caller otherwise.
macro_rules! ready {
    ($e:expr) => {
        match $e {
            $crate::progress::Progress::Ready(value) => value,
            $crate::progress::Progress::NeedMoreData => {
                return Ok($crate::progress::Progress::NeedMoreData)
            }
        }
    };
}

pub(crate) use ready;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MkvError;

    fn halve(value: Progress<u32>) -> Result<Progress<u32>> {
        let v = ready!(value);
        Ok(Progress::Ready(v / 2))
    }

    #[test]
    fn test_ready_macro() {
        assert_eq!(halve(Progress::Ready(8)).unwrap(), Progress::Ready(4));
        assert!(halve(Progress::NeedMoreData).unwrap().is_need_more_data());
    }

    #[test]
    fn test_transient() {
        let short: Result<u8> = Err(MkvError::InsufficientData { offset: 0, needed: 2 });
        assert!(short.transient().unwrap().is_need_more_data());

        let bad: Result<u8> = Err(MkvError::InvalidVint { offset: 0 });
        assert!(bad.transient().is_err());

        let ok: Result<u8> = Ok(3);
        assert_eq!(ok.transient().unwrap().map(|v| v + 1).ready(), Some(4));
    }
}
