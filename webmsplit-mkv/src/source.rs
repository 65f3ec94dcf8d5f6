//! Random-access byte sources.
//!
//! The parser never blocks on I/O. A source reports how many bytes it holds
//! right now and fails reads beyond that with
//! [`MkvError::InsufficientData`], which callers treat as "retry later".

use crate::error::{MkvError, Result};
use parking_lot::{Mutex, RwLock};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Size information reported by a [`ByteSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLength {
    /// Final length, once known.
    pub total: Option<u64>,
    /// Bytes readable right now.
    pub available: u64,
}

impl SourceLength {
    /// Check if every byte of the source is readable.
    pub fn is_complete(&self) -> bool {
        self.total == Some(self.available)
    }
}

/// Random-access reader over container bytes.
///
/// Implementations must allow arbitrary re-reads of earlier ranges.
pub trait ByteSource: Send + Sync {
    /// Current length information.
    fn length(&self) -> Result<SourceLength>;

    /// Fill `buf` with the bytes at `offset`.
    ///
    /// Fails with [`MkvError::InsufficientData`] when the range extends past
    /// the available bytes.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Read `len` bytes at `offset` into a new vector.
    fn read_vec(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read(offset, &mut buf)?;
        Ok(buf)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Arc<S> {
    fn length(&self) -> Result<SourceLength> {
        (**self).length()
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read(offset, buf)
    }
}

fn check_range(offset: u64, len: usize, available: u64) -> Result<()> {
    let end = offset.checked_add(len as u64).ok_or(MkvError::InsufficientData {
        offset,
        needed: len as u64,
    })?;
    if end > available {
        return Err(MkvError::InsufficientData {
            offset,
            needed: len as u64,
        });
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Buffer {
    data: Vec<u8>,
    finished: bool,
}

/// Shared, growable in-memory source.
///
/// Clones share one buffer, so a producer can [`append`](Self::append) to one
/// handle while the parser reads from another.
#[derive(Debug, Clone, Default)]
pub struct BufferSource {
    inner: Arc<RwLock<Buffer>>,
}

impl BufferSource {
    /// Create an empty source that is still being written.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a complete source over `data`.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Buffer {
                data,
                finished: true,
            })),
        }
    }

    /// Append bytes to the end of the source.
    pub fn append(&self, bytes: &[u8]) {
        self.inner.write().data.extend_from_slice(bytes);
    }

    /// Mark the source complete; its total length becomes known.
    pub fn finish(&self) {
        self.inner.write().finished = true;
    }

    /// Bytes currently held.
    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    /// Check if no bytes are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if [`finish`](Self::finish) has been called.
    pub fn is_finished(&self) -> bool {
        self.inner.read().finished
    }
}

impl ByteSource for BufferSource {
    fn length(&self) -> Result<SourceLength> {
        let inner = self.inner.read();
        let available = inner.data.len() as u64;
        Ok(SourceLength {
            total: inner.finished.then_some(available),
            available,
        })
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let inner = self.inner.read();
        check_range(offset, buf.len(), inner.data.len() as u64)?;
        let start = offset as usize;
        buf.copy_from_slice(&inner.data[start..start + buf.len()]);
        Ok(())
    }
}

/// A complete file on disk.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    /// Open `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }
}

impl ByteSource for FileSource {
    fn length(&self) -> Result<SourceLength> {
        Ok(SourceLength {
            total: Some(self.len),
            available: self.len,
        })
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.len)?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_buffer_source_growth() {
        let source = BufferSource::new();
        let writer = source.clone();

        writer.append(&[1, 2, 3]);
        let len = source.length().unwrap();
        assert_eq!(len.available, 3);
        assert_eq!(len.total, None);
        assert!(!len.is_complete());

        let mut buf = [0u8; 4];
        let err = source.read(0, &mut buf).unwrap_err();
        assert!(err.is_insufficient_data());

        writer.append(&[4]);
        writer.finish();
        source.read(0, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
        assert!(source.length().unwrap().is_complete());
    }

    #[test]
    fn test_buffer_source_rereads() {
        let source = BufferSource::from_vec((0u8..32).collect());
        assert_eq!(source.read_vec(30, 2).unwrap(), vec![30, 31]);
        assert_eq!(source.read_vec(0, 2).unwrap(), vec![0, 1]);
        assert!(source.read_vec(31, 2).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"\x1A\x45\xDF\xA3webm").unwrap();
        file.flush().unwrap();

        let source = FileSource::open(file.path()).unwrap();
        let len = source.length().unwrap();
        assert_eq!(len.total, Some(8));
        assert_eq!(source.read_vec(4, 4).unwrap(), b"webm".to_vec());
        assert!(source.read_vec(6, 4).unwrap_err().is_insufficient_data());
    }
}
