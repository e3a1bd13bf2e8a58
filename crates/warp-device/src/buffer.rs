//! Shared host buffers that device copies write into

use parking_lot::Mutex;
use std::sync::Arc;

/// A host allocation shared between the caller and device copy operations
///
/// Cloning is cheap and yields another handle to the same bytes. Each
/// device-to-host copy writes a disjoint sub-range.
#[derive(Debug, Clone)]
pub struct HostBuffer {
    data: Arc<Mutex<Vec<u8>>>,
}

impl HostBuffer {
    /// Allocate a zero-filled buffer
    pub fn zeroed(len: usize) -> Self {
        Self::from_vec(vec![0u8; len])
    }

    /// Wrap existing bytes
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
        }
    }

    /// Buffer length in bytes
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the contents out
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    /// Copy `len` bytes starting at `offset`, or `None` if out of range
    pub fn read_at(&self, offset: usize, len: usize) -> Option<Vec<u8>> {
        let data = self.data.lock();
        let end = offset.checked_add(len)?;
        data.get(offset..end).map(<[u8]>::to_vec)
    }

    /// Write `src` at `offset`
    ///
    /// Returns `false` without writing if the range does not fit.
    pub fn write_at(&self, offset: usize, src: &[u8]) -> bool {
        let mut data = self.data.lock();
        match offset.checked_add(src.len()) {
            Some(end) if end <= data.len() => {
                data[offset..end].copy_from_slice(src);
                true
            }
            _ => false,
        }
    }

    /// Split the buffer into consecutive chunks of `chunk` bytes
    pub fn chunks(&self, chunk: usize) -> Vec<Vec<u8>> {
        if chunk == 0 {
            return Vec::new();
        }
        self.data.lock().chunks(chunk).map(<[u8]>::to_vec).collect()
    }

    /// Consume the handle, returning the bytes if no other handle exists
    pub fn try_into_vec(self) -> Result<Vec<u8>, Self> {
        Arc::try_unwrap(self.data)
            .map(Mutex::into_inner)
            .map_err(|data| Self { data })
    }
}
