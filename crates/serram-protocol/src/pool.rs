//! Host-resident memory pool addressed by the device.

use std::ops::Range;

use crate::error::PoolError;

/// A fixed-size byte buffer the device reads and writes by offset.
///
/// The pool is created zero-filled and is only ever replaced as a whole;
/// `write` mutates it in place. Every access is bounds checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPool {
    data: Vec<u8>,
}

impl MemoryPool {
    /// Allocate a zero-filled pool.
    pub fn new(size: usize) -> Self {
        MemoryPool {
            data: vec![0; size],
        }
    }

    /// Pool size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the pool has zero size.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Entire pool contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Validate a device-supplied `(index, size)` pair against the pool.
    pub fn checked_range(&self, index: i32, size: i32) -> Result<Range<usize>, PoolError> {
        let out_of_range = || PoolError::OutOfRange {
            index: index as i64,
            size: size as i64,
            pool_len: self.data.len(),
        };

        let start = usize::try_from(index).map_err(|_| out_of_range())?;
        let len = usize::try_from(size).map_err(|_| out_of_range())?;
        let end = start.checked_add(len).ok_or_else(out_of_range)?;
        if end > self.data.len() {
            return Err(out_of_range());
        }
        Ok(start..end)
    }

    /// Borrow `size` bytes starting at `index`.
    pub fn read(&self, index: i32, size: i32) -> Result<&[u8], PoolError> {
        let range = self.checked_range(index, size)?;
        Ok(&self.data[range])
    }

    /// Overwrite bytes starting at `index`.
    pub fn write(&mut self, index: i32, data: &[u8]) -> Result<(), PoolError> {
        let size = i32::try_from(data.len()).map_err(|_| PoolError::OutOfRange {
            index: index as i64,
            size: data.len() as i64,
            pool_len: self.data.len(),
        })?;
        let range = self.checked_range(index, size)?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }
}
