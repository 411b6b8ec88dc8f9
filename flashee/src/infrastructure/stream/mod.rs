//! Cursor-based readers and writers over a flash device.
//!
//! [`FlashReader`] and [`FlashWriter`] keep a byte position on a device and
//! advance it with every access. Multi-byte values are little-endian and
//! strings carry a `u16` length prefix, so a writer and a reader started at
//! the same address see the same sequence of values.
//!
//! Both streams, as well as [`CircularBuffer`](super::CircularBuffer),
//! implement the blocking `embedded-io` traits.

mod embedded_io_impl;
mod reader;
mod writer;

pub use reader::FlashReader;
pub use writer::FlashWriter;

use crate::domain::error::FlashError;

/// Length of the prefix stored in front of every string.
pub const STRING_PREFIX_SIZE: u32 = 2;

/// Seek position for stream operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    /// Offset from the start of the device.
    Start(u64),
    /// Offset relative to the current position.
    Current(i64),
    /// Offset from the end of the device.
    End(i64),
}

/// Resolve a seek target against the current position and device length.
pub(crate) fn resolve_seek(position: u32, length: u32, pos: SeekFrom) -> Result<u32, FlashError> {
    let target = match pos {
        SeekFrom::Start(offset) => i64::try_from(offset).unwrap_or(i64::MAX),
        SeekFrom::Current(offset) => position as i64 + offset,
        SeekFrom::End(offset) => length as i64 + offset,
    };
    if target < 0 || target > length as i64 {
        return Err(FlashError::OutOfRange {
            address: target.clamp(0, u32::MAX as i64) as u32,
            length: 0,
            capacity: length,
        });
    }
    Ok(target as u32)
}
