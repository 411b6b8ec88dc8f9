use alloc::string::String;
use alloc::vec;

use super::{STRING_PREFIX_SIZE, SeekFrom, resolve_seek};
use crate::domain::error::FlashError;
use crate::domain::ports::FlashDevice;

/// Reads consecutive values from a device, advancing a cursor.
#[derive(Debug)]
pub struct FlashReader<D> {
    device: D,
    position: u32,
}

impl<D: FlashDevice> FlashReader<D> {
    /// Start reading at address 0.
    pub fn new(device: D) -> Self {
        Self::at(device, 0)
    }

    /// Start reading at `position`.
    pub fn at(device: D, position: u32) -> Self {
        Self { device, position }
    }

    /// Current cursor position.
    #[inline]
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Bytes between the cursor and the end of the device.
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.device.length().saturating_sub(self.position)
    }

    /// Move the cursor forward without reading.
    pub fn skip(&mut self, count: u32) -> Result<(), FlashError> {
        self.seek(SeekFrom::Current(count as i64)).map(|_| ())
    }

    /// Move the cursor, returning the new position.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u32, FlashError> {
        self.position = resolve_seek(self.position, self.device.length(), pos)?;
        Ok(self.position)
    }

    /// Fill `buf` from the cursor.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), FlashError> {
        self.device.read(self.position, buf)?;
        self.position += buf.len() as u32;
        Ok(())
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, FlashError> {
        let mut value = [0u8; 1];
        self.read_bytes(&mut value)?;
        Ok(value[0])
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16, FlashError> {
        let mut value = [0u8; 2];
        self.read_bytes(&mut value)?;
        Ok(u16::from_le_bytes(value))
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, FlashError> {
        let mut value = [0u8; 4];
        self.read_bytes(&mut value)?;
        Ok(u32::from_le_bytes(value))
    }

    /// Read a length-prefixed string into `buf`, returning its length.
    ///
    /// Fails with [`FlashError::BufferFull`] without moving the cursor when
    /// the stored string is longer than `buf`.
    pub fn read_string_into(&mut self, buf: &mut [u8]) -> Result<usize, FlashError> {
        let start = self.position;
        let len = self.read_u16()? as usize;
        if len > buf.len() {
            self.position = start;
            return Err(FlashError::BufferFull);
        }
        if let Err(e) = self.read_bytes(&mut buf[..len]) {
            self.position = start;
            return Err(e);
        }
        Ok(len)
    }

    /// Read a length-prefixed string. Invalid UTF-8 is replaced.
    pub fn read_string(&mut self) -> Result<String, FlashError> {
        let start = self.position;
        let len = self.read_u16()? as u32;
        if len > self.remaining() {
            self.position = start;
            return Err(FlashError::out_of_range(
                start,
                (STRING_PREFIX_SIZE + len) as usize,
                self.device.length(),
            ));
        }
        let mut bytes = vec![0u8; len as usize];
        self.read_bytes(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Borrow the device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Consume the reader and return the device.
    pub fn into_inner(self) -> D {
        self.device
    }
}
