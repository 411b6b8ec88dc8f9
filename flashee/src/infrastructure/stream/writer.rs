use super::{STRING_PREFIX_SIZE, SeekFrom, resolve_seek};
use crate::domain::error::FlashError;
use crate::domain::ports::FlashDevice;

/// Writes consecutive values to a device, advancing a cursor.
///
/// Every write goes through [`FlashDevice::write`], so previous content is
/// replaced regardless of the bits already cleared.
#[derive(Debug)]
pub struct FlashWriter<D> {
    device: D,
    position: u32,
}

impl<D: FlashDevice> FlashWriter<D> {
    /// Start writing at address 0.
    pub fn new(device: D) -> Self {
        Self::at(device, 0)
    }

    /// Start writing at `position`.
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

    /// Move the cursor, returning the new position.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u32, FlashError> {
        self.position = resolve_seek(self.position, self.device.length(), pos)?;
        Ok(self.position)
    }

    /// Write `data` at the cursor.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), FlashError> {
        self.device.write(self.position, data)?;
        self.position += data.len() as u32;
        Ok(())
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) -> Result<(), FlashError> {
        self.write_bytes(&[value])
    }

    /// Write a little-endian `u16`.
    pub fn write_u16(&mut self, value: u16) -> Result<(), FlashError> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a little-endian `u32`.
    pub fn write_u32(&mut self, value: u32) -> Result<(), FlashError> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write `s` preceded by its length as a `u16`.
    pub fn write_string(&mut self, s: &str) -> Result<(), FlashError> {
        let Ok(len) = u16::try_from(s.len()) else {
            return Err(FlashError::out_of_range(self.position, s.len(), self.device.length()));
        };
        let extent = STRING_PREFIX_SIZE + len as u32;
        if extent > self.remaining() {
            return Err(FlashError::out_of_range(
                self.position,
                extent as usize,
                self.device.length(),
            ));
        }
        self.write_u16(len)?;
        self.write_bytes(s.as_bytes())
    }

    /// Borrow the device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Consume the writer and return the device.
    pub fn into_inner(self) -> D {
        self.device
    }
}
