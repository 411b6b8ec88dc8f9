//! Bounds-checking pass-through device.

use crate::domain::error::FlashError;
use crate::domain::ports::{FlashDevice, TransferHandler};

/// Forwards every call unchanged after checking the range against the inner
/// device's length.
///
/// Useful as the outermost layer over a leaf driver that does not validate
/// its arguments.
#[derive(Debug)]
pub struct ForwardingFlashDevice<D> {
    inner: D,
}

impl<D: FlashDevice> ForwardingFlashDevice<D> {
    /// Wrap a device.
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    /// Borrow the inner device.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Consume the wrapper and return the inner device.
    pub fn into_inner(self) -> D {
        self.inner
    }

    fn check(&self, address: u32, extent: usize) -> Result<(), FlashError> {
        if self.inner.is_valid_range(address, extent) {
            Ok(())
        } else {
            Err(FlashError::out_of_range(address, extent, self.inner.length()))
        }
    }
}

impl<D: FlashDevice> FlashDevice for ForwardingFlashDevice<D> {
    #[inline]
    fn page_size(&self) -> u32 {
        self.inner.page_size()
    }

    #[inline]
    fn page_count(&self) -> u32 {
        self.inner.page_count()
    }

    fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        self.check(address, self.page_size() as usize)?;
        self.inner.erase_page(address)
    }

    fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        self.inner.write_page(address, data)
    }

    fn read_page(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        self.inner.read_page(address, data)
    }

    fn write_erase_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        self.inner.write_erase_page(address, data)
    }

    fn copy_page(
        &mut self,
        address: u32,
        handler: &mut TransferHandler<'_>,
        scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        self.check(address, 0)?;
        self.inner.copy_page(address, handler, scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::RamFlash;

    #[test]
    fn test_forwards_within_bounds() {
        let mut device = ForwardingFlashDevice::new(RamFlash::new(2, 16));
        device.write_page(4, &[0x12, 0x34]).unwrap();
        let mut buf = [0u8; 2];
        device.read_page(4, &mut buf).unwrap();
        assert_eq!(buf, [0x12, 0x34]);
        assert_eq!(device.inner().as_bytes()[4], 0x12);
    }

    #[test]
    fn test_rejects_out_of_bounds() {
        let mut device = ForwardingFlashDevice::new(RamFlash::new(2, 16));
        assert!(matches!(
            device.write_page(31, &[0, 0]),
            Err(FlashError::OutOfRange { capacity: 32, .. })
        ));
        assert!(device.erase_page(32).is_err());
        assert_eq!(device.into_inner().as_bytes()[31], 0xFF);
    }
}
