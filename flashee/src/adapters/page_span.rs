//! Lets reads and writes cross page boundaries.

use crate::domain::error::FlashError;
use crate::domain::ports::{FlashDevice, TransferHandler};

/// Splits every read and write into page-confined chunks for the inner device.
///
/// Chunks are issued in address order and the first failing chunk aborts the
/// operation. Chunks already written are not rolled back.
#[derive(Debug)]
pub struct PageSpanFlashDevice<D> {
    inner: D,
}

impl<D: FlashDevice> PageSpanFlashDevice<D> {
    /// Wrap a device.
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    /// Borrow the inner device.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Mutably borrow the inner device.
    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    /// Consume the wrapper and return the inner device.
    pub fn into_inner(self) -> D {
        self.inner
    }

    fn check(&self, address: u32, extent: usize) -> Result<(), FlashError> {
        if self.is_valid_range(address, extent) {
            Ok(())
        } else {
            Err(FlashError::out_of_range(address, extent, self.length()))
        }
    }

    /// Call `op` once per page-confined piece of `[address, address + len)`
    /// with the piece's address and its range within the caller's buffer.
    fn chunked<F>(&mut self, mut address: u32, len: usize, mut op: F) -> Result<(), FlashError>
    where
        F: FnMut(&mut D, u32, core::ops::Range<usize>) -> Result<(), FlashError>,
    {
        let size = self.inner.page_size();
        let mut done = 0usize;
        while done < len {
            let offset = address % size;
            let count = ((size - offset) as usize).min(len - done);
            op(&mut self.inner, address, done..done + count)?;
            address += count as u32;
            done += count;
        }
        Ok(())
    }
}

impl<D: FlashDevice> FlashDevice for PageSpanFlashDevice<D> {
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
        self.chunked(address, data.len(), |inner, dest, range| inner.write_page(dest, &data[range]))
    }

    fn read_page(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        self.chunked(address, data.len(), |inner, dest, range| inner.read_page(dest, &mut data[range]))
    }

    fn write_erase_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        self.chunked(address, data.len(), |inner, dest, range| {
            inner.write_erase_page(dest, &data[range])
        })
    }

    fn copy_page(
        &mut self,
        address: u32,
        handler: &mut TransferHandler<'_>,
        scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        self.inner.copy_page(address, handler, scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::RamFlash;

    #[test]
    fn test_write_spanning_three_pages() {
        let mut device = PageSpanFlashDevice::new(RamFlash::new(4, 8));
        let data: [u8; 20] = core::array::from_fn(|i| i as u8);
        device.write_page(3, &data).unwrap();

        let mut buf = [0u8; 20];
        device.read_page(3, &mut buf).unwrap();
        assert_eq!(buf, data);
        assert_eq!(&device.inner().as_bytes()[3..23], &data);
    }

    #[test]
    fn test_write_erase_spanning_pages() {
        let mut device = PageSpanFlashDevice::new(RamFlash::new(4, 8));
        device.write_page(0, &[0; 32]).unwrap();
        device.write_erase_page(6, &[0xAB; 4]).unwrap();
        assert_eq!(&device.inner().as_bytes()[5..11], &[0, 0xAB, 0xAB, 0xAB, 0xAB, 0]);
    }

    #[test]
    fn test_rejects_range_past_end() {
        let mut device = PageSpanFlashDevice::new(RamFlash::new(2, 8));
        let mut buf = [0u8; 4];
        assert!(device.read_page(14, &mut buf).is_err());
        assert!(device.write_page(16, &[0]).is_err());
        device.read_page(12, &mut buf).unwrap();
    }
}
