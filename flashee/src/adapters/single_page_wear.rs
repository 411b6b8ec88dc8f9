//! Page rewrites through a single swap page.

use super::translating::{copy_page_between, keep_chunk, write_erase_relocating};
use crate::domain::error::FlashError;
use crate::domain::ports::{FlashDevice, TransferHandler, scratch_buffer};

/// Hides the last inner page and uses it as a copy buffer.
///
/// Rewriting a page copies it to the swap page through the handler, erases
/// the original and copies it back. Every rewrite erases the swap page, so it
/// wears fastest; use [`LogicalPageMapper`](super::LogicalPageMapper) when
/// that matters.
#[derive(Debug)]
pub struct SinglePageWear<D> {
    inner: D,
}

impl<D: FlashDevice> SinglePageWear<D> {
    /// Wrap a device with at least two pages.
    pub fn new(inner: D) -> Result<Self, FlashError> {
        if inner.page_count() < 2 {
            return Err(FlashError::InvalidConfig("single page wear needs at least two pages"));
        }
        Ok(Self { inner })
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
        if self.is_valid_range(address, extent) {
            Ok(())
        } else {
            Err(FlashError::out_of_range(address, extent, self.length()))
        }
    }
}

impl<D: FlashDevice> FlashDevice for SinglePageWear<D> {
    #[inline]
    fn page_size(&self) -> u32 {
        self.inner.page_size()
    }

    #[inline]
    fn page_count(&self) -> u32 {
        self.inner.page_count() - 1
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
        if !self.is_valid_address(address, data.len()) {
            return Err(FlashError::out_of_range(address, data.len(), self.length()));
        }
        let mut scratch = scratch_buffer();
        write_erase_relocating(self, address, data, &mut scratch[..])
    }

    fn copy_page(
        &mut self,
        address: u32,
        handler: &mut TransferHandler<'_>,
        scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        self.check(address, 1)?;
        let page = self.address_page(address);
        let swap = self.page_count();
        let size = self.page_size();

        self.inner.erase_page(swap * size)?;
        copy_page_between(&mut self.inner, page, swap, 0, size, handler, scratch)?;
        self.inner.erase_page(page * size)?;
        copy_page_between(&mut self.inner, swap, page, 0, size, &mut keep_chunk, scratch)
    }
}
