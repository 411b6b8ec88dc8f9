//! Address window over another device.
//!
//! A region exposes `[base, end)` of its inner device as its own address
//! space starting at 0. Both bounds are page-aligned, so the region has the
//! inner page size and `(end - base) / page_size` pages.
//!
//! ```text
//! inner:   ┌────┬────┬────┬────┬────┬────┬────┬────┐
//!          │ 0  │ 1  │ 2  │ 3  │ 4  │ 5  │ 6  │ 7  │
//!          └────┴────┴────┴────┴────┴────┴────┴────┘
//!                    ▲ base              ▲ end
//! region:            ┌────┬────┬────┬────┐
//!                    │ 0  │ 1  │ 2  │ 3  │
//!                    └────┴────┴────┴────┘
//! ```

use crate::domain::error::FlashError;
use crate::domain::ports::{FlashDevice, TransferHandler};

/// A page-aligned sub-range of an inner device.
#[derive(Debug)]
pub struct FlashDeviceRegion<D> {
    inner: D,
    base: u32,
    end: u32,
}

impl<D: FlashDevice> FlashDeviceRegion<D> {
    /// Region covering the whole inner device.
    pub fn new(inner: D) -> Self {
        let end = inner.length();
        Self {
            inner,
            base: 0,
            end,
        }
    }

    /// Region covering `[start, end)` of the inner device.
    ///
    /// Both bounds must be page addresses with `start <= end <= inner.length()`.
    pub fn with_bounds(inner: D, start: u32, end: u32) -> Result<Self, FlashError> {
        if start > end
            || end > inner.length()
            || !inner.is_page_address(start)
            || !inner.is_page_address(end)
        {
            return Err(FlashError::InvalidRegion { start, end });
        }
        Ok(Self {
            inner,
            base: start,
            end,
        })
    }

    /// First inner address covered by the region.
    #[inline]
    pub fn base(&self) -> u32 {
        self.base
    }

    /// First inner address past the region.
    #[inline]
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Borrow the inner device.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Consume the region and return the inner device.
    pub fn into_inner(self) -> D {
        self.inner
    }

    /// Borrow `[start, end)` of this region as a nested region.
    ///
    /// Bounds are relative to this region and follow the rules of
    /// [`with_bounds`](Self::with_bounds).
    pub fn subregion(&mut self, start: u32, end: u32) -> Result<FlashDeviceRegion<&mut D>, FlashError> {
        let (base, end) = self.nested_bounds(start, end)?;
        Ok(FlashDeviceRegion {
            inner: &mut self.inner,
            base,
            end,
        })
    }

    /// Like [`subregion`](Self::subregion) but consumes this region.
    pub fn into_subregion(self, start: u32, end: u32) -> Result<FlashDeviceRegion<D>, FlashError> {
        let (base, end) = self.nested_bounds(start, end)?;
        Ok(FlashDeviceRegion {
            inner: self.inner,
            base,
            end,
        })
    }

    fn nested_bounds(&self, start: u32, end: u32) -> Result<(u32, u32), FlashError> {
        if start > end || end > self.length() || !self.is_page_address(start) || !self.is_page_address(end) {
            return Err(FlashError::InvalidRegion { start, end });
        }
        Ok((self.base + start, self.base + end))
    }

    fn translate(&self, address: u32, extent: usize) -> Result<u32, FlashError> {
        if self.is_valid_range(address, extent) {
            Ok(self.base + address)
        } else {
            Err(FlashError::out_of_range(address, extent, self.length()))
        }
    }
}

impl<D: FlashDevice> FlashDevice for FlashDeviceRegion<D> {
    #[inline]
    fn page_size(&self) -> u32 {
        self.inner.page_size()
    }

    #[inline]
    fn page_count(&self) -> u32 {
        (self.end - self.base) / self.inner.page_size()
    }

    fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        let dest = self.translate(address, self.page_size() as usize)?;
        self.inner.erase_page(dest)
    }

    fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        let dest = self.translate(address, data.len())?;
        self.inner.write_page(dest, data)
    }

    fn read_page(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError> {
        let dest = self.translate(address, data.len())?;
        self.inner.read_page(dest, data)
    }

    fn write_erase_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        let dest = self.translate(address, data.len())?;
        self.inner.write_erase_page(dest, data)
    }

    fn copy_page(
        &mut self,
        address: u32,
        handler: &mut TransferHandler<'_>,
        scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        let dest = self.translate(address, 0)?;
        self.inner.copy_page(dest, handler, scratch)
    }
}
