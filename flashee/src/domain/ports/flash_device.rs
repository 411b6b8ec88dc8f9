//! FlashDevice port - the capability contract every storage layer composes over.
//!
//! A flash device is an array of `page_count()` erase units of `page_size()`
//! bytes each. Erasing a page sets every bit to `1`; writing can only clear
//! bits (the new content is the bitwise AND of the old content and the data).
//! Layers stack by owning exactly one inner `FlashDevice` and translating
//! addresses on the way down:
//!
//! ```text
//! ┌───────────────────────┐
//! │   PageSpanFlashDevice │  arbitrary ranges
//! └──────────┬────────────┘
//!            ▼
//! ┌───────────────────────┐
//! │  MultiWriteFlashStore │  8-byte slots, fewer erases
//! └──────────┬────────────┘
//!            ▼
//! ┌───────────────────────┐
//! │   LogicalPageMapper   │  wear leveling
//! └──────────┬────────────┘
//!            ▼
//! ┌───────────────────────┐
//! │   FlashDeviceRegion   │  address window
//! └──────────┬────────────┘
//!            ▼
//! ┌───────────────────────┐
//! │  leaf driver (RAM/NOR)│  ◄── the only layer touching hardware
//! └───────────────────────┘
//! ```

use aligned::{A4, Aligned};

use crate::domain::error::FlashError;

use alloc::boxed::Box;

/// Size of the stack buffers used for page copies and slot processing.
///
/// This must be a multiple of 8 so that a buffer always holds whole
/// multi-write slots.
pub const SCRATCH_SIZE: usize = 128;

/// Word-aligned scratch buffer used by copy and compaction paths.
pub type ScratchBuffer = Aligned<A4, [u8; SCRATCH_SIZE]>;

/// Create a fresh scratch buffer.
#[inline]
pub const fn scratch_buffer() -> ScratchBuffer {
    Aligned([0xFF; SCRATCH_SIZE])
}

/// Transforms page content while it is being relocated.
///
/// The first argument is the offset of the chunk within the page (in the
/// address units of the layer that calls the handler), the second is the
/// chunk itself, which may be modified in place before it is written to the
/// destination page.
pub type TransferHandler<'a> = dyn FnMut(u32, &mut [u8]) + 'a;

/// The flash device capability contract.
///
/// All addresses are byte addresses in this device's own address space. The
/// length of every operation is the length of the data slice. Unless a layer
/// documents otherwise, `write_page`, `read_page` and `write_erase_page`
/// must not cross a page boundary.
///
/// # Errors
///
/// A failing write leaves the touched range undefined, but never with bits
/// set that an AND-write could not produce.
pub trait FlashDevice {
    /// Size of each page (erase unit) in bytes.
    fn page_size(&self) -> u32;

    /// Number of pages in the device.
    fn page_count(&self) -> u32;

    /// Reset the page starting at `address` to all `1` bits.
    ///
    /// `address` must be page-aligned.
    fn erase_page(&mut self, address: u32) -> Result<(), FlashError>;

    /// AND `data` into the existing content at `address`.
    fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError>;

    /// Copy `data.len()` bytes starting at `address` into `data`.
    ///
    /// This takes `&mut self` because some layers allocate backing storage
    /// lazily and the leaf drivers usually need exclusive bus access.
    fn read_page(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError>;

    /// Write `data` so that reading it back yields exactly `data`, erasing or
    /// relocating the underlying storage if needed.
    fn write_erase_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError>;

    /// Rewrite the page containing `address`, passing every chunk through
    /// `handler` before it reaches the destination.
    ///
    /// `scratch` bounds the chunk size; no other memory is used.
    fn copy_page(
        &mut self,
        address: u32,
        handler: &mut TransferHandler<'_>,
        scratch: &mut [u8],
    ) -> Result<(), FlashError>;

    /// Total size of the device in bytes.
    #[inline]
    fn length(&self) -> u32 {
        self.page_address(self.page_count())
    }

    /// Convert a page index into the address of its first byte.
    #[inline]
    fn page_address(&self, page: u32) -> u32 {
        page * self.page_size()
    }

    /// Page index containing `address`.
    #[inline]
    fn address_page(&self, address: u32) -> u32 {
        address / self.page_size()
    }

    /// Whether `address` is the first byte of a page.
    #[inline]
    fn is_page_address(&self, address: u32) -> bool {
        address % self.page_size() == 0
    }

    /// Whether `[address, address + extent)` lies inside the device.
    #[inline]
    fn is_valid_range(&self, address: u32, extent: usize) -> bool {
        (address as u64) + (extent as u64) <= self.length() as u64
    }

    /// Whether `[address, address + extent)` lies inside the device and
    /// within a single page.
    #[inline]
    fn is_valid_address(&self, address: u32, extent: usize) -> bool {
        self.is_valid_range(address, extent)
            && (extent == 0
                || self.address_page(address) == self.address_page(address + extent as u32 - 1))
    }

    /// Write data with full logical semantics. Alias of `write_erase_page`.
    #[inline]
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.write_erase_page(address, data)
    }

    /// Read data. Alias of `read_page`.
    #[inline]
    fn read(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError> {
        self.read_page(address, data)
    }

    /// Write a string, optionally followed by a NUL terminator.
    fn write_str(&mut self, address: u32, s: &str, include_nul: bool) -> Result<(), FlashError> {
        self.write(address, s.as_bytes())?;
        if include_nul {
            self.write(address + s.len() as u32, &[0])?;
        }
        Ok(())
    }

    /// Write a single byte with full logical semantics.
    #[inline]
    fn write_erase_byte(&mut self, address: u32, value: u8) -> Result<(), FlashError> {
        self.write_erase_page(address, &[value])
    }

    /// Read a single byte.
    #[inline]
    fn read_byte(&mut self, address: u32) -> Result<u8, FlashError> {
        let mut value = [0xFF];
        self.read_page(address, &mut value)?;
        Ok(value[0])
    }

    /// Erase every page of the device, stopping at the first failure.
    fn erase_all(&mut self) -> Result<(), FlashError> {
        let size = self.page_size();
        for page in 0..self.page_count() {
            self.erase_page(page * size)?;
        }
        Ok(())
    }
}

impl<D: FlashDevice + ?Sized> FlashDevice for &mut D {
    #[inline]
    fn page_size(&self) -> u32 {
        (**self).page_size()
    }

    #[inline]
    fn page_count(&self) -> u32 {
        (**self).page_count()
    }

    #[inline]
    fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        (**self).erase_page(address)
    }

    #[inline]
    fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        (**self).write_page(address, data)
    }

    #[inline]
    fn read_page(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError> {
        (**self).read_page(address, data)
    }

    #[inline]
    fn write_erase_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        (**self).write_erase_page(address, data)
    }

    #[inline]
    fn copy_page(
        &mut self,
        address: u32,
        handler: &mut TransferHandler<'_>,
        scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        (**self).copy_page(address, handler, scratch)
    }
}

impl<D: FlashDevice + ?Sized> FlashDevice for Box<D> {
    #[inline]
    fn page_size(&self) -> u32 {
        (**self).page_size()
    }

    #[inline]
    fn page_count(&self) -> u32 {
        (**self).page_count()
    }

    #[inline]
    fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        (**self).erase_page(address)
    }

    #[inline]
    fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        (**self).write_page(address, data)
    }

    #[inline]
    fn read_page(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError> {
        (**self).read_page(address, data)
    }

    #[inline]
    fn write_erase_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        (**self).write_erase_page(address, data)
    }

    #[inline]
    fn copy_page(
        &mut self,
        address: u32,
        handler: &mut TransferHandler<'_>,
        scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        (**self).copy_page(address, handler, scratch)
    }
}
