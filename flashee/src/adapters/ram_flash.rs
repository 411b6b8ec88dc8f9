//! RAM-backed flash emulator.
//!
//! Emulates NOR/NAND semantics on a heap buffer: erase sets a whole page to
//! `0xFF`, `write_page` ANDs data into the existing content. Used by the tests
//! and by the image tool, which loads and stores the raw bytes as a file.
//!
//! # Example
//!
//! ```
//! use flashee::adapters::RamFlash;
//! use flashee::FlashDevice;
//!
//! let mut flash = RamFlash::new(4, 256);
//! flash.write_page(0, &[0xF0]).unwrap();
//! flash.write_page(0, &[0x3C]).unwrap();
//! assert_eq!(flash.read_byte(0).unwrap(), 0x30);
//! ```

use alloc::vec;
use alloc::vec::Vec;

use crate::domain::error::FlashError;
use crate::domain::ports::{FlashDevice, TransferHandler};

/// A flash device held entirely in RAM.
#[derive(Debug, Clone)]
pub struct RamFlash {
    data: Vec<u8>,
    page_size: u32,
    page_count: u32,
    allow_page_span: bool,
    erase_counts: Vec<u32>,
}

impl RamFlash {
    /// Create an erased device of `page_count` pages of `page_size` bytes.
    ///
    /// # Panics
    /// Panics if `page_size` is 0.
    pub fn new(page_count: u32, page_size: u32) -> Self {
        assert!(page_size > 0, "page_size must be non-zero");
        Self {
            data: vec![0xFF; page_count as usize * page_size as usize],
            page_size,
            page_count,
            allow_page_span: false,
            erase_counts: vec![0; page_count as usize],
        }
    }

    /// Wrap an existing image.
    ///
    /// The image length must be a non-zero multiple of `page_size`.
    pub fn from_bytes(data: Vec<u8>, page_size: u32) -> Result<Self, FlashError> {
        if page_size == 0 || data.is_empty() || data.len() % page_size as usize != 0 {
            return Err(FlashError::InvalidConfig(
                "image length must be a non-zero multiple of the page size",
            ));
        }
        let page_count = (data.len() / page_size as usize) as u32;
        Ok(Self {
            data,
            page_size,
            page_count,
            allow_page_span: false,
            erase_counts: vec![0; page_count as usize],
        })
    }

    /// Allow single operations to cross page boundaries.
    pub fn with_page_span(mut self, allow: bool) -> Self {
        self.allow_page_span = allow;
        self
    }

    /// Raw content of the whole device.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the device and return its raw content.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Number of times a page has been erased since this value was created.
    pub fn erase_count(&self, page: u32) -> u32 {
        self.erase_counts.get(page as usize).copied().unwrap_or(0)
    }

    /// Sum of all page erase counts.
    pub fn total_erases(&self) -> u64 {
        self.erase_counts.iter().map(|&count| count as u64).sum()
    }

    fn check_region(&self, address: u32, extent: usize) -> Result<(), FlashError> {
        let valid = if self.allow_page_span {
            self.is_valid_range(address, extent)
        } else {
            self.is_valid_address(address, extent)
        };
        if valid {
            Ok(())
        } else {
            Err(FlashError::out_of_range(address, extent, self.length()))
        }
    }

    #[inline]
    fn range(address: u32, extent: usize) -> core::ops::Range<usize> {
        address as usize..address as usize + extent
    }
}

impl FlashDevice for RamFlash {
    #[inline]
    fn page_size(&self) -> u32 {
        self.page_size
    }

    #[inline]
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        if !self.is_page_address(address) {
            return Err(FlashError::Unaligned { address });
        }
        self.check_region(address, self.page_size as usize)?;
        self.data[Self::range(address, self.page_size as usize)].fill(0xFF);
        let page = self.address_page(address) as usize;
        self.erase_counts[page] += 1;
        Ok(())
    }

    fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.check_region(address, data.len())?;
        for (cell, byte) in self.data[Self::range(address, data.len())].iter_mut().zip(data) {
            *cell &= *byte;
        }
        Ok(())
    }

    fn read_page(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError> {
        self.check_region(address, data.len())?;
        data.copy_from_slice(&self.data[Self::range(address, data.len())]);
        Ok(())
    }

    fn write_erase_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.check_region(address, data.len())?;
        self.data[Self::range(address, data.len())].copy_from_slice(data);
        Ok(())
    }

    fn copy_page(
        &mut self,
        _address: u32,
        _handler: &mut TransferHandler<'_>,
        _scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        Err(FlashError::Unsupported("copy_page"))
    }
}
