//! NOR flash leaf driver over `embedded-storage`.
//!
//! Wraps any [`MultiwriteNorFlash`] and exposes a window of its erase sectors
//! as a [`FlashDevice`], so ESP32 internal flash, external SPI NOR or any
//! other `embedded-storage` driver can sit at the bottom of a stack.
//!
//! # Example
//!
//! ```ignore
//! use esp_storage::FlashStorage;
//! use flashee::adapters::{NorFlashAdapter, NorFlashConfig};
//!
//! let config = NorFlashConfig::new(0x3C_0000, 64); // 256KB at 3.75MB
//! let flash = NorFlashAdapter::new(FlashStorage::new(), config)?;
//! let mut storage = flashee::infrastructure::devices::create_wear_level_erase(
//!     flash, 0, 64 * 4096, 2,
//! )?;
//! ```

use alloc::vec;
use alloc::vec::Vec;

use embedded_storage::nor_flash::{
    MultiwriteNorFlash, NorFlash, NorFlashError as _, NorFlashErrorKind, ReadNorFlash,
};

use crate::domain::error::FlashError;
use crate::domain::ports::{FlashDevice, TransferHandler};

/// Sector size the configuration presets assume.
pub const NOR_FLASH_SECTOR_SIZE: u32 = 4096;

/// Location of the storage window within the NOR flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NorFlashConfig {
    /// Start offset in flash; must be sector-aligned.
    pub start_offset: u32,
    /// Number of erase sectors to use.
    pub page_count: u32,
}

impl NorFlashConfig {
    /// Create a new window description.
    pub const fn new(start_offset: u32, page_count: u32) -> Self {
        Self {
            start_offset,
            page_count,
        }
    }

    /// Last 256KB of a 4MB flash (64 sectors at 0x3C0000).
    pub const fn default_4mb() -> Self {
        Self::new(0x3C_0000, 64)
    }

    /// Last 1MB of a 16MB flash (256 sectors at 0xF00000).
    pub const fn default_16mb() -> Self {
        Self::new(0xF0_0000, 256)
    }
}

impl Default for NorFlashConfig {
    fn default() -> Self {
        Self::default_4mb()
    }
}

fn map_err<E: embedded_storage::nor_flash::NorFlashError>(err: E) -> FlashError {
    match err.kind() {
        NorFlashErrorKind::NotAligned => FlashError::Device("nor flash: unaligned access"),
        NorFlashErrorKind::OutOfBounds => FlashError::Device("nor flash: out of bounds"),
        _ => FlashError::Device("nor flash: operation failed"),
    }
}

/// A window of erase sectors on a NOR flash.
///
/// Page size is the flash's `ERASE_SIZE`. Writes AND into the existing
/// content, which [`MultiwriteNorFlash`] guarantees for repeated writes to
/// the same word. Accesses that are not aligned to `READ_SIZE`/`WRITE_SIZE`
/// are widened and merged in a heap buffer.
pub struct NorFlashAdapter<F> {
    flash: F,
    config: NorFlashConfig,
}

impl<F: MultiwriteNorFlash> NorFlashAdapter<F> {
    /// Create an adapter, checking the window against the flash geometry.
    pub fn new(flash: F, config: NorFlashConfig) -> Result<Self, FlashError> {
        let sector = F::ERASE_SIZE as u64;
        let end = config.start_offset as u64 + config.page_count as u64 * sector;
        if config.start_offset as u64 % sector != 0 {
            return Err(FlashError::InvalidConfig("start_offset must be sector aligned"));
        }
        if config.page_count == 0 || end > flash.capacity() as u64 {
            return Err(FlashError::InvalidConfig("window does not fit the flash"));
        }
        Ok(Self { flash, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &NorFlashConfig {
        &self.config
    }

    /// Consume the adapter and return the underlying flash.
    pub fn into_inner(self) -> F {
        self.flash
    }

    #[inline]
    fn offset(&self, address: u32) -> u32 {
        self.config.start_offset + address
    }

    fn check(&self, address: u32, extent: usize) -> Result<(), FlashError> {
        if self.is_valid_address(address, extent) {
            Ok(())
        } else {
            Err(FlashError::out_of_range(address, extent, self.length()))
        }
    }

    /// Align `[address, address + len)` outwards to `unit`.
    fn widen(address: u32, len: usize, unit: usize) -> (u32, usize) {
        let unit = unit.max(1) as u32;
        let start = address - address % unit;
        let end = (address + len as u32).div_ceil(unit) * unit;
        (start, (end - start) as usize)
    }

    fn read_widened(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError> {
        let (start, len) = Self::widen(address, data.len(), F::READ_SIZE);
        if start == address && len == data.len() {
            return self.flash.read(self.offset(address), data).map_err(map_err);
        }
        let mut window = vec![0u8; len];
        self.flash.read(self.offset(start), &mut window).map_err(map_err)?;
        let skip = (address - start) as usize;
        data.copy_from_slice(&window[skip..skip + data.len()]);
        Ok(())
    }

    fn read_sector(&mut self, page: u32) -> Result<Vec<u8>, FlashError> {
        let mut sector = vec![0u8; self.page_size() as usize];
        let address = self.page_address(page);
        self.read_widened(address, &mut sector)?;
        Ok(sector)
    }

    fn rewrite_sector(&mut self, page: u32, sector: &[u8]) -> Result<(), FlashError> {
        let from = self.offset(self.page_address(page));
        self.flash.erase(from, from + self.page_size()).map_err(map_err)?;
        self.flash.write(from, sector).map_err(map_err)
    }
}

impl<F: MultiwriteNorFlash> FlashDevice for NorFlashAdapter<F> {
    #[inline]
    fn page_size(&self) -> u32 {
        F::ERASE_SIZE as u32
    }

    #[inline]
    fn page_count(&self) -> u32 {
        self.config.page_count
    }

    fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        if !self.is_page_address(address) {
            return Err(FlashError::Unaligned { address });
        }
        self.check(address, self.page_size() as usize)?;
        let from = self.offset(address);
        self.flash.erase(from, from + self.page_size()).map_err(map_err)
    }

    fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        let (start, len) = Self::widen(address, data.len(), F::WRITE_SIZE);
        let mut window = vec![0xFF; len];
        self.read_widened(start, &mut window)?;
        let skip = (address - start) as usize;
        for (cell, byte) in window[skip..skip + data.len()].iter_mut().zip(data) {
            *cell &= *byte;
        }
        self.flash.write(self.offset(start), &window).map_err(map_err)
    }

    fn read_page(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        self.read_widened(address, data)
    }

    /// AND-writes when the new data only clears bits; otherwise erases and
    /// rewrites the whole sector.
    fn write_erase_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        let page = self.address_page(address);
        let mut sector = self.read_sector(page)?;
        let skip = (address % self.page_size()) as usize;
        let target = &mut sector[skip..skip + data.len()];
        if target.iter().zip(data).all(|(old, new)| old & new == *new) {
            return self.write_page(address, data);
        }
        target.copy_from_slice(data);
        self.rewrite_sector(page, &sector)
    }

    /// Rewrites the sector in place through a heap copy. Not power-fail safe;
    /// put a [`LogicalPageMapper`](super::LogicalPageMapper) on top when that
    /// matters.
    fn copy_page(
        &mut self,
        address: u32,
        handler: &mut TransferHandler<'_>,
        scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        self.check(address, 1)?;
        let page = self.address_page(address);
        let mut sector = self.read_sector(page)?;
        let chunk_size = scratch.len().max(1);
        for (index, chunk) in sector.chunks_mut(chunk_size).enumerate() {
            handler((index * chunk_size) as u32, chunk);
        }
        self.rewrite_sector(page, &sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_storage::nor_flash::{ErrorType, NorFlash, ReadNorFlash};

    const SECTOR: usize = 256;
    const SECTORS: usize = 8;

    /// Mock NOR flash with 4-byte write granularity.
    struct MockFlash {
        data: [u8; SECTOR * SECTORS],
        erases: usize,
    }

    impl MockFlash {
        fn new() -> Self {
            Self {
                data: [0xFF; SECTOR * SECTORS],
                erases: 0,
            }
        }
    }

    #[derive(Debug)]
    struct MockFlashError(NorFlashErrorKind);

    impl embedded_storage::nor_flash::NorFlashError for MockFlashError {
        fn kind(&self) -> NorFlashErrorKind {
            self.0
        }
    }

    impl ErrorType for MockFlash {
        type Error = MockFlashError;
    }

    impl ReadNorFlash for MockFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            let src = self
                .data
                .get(start..start + bytes.len())
                .ok_or(MockFlashError(NorFlashErrorKind::OutOfBounds))?;
            bytes.copy_from_slice(src);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.data.len()
        }
    }

    impl NorFlash for MockFlash {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = SECTOR;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            if from as usize % SECTOR != 0 || to as usize % SECTOR != 0 {
                return Err(MockFlashError(NorFlashErrorKind::NotAligned));
            }
            self.data[from as usize..to as usize].fill(0xFF);
            self.erases += 1;
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if offset as usize % 4 != 0 || bytes.len() % 4 != 0 {
                return Err(MockFlashError(NorFlashErrorKind::NotAligned));
            }
            let start = offset as usize;
            for (cell, byte) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
                *cell &= *byte;
            }
            Ok(())
        }
    }

    impl MultiwriteNorFlash for MockFlash {}

    fn adapter() -> NorFlashAdapter<MockFlash> {
        NorFlashAdapter::new(MockFlash::new(), NorFlashConfig::new(2 * SECTOR as u32, 4)).unwrap()
    }

    #[test]
    fn test_geometry_from_flash() {
        let adapter = adapter();
        assert_eq!(adapter.page_size(), SECTOR as u32);
        assert_eq!(adapter.page_count(), 4);
    }

    #[test]
    fn test_unaligned_write_is_widened() {
        let mut adapter = adapter();
        adapter.write_page(5, &[0x12, 0x34, 0x56]).unwrap();
        let mut buf = [0u8; 5];
        adapter.read_page(4, &mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0x12, 0x34, 0x56, 0xFF]);
        assert_eq!(adapter.into_inner().data[2 * SECTOR + 5], 0x12);
    }

    #[test]
    fn test_write_ands() {
        let mut adapter = adapter();
        adapter.write_page(0, &[0xF0]).unwrap();
        adapter.write_page(0, &[0x3C]).unwrap();
        assert_eq!(adapter.read_byte(0).unwrap(), 0x30);
    }

    #[test]
    fn test_write_erase_only_erases_when_needed() {
        let mut adapter = adapter();
        adapter.write_erase_page(10, &[0x0F]).unwrap();
        adapter.write_erase_page(11, &[0x01]).unwrap();
        assert_eq!(adapter.flash.erases, 0);

        adapter.write_erase_page(10, &[0xF0]).unwrap();
        assert_eq!(adapter.flash.erases, 1);
        let mut buf = [0u8; 2];
        adapter.read_page(10, &mut buf).unwrap();
        assert_eq!(buf, [0xF0, 0x01]);
    }

    #[test]
    fn test_copy_page_applies_handler() {
        let mut adapter = adapter();
        adapter.write_page(SECTOR as u32, &[1, 2, 3, 4]).unwrap();
        let mut scratch = [0u8; 64];
        adapter
            .copy_page(
                SECTOR as u32,
                &mut |offset: u32, chunk: &mut [u8]| {
                    if offset == 0 {
                        chunk[1] = 0xFF;
                    }
                },
                &mut scratch,
            )
            .unwrap();
        let mut buf = [0u8; 4];
        adapter.read_page(SECTOR as u32, &mut buf).unwrap();
        assert_eq!(buf, [1, 0xFF, 3, 4]);
    }

    #[test]
    fn test_config_validation() {
        assert!(NorFlashAdapter::new(MockFlash::new(), NorFlashConfig::new(100, 1)).is_err());
        assert!(NorFlashAdapter::new(MockFlash::new(), NorFlashConfig::new(0, 9)).is_err());
        assert!(NorFlashAdapter::new(MockFlash::new(), NorFlashConfig::new(0, 0)).is_err());
    }

    #[test]
    fn test_config_presets() {
        let config_4mb = NorFlashConfig::default_4mb();
        assert_eq!(config_4mb.start_offset, 0x3C_0000);
        assert_eq!(config_4mb.page_count, 64);
        assert_eq!(NorFlashConfig::default(), config_4mb);

        let config_16mb = NorFlashConfig::default_16mb();
        assert_eq!(config_16mb.start_offset % NOR_FLASH_SECTOR_SIZE, 0);
        assert_eq!(config_16mb.page_count, 256);
    }
}
