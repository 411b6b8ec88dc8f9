//! Wear leveling by logical to physical page mapping.
//!
//! The mapper exposes fewer pages than its inner device has. Each logical page
//! is backed by some physical page that carries a 2-byte [`PageHeader`]
//! naming the logical page. Relocating a page (`copy_page`) moves its content
//! to a randomly chosen free physical page, so repeated erases of one logical
//! page spread over the whole device.
//!
//! ```text
//! physical:  ┌──────┬──────┬──────┬──────┬──────┐
//!            │ L1   │ free │ L0   │ free │ SIG  │
//!            └──────┴──────┴──────┴──────┴──────┘
//!              0      1      2      3      4 = reserved
//! ```
//!
//! The last physical page is reserved and holds the format signature. The
//! logical map is a cache rebuilt from the headers on construction, which is
//! also how an interrupted relocation is recovered: a half-copied page still
//! carries a pending header and is ignored, and of two complete copies the
//! higher one is marked stale.

use alloc::vec;
use alloc::vec::Vec;

use super::translating::{copy_page_between, write_erase_relocating};
use crate::domain::entities::PhysicalPageState;
use crate::domain::error::FlashError;
use crate::domain::ports::{FlashDevice, PageRng, TransferHandler, XorShift32, scratch_buffer};
use crate::domain::value_objects::{HEADER_SIZE, HeaderState, MAX_LOGICAL_PAGES, MapperConfig, PageHeader};

/// Maps logical pages onto a larger set of physical pages.
///
/// Every physical page loses [`HEADER_SIZE`] bytes to its header, so the
/// logical page size is the inner page size minus 2.
#[derive(Debug)]
pub struct LogicalPageMapper<D, R = XorShift32> {
    inner: D,
    logical_pages: u32,
    page_map: Vec<Option<u16>>,
    states: Vec<PhysicalPageState>,
    rng: R,
}

impl<D: FlashDevice> LogicalPageMapper<D, XorShift32> {
    /// Create a mapper, formatting the inner device on first use.
    pub fn new(inner: D, config: MapperConfig) -> Result<Self, FlashError> {
        let rng = XorShift32::new(config.seed());
        Self::with_rng(inner, config, rng)
    }
}

impl<D: FlashDevice, R: PageRng> LogicalPageMapper<D, R> {
    /// Create a mapper that draws free page search positions from `rng`.
    ///
    /// If the reserved page lacks the format signature, every page that has
    /// been written to is erased and the signature is written. The logical
    /// map is then built from the page headers.
    pub fn with_rng(inner: D, config: MapperConfig, rng: R) -> Result<Self, FlashError> {
        let physical_pages = inner.page_count();
        if physical_pages < 2 || physical_pages > MAX_LOGICAL_PAGES {
            return Err(FlashError::InvalidConfig(
                "physical page count must be between 2 and 16384",
            ));
        }
        if config.logical_pages() >= physical_pages {
            return Err(FlashError::InvalidConfig(
                "logical pages must be fewer than physical pages",
            ));
        }
        if inner.page_size() <= HEADER_SIZE {
            return Err(FlashError::InvalidConfig("page size must exceed the page header"));
        }

        let mut mapper = Self {
            inner,
            logical_pages: config.logical_pages(),
            page_map: vec![None; config.logical_pages() as usize],
            states: vec![PhysicalPageState::Free; physical_pages as usize - 1],
            rng,
        };
        if mapper.format_if_needed()? {
            debug!("formatted {} physical pages", physical_pages);
        }
        mapper.build_in_use_map()?;
        Ok(mapper)
    }

    /// Borrow the inner device.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Mutably borrow the inner device.
    ///
    /// Writing to it behind the mapper's back invalidates the cached map;
    /// call [`rebuild`](Self::rebuild) afterwards.
    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    /// Consume the mapper and return the inner device.
    pub fn into_inner(self) -> D {
        self.inner
    }

    /// Number of physical pages, including the reserved one.
    #[inline]
    pub fn physical_page_count(&self) -> u32 {
        self.inner.page_count()
    }

    /// Physical page currently backing `logical`, if any.
    pub fn physical_page_for(&self, logical: u32) -> Option<u16> {
        self.page_map.get(logical as usize).copied().flatten()
    }

    /// Cached state of a physical page. `None` for the reserved page and
    /// out-of-range indices.
    pub fn page_state(&self, physical: u16) -> Option<PhysicalPageState> {
        self.states.get(physical as usize).copied()
    }

    /// Number of physical pages available for allocation.
    pub fn free_page_count(&self) -> usize {
        self.states.iter().filter(|state| state.is_free()).count()
    }

    /// Read the header of every physical page, the reserved page last.
    pub fn headers(&mut self) -> Result<Vec<PageHeader>, FlashError> {
        (0..=self.max_page()).map(|page| self.read_header(page)).collect()
    }

    /// Discard the cached map and rebuild it from the page headers.
    pub fn rebuild(&mut self) -> Result<(), FlashError> {
        self.build_in_use_map()
    }

    #[inline]
    fn max_page(&self) -> u16 {
        (self.inner.page_count() - 1) as u16
    }

    fn read_header(&mut self, page: u16) -> Result<PageHeader, FlashError> {
        let mut bytes = [0xFF; HEADER_SIZE as usize];
        let address = self.inner.page_address(page as u32);
        self.inner.read_page(address, &mut bytes)?;
        Ok(PageHeader::from_bytes(bytes))
    }

    fn write_header(&mut self, page: u16, header: PageHeader) -> Result<(), FlashError> {
        let address = self.inner.page_address(page as u32);
        self.inner.write_page(address, &header.to_bytes())
    }

    /// Whether any bit of the page has been cleared.
    fn page_is_dirty(&mut self, page: u16) -> Result<bool, FlashError> {
        let mut buf = scratch_buffer();
        let start = self.inner.page_address(page as u32);
        let end = start + self.inner.page_size();
        let mut address = start;
        while address < end {
            let count = (buf.len() as u32).min(end - address) as usize;
            self.inner.read_page(address, &mut buf[..count])?;
            if buf[..count].iter().any(|&b| b != 0xFF) {
                return Ok(true);
            }
            address += count as u32;
        }
        Ok(false)
    }

    /// Erase every dirty page and write the signature unless the reserved
    /// page already carries it. Returns whether formatting happened.
    fn format_if_needed(&mut self) -> Result<bool, FlashError> {
        let max = self.max_page();
        if self.read_header(max)? == PageHeader::FORMAT_SIGNATURE {
            return Ok(false);
        }
        for page in (0..=max).rev() {
            if self.page_is_dirty(page)? {
                let address = self.inner.page_address(page as u32);
                self.inner.erase_page(address)?;
            }
        }
        self.write_header(max, PageHeader::FORMAT_SIGNATURE)?;
        Ok(true)
    }

    /// Rebuild the logical map and page states from the headers.
    ///
    /// When two pages claim the same logical page the lower one wins. The
    /// other one gets a stale header so that the claim does not come back
    /// once the winner is erased.
    fn build_in_use_map(&mut self) -> Result<(), FlashError> {
        self.page_map.fill(None);
        self.states.fill(PhysicalPageState::Free);

        for page in 0..self.max_page() {
            let HeaderState::InUse(logical) = self.read_header(page)?.state() else {
                continue;
            };
            match self.page_map.get(logical as usize).copied() {
                Some(None) => {
                    self.page_map[logical as usize] = Some(page);
                    self.states[page as usize] = PhysicalPageState::Allocated(logical);
                }
                Some(Some(existing)) => {
                    warn!("page {} also claims logical page {}, keeping page {}", page, logical, existing);
                    self.write_header(page, PageHeader::STALE)?;
                }
                None => {
                    warn!("page {} claims logical page {} beyond the mapped range", page, logical);
                }
            }
        }

        debug!(
            "page map rebuilt: {} logical pages, {} free physical pages",
            self.logical_pages,
            self.free_page_count()
        );
        Ok(())
    }

    /// First free page at or after `start`, wrapping around.
    fn next_free_page(&self, start: u32) -> Option<u16> {
        let max = self.max_page() as u32;
        (0..max)
            .map(|i| ((start + i) % max) as u16)
            .find(|&page| self.states[page as usize].is_free())
    }

    /// Claim a free physical page for `logical`, erasing it if needed.
    ///
    /// With `persist_in_use` the in-use header is written immediately;
    /// otherwise only the cache records the allocation.
    fn allocate_logical_page(&mut self, logical: u16, persist_in_use: bool) -> Result<u16, FlashError> {
        let start = self.rng.next_u32() % self.max_page() as u32;
        let page = self.next_free_page(start).ok_or(FlashError::NoFreePage)?;

        // a clean header implies a clean page
        if !self.read_header(page)?.is_erased() {
            let address = self.inner.page_address(page as u32);
            self.inner.erase_page(address)?;
        }
        if persist_in_use {
            self.write_header(page, PageHeader::in_use(logical))?;
        }
        self.states[page as usize] = PhysicalPageState::Allocated(logical);
        self.page_map[logical as usize] = Some(page);
        trace!("logical page {} -> physical page {}", logical, page);
        Ok(page)
    }

    fn fetch_allocate_page(&mut self, logical: u16) -> Result<u16, FlashError> {
        match self.page_map[logical as usize] {
            Some(page) => Ok(page),
            None => self.allocate_logical_page(logical, true),
        }
    }

    #[inline]
    fn physical_address(&self, page: u16, address: u32) -> u32 {
        self.inner.page_address(page as u32) + HEADER_SIZE + address % self.page_size()
    }

    fn check(&self, address: u32, extent: usize) -> Result<(), FlashError> {
        if self.is_valid_address(address, extent) {
            Ok(())
        } else {
            Err(FlashError::out_of_range(address, extent, self.length()))
        }
    }

    fn check_page(&self, address: u32) -> Result<u16, FlashError> {
        if address < self.length() {
            Ok(self.address_page(address) as u16)
        } else {
            Err(FlashError::out_of_range(address, 0, self.length()))
        }
    }

    /// Body of `copy_page` once `new` has been allocated in the cache.
    fn relocate(
        &mut self,
        logical: u16,
        old: Option<u16>,
        new: u16,
        handler: &mut TransferHandler<'_>,
        scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        self.write_header(new, PageHeader::pending(logical))?;
        let size = self.page_size();
        match old {
            Some(old) => copy_page_between(
                &mut self.inner,
                old as u32,
                new as u32,
                HEADER_SIZE,
                size,
                handler,
                scratch,
            )?,
            None => {
                // nothing to copy from; the handler sees an erased page
                let base = self.inner.page_address(new as u32) + HEADER_SIZE;
                let mut offset = 0;
                while offset < size {
                    let count = (scratch.len() as u32).min(size - offset);
                    let chunk = &mut scratch[..count as usize];
                    chunk.fill(0xFF);
                    handler(offset, chunk);
                    self.inner.write_page(base + offset, chunk)?;
                    offset += count;
                }
            }
        }
        self.write_header(new, PageHeader::in_use(logical))
    }
}

impl<D: FlashDevice, R: PageRng> FlashDevice for LogicalPageMapper<D, R> {
    #[inline]
    fn page_size(&self) -> u32 {
        self.inner.page_size() - HEADER_SIZE
    }

    #[inline]
    fn page_count(&self) -> u32 {
        self.logical_pages
    }

    /// Erases the backing page right away. The logical page stays unbacked
    /// until it is written again.
    fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        if !self.is_page_address(address) {
            return Err(FlashError::Unaligned { address });
        }
        let logical = self.check_page(address)?;
        if let Some(page) = self.page_map[logical as usize] {
            let physical = self.inner.page_address(page as u32);
            self.inner.erase_page(physical)?;
            self.page_map[logical as usize] = None;
            self.states[page as usize] = PhysicalPageState::Free;
            trace!("logical page {} released physical page {}", logical, page);
        }
        Ok(())
    }

    fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        let page = self.fetch_allocate_page(self.address_page(address) as u16)?;
        let dest = self.physical_address(page, address);
        self.inner.write_page(dest, data)
    }

    /// Unbacked logical pages read as erased without allocating.
    fn read_page(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        match self.page_map.get(self.address_page(address) as usize).copied().flatten() {
            Some(page) => {
                let src = self.physical_address(page, address);
                self.inner.read_page(src, data)
            }
            None => {
                data.fill(0xFF);
                Ok(())
            }
        }
    }

    fn write_erase_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        let mut scratch = scratch_buffer();
        write_erase_relocating(self, address, data, &mut scratch[..])
    }

    /// Moves the logical page to a new physical page.
    ///
    /// The new page is marked pending, filled through `handler`, and brought
    /// online before the old header is cleared. Power loss at any point
    /// leaves either the old or the new page as the single in-use copy.
    fn copy_page(
        &mut self,
        address: u32,
        handler: &mut TransferHandler<'_>,
        scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        let logical = self.check_page(address)?;
        if scratch.is_empty() {
            return Err(FlashError::InvalidConfig("scratch buffer is empty"));
        }
        let old = self.page_map[logical as usize];
        let new = self.allocate_logical_page(logical, false)?;

        if let Err(err) = self.relocate(logical, old, new, handler, scratch) {
            // flash still holds the old page as the in-use copy
            self.page_map[logical as usize] = old;
            self.states[new as usize] = PhysicalPageState::Free;
            return Err(err);
        }

        if let Some(old) = old {
            self.write_header(old, PageHeader::STALE)?;
            self.states[old as usize] = PhysicalPageState::Free;
        }
        debug!("logical page {} moved from {:?} to {}", logical, old, new);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::RamFlash;

    /// Always starts the free page search at page 0.
    struct FirstFit;

    impl PageRng for FirstFit {
        fn next_u32(&mut self) -> u32 {
            0
        }
    }

    fn mapper(pages: u32, page_size: u32, logical: u32) -> LogicalPageMapper<RamFlash> {
        LogicalPageMapper::new(RamFlash::new(pages, page_size), MapperConfig::new(logical)).unwrap()
    }

    #[test]
    fn test_geometry() {
        let mapper = mapper(4, 4, 2);
        assert_eq!(mapper.page_count(), 2);
        assert_eq!(mapper.page_size(), 2);
        assert_eq!(mapper.physical_page_count(), 4);
    }

    #[test]
    fn test_formats_blank_device() {
        let mapper = mapper(4, 16, 2);
        assert_eq!(&mapper.inner().as_bytes()[48..50], &PageHeader::FORMAT_SIGNATURE.to_bytes());
        assert_eq!(mapper.free_page_count(), 3);
    }

    #[test]
    fn test_format_erases_dirty_pages() {
        let mut flash = RamFlash::new(4, 16);
        flash.write_page(20, &[0x00]).unwrap();
        let mapper = LogicalPageMapper::new(flash, MapperConfig::new(2)).unwrap();
        assert_eq!(mapper.inner().as_bytes()[20], 0xFF);
        assert_eq!(mapper.inner().erase_count(1), 1);
        assert_eq!(mapper.inner().erase_count(0), 0);
    }

    #[test]
    fn test_write_allocates_lazily() {
        let mut mapper = mapper(4, 16, 2);
        assert_eq!(mapper.physical_page_for(1), None);
        assert_eq!(mapper.read_byte(14).unwrap(), 0xFF);
        assert_eq!(mapper.physical_page_for(1), None);

        mapper.write_page(15, &[0x42]).unwrap();
        let page = mapper.physical_page_for(1).unwrap();
        assert_eq!(mapper.page_state(page), Some(PhysicalPageState::Allocated(1)));
        assert_eq!(mapper.read_byte(15).unwrap(), 0x42);
    }

    #[test]
    fn test_existing_device_keeps_mapping() {
        let mut mapper = mapper(5, 16, 3);
        mapper.write_erase_page(14, &[1, 2]).unwrap();
        let page = mapper.physical_page_for(1);

        let mut reopened = LogicalPageMapper::new(mapper.into_inner(), MapperConfig::new(3)).unwrap();
        assert_eq!(reopened.physical_page_for(1), page);
        let mut buf = [0u8; 2];
        reopened.read_page(14, &mut buf).unwrap();
        assert_eq!(buf, [1, 2]);
    }

    #[test]
    fn test_copy_page_moves_content() {
        let rng = FirstFit;
        let mut mapper =
            LogicalPageMapper::with_rng(RamFlash::new(4, 16), MapperConfig::new(2), rng).unwrap();
        mapper.write_page(0, &[0xAA, 0xBB]).unwrap();
        assert_eq!(mapper.physical_page_for(0), Some(0));

        let mut scratch = scratch_buffer();
        mapper
            .copy_page(0, &mut |_: u32, _: &mut [u8]| {}, &mut scratch[..])
            .unwrap();

        assert_eq!(mapper.physical_page_for(0), Some(1));
        assert_eq!(mapper.page_state(0), Some(PhysicalPageState::Free));
        let headers = mapper.headers().unwrap();
        assert_eq!(headers[0], PageHeader::STALE);
        assert_eq!(headers[1], PageHeader::in_use(0));

        let mut buf = [0u8; 2];
        mapper.read_page(0, &mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0xBB]);
    }

    #[test]
    fn test_write_erase_relocates_on_conflict() {
        let mut mapper = mapper(4, 16, 2);
        mapper.write_erase_page(0, &[0x00, 0x11, 0x22]).unwrap();
        let before = mapper.physical_page_for(0);
        mapper.write_erase_page(1, &[0xFF]).unwrap();
        assert_ne!(mapper.physical_page_for(0), before);

        let mut buf = [0u8; 3];
        mapper.read_page(0, &mut buf).unwrap();
        assert_eq!(buf, [0x00, 0xFF, 0x22]);
    }

    #[test]
    fn test_erase_releases_page() {
        let mut mapper = mapper(4, 16, 2);
        mapper.write_page(0, &[0]).unwrap();
        assert_eq!(mapper.free_page_count(), 2);
        mapper.erase_page(0).unwrap();
        assert_eq!(mapper.physical_page_for(0), None);
        assert_eq!(mapper.free_page_count(), 3);
        // erasing an unbacked page is a no-op
        mapper.erase_page(14).unwrap();
        assert!(mapper.erase_page(28).is_err());
        assert_eq!(mapper.erase_page(3), Err(FlashError::Unaligned { address: 3 }));
    }

    #[test]
    fn test_no_free_page() {
        let mut mapper = LogicalPageMapper::new(RamFlash::new(3, 8), MapperConfig::new(2)).unwrap();
        mapper.write_page(0, &[1]).unwrap();
        mapper.write_page(6, &[1]).unwrap();
        let mut scratch = scratch_buffer();
        assert_eq!(
            mapper.copy_page(0, &mut |_: u32, _: &mut [u8]| {}, &mut scratch[..]),
            Err(FlashError::NoFreePage)
        );
    }

    #[test]
    fn test_rebuild_ignores_pending_page() {
        let mut mapper = mapper(4, 16, 2);
        mapper.write_page(0, &[0x12]).unwrap();
        let page = mapper.physical_page_for(0).unwrap();
        let spare = (0..3u16).find(|&p| p != page).unwrap();

        // simulate a copy interrupted before the new page went online
        let pending = mapper.inner().page_address(spare as u32);
        mapper.inner_mut().write_page(pending, &PageHeader::pending(0).to_bytes()).unwrap();
        mapper.rebuild().unwrap();

        assert_eq!(mapper.physical_page_for(0), Some(page));
        assert_eq!(mapper.page_state(spare), Some(PhysicalPageState::Free));
        assert_eq!(mapper.read_byte(0).unwrap(), 0x12);
    }

    #[test]
    fn test_rebuild_retires_duplicate_claim() {
        let mut mapper = mapper(4, 16, 2);
        mapper.write_page(0, &[0x12]).unwrap();
        let page = mapper.physical_page_for(0).unwrap();
        let twin = (0..3u16).find(|&p| p != page).unwrap();

        // a copy interrupted after the new page went online
        let address = mapper.inner().page_address(twin as u32);
        mapper.inner_mut().write_page(address, &PageHeader::in_use(0).to_bytes()).unwrap();
        mapper.rebuild().unwrap();

        let (winner, loser) = (page.min(twin), page.max(twin));
        assert_eq!(mapper.physical_page_for(0), Some(winner));
        assert_eq!(mapper.page_state(loser), Some(PhysicalPageState::Free));
        assert_eq!(mapper.headers().unwrap()[loser as usize], PageHeader::STALE);
    }

    #[test]
    fn test_copy_rejects_empty_scratch() {
        let mut mapper = mapper(4, 16, 2);
        assert_eq!(
            mapper.copy_page(0, &mut |_: u32, _: &mut [u8]| {}, &mut []),
            Err(FlashError::InvalidConfig("scratch buffer is empty"))
        );
        assert_eq!(mapper.free_page_count(), 3);
    }

    #[test]
    fn test_config_rejected() {
        assert!(LogicalPageMapper::new(RamFlash::new(2, 16), MapperConfig::new(2)).is_err());
        assert!(LogicalPageMapper::new(RamFlash::new(4, 2), MapperConfig::new(2)).is_err());
        assert!(LogicalPageMapper::new(RamFlash::new(1, 16), MapperConfig::new(1)).is_err());
    }
}
