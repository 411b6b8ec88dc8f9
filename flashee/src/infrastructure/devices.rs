//! Ready-made flash stacks.
//!
//! Each constructor carves a region out of a base device and wraps it in the
//! layers needed for one storage strategy:
//!
//! | Constructor | Stack | Erase cost of a rewrite |
//! |---|---|---|
//! | [`create_single_page_erase`] | `PageSpan(SinglePageWear(Region))` | two erases, one always on the swap page |
//! | [`create_wear_level_erase`] | `PageSpan(LogicalPageMapper(Region))` | one erase, spread over the free pages |
//! | [`create_address_erase`] | `PageSpan(MultiWrite(LogicalPageMapper(Region)))` | one erase every eighth rewrite of a byte |
//! | [`create_circular_buffer`] | `CircularBuffer(Region)` | one erase per page appended |

use crate::adapters::{
    FlashDeviceRegion, LogicalPageMapper, MultiWriteFlashStore, PageSpanFlashDevice, SinglePageWear,
};
use crate::domain::error::FlashError;
use crate::domain::ports::FlashDevice;
use crate::domain::value_objects::{DEFAULT_SEED, MapperConfig};
use crate::infrastructure::CircularBuffer;

/// Largest region a page mapper is built over by the factory.
pub const MAX_MAPPED_PAGES: u32 = 256;

/// Free pages reserved by default for wear leveling.
pub const DEFAULT_FREE_PAGES: u32 = 2;

/// Byte-addressable device with wear-leveled page erases.
pub type WearLevelDevice<D> = PageSpanFlashDevice<LogicalPageMapper<FlashDeviceRegion<D>>>;

/// Byte-addressable device that rewrites bytes in place and only erases
/// pages once a slot is exhausted.
pub type AddressEraseDevice<D> =
    PageSpanFlashDevice<MultiWriteFlashStore<LogicalPageMapper<FlashDeviceRegion<D>>>>;

/// Byte-addressable device that rewrites pages through a swap page.
pub type SinglePageEraseDevice<D> = PageSpanFlashDevice<SinglePageWear<FlashDeviceRegion<D>>>;

/// Parameters of a wear-leveled stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WearLevelConfig {
    start: u32,
    end: Option<u32>,
    free_pages: u32,
    seed: u32,
}

impl WearLevelConfig {
    /// Region `[start, end)` with the default number of free pages.
    pub const fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end: Some(end),
            free_pages: DEFAULT_FREE_PAGES,
            seed: DEFAULT_SEED,
        }
    }

    /// Region of [`MAX_MAPPED_PAGES`] pages beginning at `start`.
    pub const fn from_start(start: u32) -> Self {
        Self {
            start,
            end: None,
            free_pages: DEFAULT_FREE_PAGES,
            seed: DEFAULT_SEED,
        }
    }

    /// Number of physical pages kept free for relocation.
    pub const fn with_free_pages(mut self, free_pages: u32) -> Self {
        self.free_pages = free_pages;
        self
    }

    /// Seed for the free page search.
    pub const fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Start of the region.
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// Number of free pages.
    pub const fn free_pages(&self) -> u32 {
        self.free_pages
    }

    fn end_for(&self, page_size: u32) -> u32 {
        self.end
            .unwrap_or_else(|| self.start.saturating_add(MAX_MAPPED_PAGES * page_size))
    }
}

impl Default for WearLevelConfig {
    fn default() -> Self {
        Self::from_start(0)
    }
}

/// Carve `[start, end)` out of `flash`, requiring at least `min_page_count`
/// pages.
pub fn create_user_flash_region<D: FlashDevice>(
    flash: D,
    start: u32,
    end: u32,
    min_page_count: u32,
) -> Result<FlashDeviceRegion<D>, FlashError> {
    if end.saturating_sub(start) / flash.page_size() < min_page_count {
        return Err(FlashError::InvalidConfig("region has too few pages"));
    }
    FlashDeviceRegion::with_bounds(flash, start, end)
}

/// Pages are rewritten through a swap page at the end of the region.
pub fn create_single_page_erase<D: FlashDevice>(
    flash: D,
    start: u32,
    end: u32,
) -> Result<SinglePageEraseDevice<D>, FlashError> {
    let region = create_user_flash_region(flash, start, end, 2)?;
    Ok(PageSpanFlashDevice::new(SinglePageWear::new(region)?))
}

/// Page erases are spread over the region by a page mapper with
/// `free_pages` spare pages.
pub fn create_wear_level_erase<D: FlashDevice>(
    flash: D,
    start: u32,
    end: u32,
    free_pages: u32,
) -> Result<WearLevelDevice<D>, FlashError> {
    let config = WearLevelConfig::new(start, end).with_free_pages(free_pages);
    create_wear_level_erase_with(flash, &config)
}

/// [`create_wear_level_erase`] with a full configuration.
pub fn create_wear_level_erase_with<D: FlashDevice>(
    flash: D,
    config: &WearLevelConfig,
) -> Result<WearLevelDevice<D>, FlashError> {
    Ok(PageSpanFlashDevice::new(create_mapper(flash, config)?))
}

/// Bytes are rewritten in redundant slots; pages are relocated by a page
/// mapper once a slot runs out.
pub fn create_address_erase<D: FlashDevice>(
    flash: D,
    start: u32,
    end: u32,
    free_pages: u32,
) -> Result<AddressEraseDevice<D>, FlashError> {
    let config = WearLevelConfig::new(start, end).with_free_pages(free_pages);
    create_address_erase_with(flash, &config)
}

/// [`create_address_erase`] with a full configuration.
pub fn create_address_erase_with<D: FlashDevice>(
    flash: D,
    config: &WearLevelConfig,
) -> Result<AddressEraseDevice<D>, FlashError> {
    let mapper = create_mapper(flash, config)?;
    Ok(PageSpanFlashDevice::new(MultiWriteFlashStore::new(mapper)))
}

/// FIFO over `[start, end)`, which must hold at least two pages.
pub fn create_circular_buffer<D: FlashDevice>(
    flash: D,
    start: u32,
    end: u32,
) -> Result<CircularBuffer<FlashDeviceRegion<D>>, FlashError> {
    let region = create_user_flash_region(flash, start, end, 2)?;
    Ok(CircularBuffer::new(region))
}

fn create_mapper<D: FlashDevice>(
    flash: D,
    config: &WearLevelConfig,
) -> Result<LogicalPageMapper<FlashDeviceRegion<D>>, FlashError> {
    let end = config.end_for(flash.page_size());
    let pages = end.saturating_sub(config.start) / flash.page_size();
    if config.free_pages < 2 || config.free_pages >= pages {
        return Err(FlashError::InvalidConfig(
            "free pages must be at least 2 and fewer than the region pages",
        ));
    }
    let region = create_user_flash_region(flash, config.start, end, 1)?;
    let pages = region.page_count();
    if pages > MAX_MAPPED_PAGES {
        return Err(FlashError::InvalidConfig("wear leveled region is limited to 256 pages"));
    }
    let mapper_config = MapperConfig::with_free_pages(pages, config.free_pages)
        .ok_or(FlashError::InvalidConfig("region leaves fewer than 2 logical pages"))?
        .with_seed(config.seed);
    debug!(
        "mapping {} logical pages over {} physical pages",
        mapper_config.logical_pages(),
        pages
    );
    LogicalPageMapper::new(region, mapper_config)
}
