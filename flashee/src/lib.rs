//! Composable flash storage adapters.
//!
//! Raw flash can only be erased a page at a time and written by clearing
//! bits. This crate stacks adapters on such a device to get byte-addressable
//! storage, wear-leveled page erases, bytes that can be rewritten without an
//! erase, and an append-only circular buffer.
//!
//! # Architecture
//!
//! The crate is organized into three layers:
//!
//! ## Domain Layer (`domain`)
//! Flash semantics with no infrastructure dependencies:
//! - **Ports**: `FlashDevice` contract, `PageRng` seam
//! - **Value Objects**: `PageHeader`, multi-write `slot` encoding, `MapperConfig`, `ExcludeRegion`
//! - **Entities**: `PhysicalPageState`
//!
//! ## Adapter Layer (`adapters`)
//! Devices implemented on top of other devices:
//! - **Leaves**: `RamFlash`, `NorFlashAdapter` (feature `embedded-storage`)
//! - **Translation**: `FlashDeviceRegion`, `ForwardingFlashDevice`, `PageSpanFlashDevice`
//! - **Erase avoidance**: `MultiWriteFlashStore`, `LogicalPageMapper`, `SinglePageWear`
//!
//! ## Infrastructure Layer (`infrastructure`)
//! Storage primitives built on composed devices:
//! - `CircularBuffer`
//! - `FlashReader` / `FlashWriter` streams
//! - `devices` factory for the common stacks
//!
//! # Quick Start
//!
//! ```
//! use flashee::adapters::RamFlash;
//! use flashee::infrastructure::devices::create_address_erase;
//! use flashee::FlashDevice;
//!
//! let flash = RamFlash::new(64, 4096);
//! let mut eeprom = create_address_erase(flash, 0, 64 * 4096, 4)?;
//!
//! eeprom.write(100, b"hello")?;
//! eeprom.write(100, b"world")?;
//!
//! let mut buf = [0u8; 5];
//! eeprom.read(100, &mut buf)?;
//! assert_eq!(&buf, b"world");
//! # Ok::<(), flashee::FlashError>(())
//! ```
//!
//! # Features
//!
//! - `std`: Enable `std` support in `embedded-io`
//! - `embedded-storage`: Enable `NorFlashAdapter` over `embedded-storage` NOR flash
//! - `log`: Enable logging support
//! - `defmt`: Enable defmt logging for embedded

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

#[macro_use]
mod fmt;

// Core layers
pub mod domain;
pub mod adapters;
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    FlashDevice, FlashError, HeaderState, MapperConfig, PageHeader, PageRng, PhysicalPageState,
    SCRATCH_SIZE, ScratchBuffer, TransferHandler, XorShift32, scratch_buffer,
};

pub use adapters::{
    FlashDeviceRegion, ForwardingFlashDevice, LogicalPageMapper, MultiWriteFlashStore,
    PageSpanFlashDevice, RamFlash, SinglePageWear,
};

#[cfg(feature = "embedded-storage")]
pub use adapters::{NOR_FLASH_SECTOR_SIZE, NorFlashAdapter, NorFlashConfig};

// Infrastructure layer exports
pub use infrastructure::CircularBuffer;
pub use infrastructure::devices::{
    AddressEraseDevice, SinglePageEraseDevice, WearLevelConfig, WearLevelDevice,
    create_address_erase, create_circular_buffer, create_single_page_erase,
    create_user_flash_region, create_wear_level_erase,
};
pub use infrastructure::stream::{FlashReader, FlashWriter};

// Re-export embedded_io for convenience
pub use embedded_io;
