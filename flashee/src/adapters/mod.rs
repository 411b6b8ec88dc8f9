//! Adapter layer - flash devices built on other flash devices.
//!
//! Every adapter implements [`FlashDevice`](crate::FlashDevice) and wraps an
//! inner device, so stacks are composed by plain generic nesting:
//!
//! ```text
//!     ┌──────────────────────────────────┐
//!     │  PageSpanFlashDevice             │  byte addressing across pages
//!     └────────────┬─────────────────────┘
//!                  ▼
//!     ┌──────────────────────────────────┐
//!     │  MultiWriteFlashStore            │  8-byte slots per logical byte
//!     └────────────┬─────────────────────┘
//!                  ▼
//!     ┌──────────────────────────────────┐
//!     │  LogicalPageMapper               │  wear-leveled page relocation
//!     └────────────┬─────────────────────┘
//!                  ▼
//!     ┌──────────────────────────────────┐
//!     │  FlashDeviceRegion               │  [base, end) of the device
//!     └────────────┬─────────────────────┘
//!                  ▼
//!     ┌──────────────────────────────────┐
//!     │  RamFlash / NorFlashAdapter      │  leaf driver
//!     └──────────────────────────────────┘
//! ```
//!
//! # Available Adapters
//!
//! - **`RamFlash`**: In-memory flash with erase and AND-write semantics
//! - **`NorFlashAdapter`**: Leaf over `embedded-storage` NOR flash (feature `embedded-storage`)
//! - **`ForwardingFlashDevice`**: Bounds-checked pass-through
//! - **`FlashDeviceRegion`**: Page-aligned window of a device
//! - **`PageSpanFlashDevice`**: Splits accesses at page boundaries
//! - **`MultiWriteFlashStore`**: Rewrites bytes without erasing
//! - **`LogicalPageMapper`**: Logical to physical page mapping
//! - **`SinglePageWear`**: Page rewrites through a swap page

mod forwarding;
mod multi_write;
mod page_mapper;
mod page_span;
mod ram_flash;
mod region;
mod single_page_wear;
pub mod translating;

#[cfg(feature = "embedded-storage")]
mod nor_flash_adapter;

pub use forwarding::ForwardingFlashDevice;
pub use multi_write::MultiWriteFlashStore;
pub use page_mapper::LogicalPageMapper;
pub use page_span::PageSpanFlashDevice;
pub use ram_flash::RamFlash;
pub use region::FlashDeviceRegion;
pub use single_page_wear::SinglePageWear;

#[cfg(feature = "embedded-storage")]
pub use nor_flash_adapter::{NOR_FLASH_SECTOR_SIZE, NorFlashAdapter, NorFlashConfig};
