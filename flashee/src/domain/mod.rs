//! Domain layer - flash semantics with zero infrastructure dependencies.
//!
//! The domain layer contains:
//! - **Ports**: the [`FlashDevice`] contract and the [`PageRng`] seam
//! - **Value Objects**: on-flash encodings (page headers, multi-write slots)
//!   and adapter configuration
//! - **Entities**: the per-physical-page state tracked by the page mapper
//! - **Domain Errors**: [`FlashError`]
//!
//! # Hexagonal Architecture
//!
//! ```text
//!     ┌──────────────────────────────────┐
//!     │      Domain Layer (Core)         │
//!     │                                  │
//!     │  ┌────────────────────────────┐  │
//!     │  │  Entities & Value Objects  │  │
//!     │  │  - PageHeader, slot, ...   │  │
//!     │  └────────────────────────────┘  │
//!     │              │                   │
//!     │              ▼                   │
//!     │  ┌────────────────────────────┐  │
//!     │  │    Ports (Interfaces)      │  │
//!     │  │    - FlashDevice           │  │
//!     │  └────────────────────────────┘  │
//!     └──────────────────────────────────┘
//!                    ▲
//!                    │ implemented by
//!                    │
//!     ┌──────────────────────────────────┐
//!     │      Adapter Layer               │
//!     │  - RamFlash, NorFlashAdapter     │
//!     │  - Region, PageSpan, MultiWrite  │
//!     │  - LogicalPageMapper             │
//!     └──────────────────────────────────┘
//! ```

pub mod entities;
pub mod value_objects;
pub mod ports;
pub mod error;

// Re-export commonly used types
pub use entities::PhysicalPageState;
pub use value_objects::{
    DEFAULT_SEED, ExcludeRegion, HEADER_SIZE, HeaderState, MAX_LOGICAL_PAGES, MapperConfig,
    PageHeader,
};
pub use ports::{FlashDevice, PageRng, SCRATCH_SIZE, ScratchBuffer, TransferHandler, XorShift32, scratch_buffer};
pub use error::FlashError;
