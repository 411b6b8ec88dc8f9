//! Logical page mapper configuration value object.

use super::page_header::MAX_LOGICAL_PAGES;

/// Configuration for a [`LogicalPageMapper`](crate::adapters::LogicalPageMapper).
///
/// The mapper exposes `logical_pages` pages and keeps the remaining physical
/// pages (minus the reserved signature page) free for relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapperConfig {
    logical_pages: u32,
    seed: u32,
}

/// Seed used when none is given.
pub const DEFAULT_SEED: u32 = 0x2545_F491;

impl MapperConfig {
    /// Create a configuration exposing `logical_pages` pages.
    ///
    /// # Panics
    /// Panics if `logical_pages` is 0 or larger than the header can address.
    pub const fn new(logical_pages: u32) -> Self {
        assert!(
            logical_pages >= 1 && logical_pages <= MAX_LOGICAL_PAGES,
            "logical_pages must be between 1 and 16384"
        );
        Self {
            logical_pages,
            seed: DEFAULT_SEED,
        }
    }

    /// Use a specific seed for the free page selection.
    ///
    /// A seed of 0 is replaced by the default, since the generator would
    /// otherwise stay at 0 forever.
    pub const fn with_seed(mut self, seed: u32) -> Self {
        self.seed = if seed == 0 { DEFAULT_SEED } else { seed };
        self
    }

    /// Configuration leaving `free_pages` physical pages unmapped out of
    /// `physical_pages` (the reserved signature page counts as free).
    ///
    /// Returns `None` when that would leave fewer than 2 logical pages or no
    /// spare page.
    pub const fn with_free_pages(physical_pages: u32, free_pages: u32) -> Option<Self> {
        if free_pages < 2 || free_pages >= physical_pages {
            return None;
        }
        let logical_pages = physical_pages - free_pages;
        if logical_pages < 2 || logical_pages > MAX_LOGICAL_PAGES {
            return None;
        }
        Some(Self::new(logical_pages))
    }

    /// Number of logical pages exposed.
    #[inline]
    pub const fn logical_pages(&self) -> u32 {
        self.logical_pages
    }

    /// Seed for the free page selection.
    #[inline]
    pub const fn seed(&self) -> u32 {
        self.seed
    }
}
