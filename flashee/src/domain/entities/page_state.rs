//! In-memory state of a physical page behind the logical page mapper.

/// Allocation state of a physical page.
///
/// This is a cache of what the page header on flash says; the mapper
/// rebuilds it from the headers whenever it is constructed or asked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhysicalPageState {
    /// Available for allocation. Its content may still need an erase.
    #[default]
    Free,
    /// Backs the given logical page.
    Allocated(u16),
}

impl PhysicalPageState {
    /// Check if the page is in use.
    #[inline]
    pub const fn is_in_use(&self) -> bool {
        matches!(self, PhysicalPageState::Allocated(_))
    }

    /// Check if the page is free.
    #[inline]
    pub const fn is_free(&self) -> bool {
        matches!(self, PhysicalPageState::Free)
    }

    /// Logical page backed by this page, if any.
    #[inline]
    pub const fn logical_page(&self) -> Option<u16> {
        match self {
            PhysicalPageState::Allocated(page) => Some(*page),
            PhysicalPageState::Free => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_state_checks() {
        let free = PhysicalPageState::Free;
        assert!(free.is_free());
        assert!(!free.is_in_use());
        assert_eq!(free.logical_page(), None);

        let allocated = PhysicalPageState::Allocated(3);
        assert!(allocated.is_in_use());
        assert!(!allocated.is_free());
        assert_eq!(allocated.logical_page(), Some(3));
    }

    #[test]
    fn test_page_state_default() {
        assert_eq!(PhysicalPageState::default(), PhysicalPageState::Free);
    }
}
