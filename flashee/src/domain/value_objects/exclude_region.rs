//! Byte range left blank while a page is copied.

/// A half-open range `[start, end)` of page offsets that a copy must not
/// carry over.
///
/// Writes that need a relocation exclude the bytes they are about to write,
/// so the destination page holds erased bytes there and the retried write is
/// a plain AND-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExcludeRegion {
    start: u32,
    end: u32,
}

impl ExcludeRegion {
    /// Create a new exclusion range.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// First excluded offset.
    #[inline]
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// First offset past the range.
    #[inline]
    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Whether `offset` falls inside the range.
    #[inline]
    pub const fn is_excluded(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Reset every excluded byte of a chunk that starts at `page_offset` to `0xFF`.
    pub fn erase_excluded(&self, page_offset: u32, chunk: &mut [u8]) {
        let chunk_end = page_offset + chunk.len() as u32;
        let from = self.start.max(page_offset);
        let to = self.end.min(chunk_end);
        if from < to {
            chunk[(from - page_offset) as usize..(to - page_offset) as usize].fill(0xFF);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_excluded_half_open() {
        let region = ExcludeRegion::new(4, 8);
        assert!(!region.is_excluded(3));
        assert!(region.is_excluded(4));
        assert!(region.is_excluded(7));
        assert!(!region.is_excluded(8));
    }

    #[test]
    fn test_erase_excluded_intersects_chunk() {
        let region = ExcludeRegion::new(6, 20);
        let mut chunk = [0u8; 8];
        region.erase_excluded(4, &mut chunk);
        assert_eq!(chunk, [0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_erase_excluded_disjoint_chunk_untouched() {
        let region = ExcludeRegion::new(16, 20);
        let mut chunk = [0u8; 8];
        region.erase_excluded(0, &mut chunk);
        assert_eq!(chunk, [0u8; 8]);
    }
}
