//! Source of start positions for free page searches.

/// Picks where the logical page mapper starts looking for a free page.
///
/// The mapper only uses the value modulo its physical page count, so the
/// quality of the generator only affects how evenly erases spread.
pub trait PageRng {
    /// Next pseudo-random value.
    fn next_u32(&mut self) -> u32;
}

impl<R: PageRng + ?Sized> PageRng for &mut R {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        (**self).next_u32()
    }
}

/// Marsaglia xorshift generator with a 32-bit state.
#[derive(Debug, Clone)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    /// Create a generator. A zero seed is replaced by a fixed non-zero one.
    pub const fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x2545_F491 } else { seed },
        }
    }
}

impl Default for XorShift32 {
    fn default() -> Self {
        Self::new(0)
    }
}

impl PageRng for XorShift32 {
    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}
