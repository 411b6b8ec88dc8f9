//! On-flash physical page header used by the logical page mapper.

use core::fmt;

/// Size of the header at the start of every physical page, in bytes.
pub const HEADER_SIZE: u32 = 2;

/// Largest number of logical pages a header can address.
pub const MAX_LOGICAL_PAGES: u32 = LOGICAL_MASK as u32 + 1;

const LOGICAL_MASK: u16 = 0x3FFF;
const TAG_SHIFT: u16 = 14;
const TAG_IN_USE: u16 = 0b01;
const TAG_PENDING: u16 = 0b11;

/// The 2-byte header stored little-endian at the start of each physical page.
///
/// Bits `[15:14]` are the in-use tag and bits `[13:0]` the logical page the
/// physical page backs. Every transition only clears bits, so each one is a
/// plain AND-write:
///
/// ```text
/// 0xFFFF ──► 0xC000|n ──► 0x4000|n ──► 0x0000
/// erased     pending      in use       stale
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageHeader(u16);

/// Decoded meaning of a [`PageHeader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaderState {
    /// Never written since the last erase.
    Erased,
    /// Copy target that has not been brought online yet.
    Pending(u16),
    /// Backs the given logical page.
    InUse(u16),
    /// Discarded, waiting for an erase.
    Stale,
}

impl PageHeader {
    /// Header of a freshly erased page.
    pub const ERASED: Self = Self(0xFFFF);

    /// Header of a discarded page.
    pub const STALE: Self = Self(0x0000);

    /// Signature written to the reserved page once the device is formatted.
    pub const FORMAT_SIGNATURE: Self = Self(0x2FFF);

    /// Wrap a raw header value.
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Header marking a page as backing `logical`.
    #[inline]
    pub const fn in_use(logical: u16) -> Self {
        Self((TAG_IN_USE << TAG_SHIFT) | (logical & LOGICAL_MASK))
    }

    /// Header marking a page as a copy target for `logical`.
    #[inline]
    pub const fn pending(logical: u16) -> Self {
        Self((TAG_PENDING << TAG_SHIFT) | (logical & LOGICAL_MASK))
    }

    /// Decode from the first two bytes of a page.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }

    /// Encode for writing to flash.
    #[inline]
    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    /// Raw header value.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Logical page stored in the low 14 bits.
    #[inline]
    pub const fn logical_page(self) -> u16 {
        self.0 & LOGICAL_MASK
    }

    /// Whether the tag marks the page as in use.
    ///
    /// `00` (stale) and `11` (erased or pending) both read as not in use, so
    /// a freshly erased page never looks allocated.
    #[inline]
    pub const fn is_in_use(self) -> bool {
        self.0 >> TAG_SHIFT == TAG_IN_USE
    }

    /// Whether the page has not been written since its last erase.
    #[inline]
    pub const fn is_erased(self) -> bool {
        self.0 == Self::ERASED.0
    }

    /// Decode the header.
    pub const fn state(self) -> HeaderState {
        if self.is_erased() {
            HeaderState::Erased
        } else if self.is_in_use() {
            HeaderState::InUse(self.logical_page())
        } else if self.0 >> TAG_SHIFT == TAG_PENDING {
            HeaderState::Pending(self.logical_page())
        } else {
            HeaderState::Stale
        }
    }
}

impl fmt::Display for PageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state() {
            HeaderState::Erased => write!(f, "erased"),
            HeaderState::Pending(n) => write!(f, "pending({})", n),
            HeaderState::InUse(n) => write!(f, "in-use({})", n),
            HeaderState::Stale if *self == Self::FORMAT_SIGNATURE => write!(f, "signature"),
            HeaderState::Stale => write!(f, "stale({:#06x})", self.0),
        }
    }
}
