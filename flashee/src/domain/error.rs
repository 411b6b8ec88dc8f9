//! Domain-level errors.
//!
//! Every layer of a flash stack reports failures through [`FlashError`]. The
//! variants follow the taxonomy of the layer: invalid arguments are detected
//! before any flash state changes, device failures are propagated from the
//! leaf driver unchanged, and redundancy exhaustion is normally recovered
//! internally and only surfaces when the recovery itself fails.

use core::fmt;

/// Errors that can occur in a flash device stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum FlashError {
    /// The address range does not fit the device (or crosses a page boundary
    /// on a layer that forbids spanning).
    OutOfRange {
        /// First byte of the requested range.
        address: u32,
        /// Length of the requested range.
        length: u32,
        /// Capacity of the device in bytes.
        capacity: u32,
    },

    /// An erase or region bound was not on a page boundary.
    Unaligned {
        /// The offending address.
        address: u32,
    },

    /// A subregion request was malformed.
    InvalidRegion {
        /// Requested start (inclusive).
        start: u32,
        /// Requested end (exclusive).
        end: u32,
    },

    /// Parameters used to build a device were rejected.
    InvalidConfig(&'static str),

    /// The layer does not provide this operation.
    Unsupported(&'static str),

    /// The page mapper has no free physical page left to allocate.
    NoFreePage,

    /// Data read back after a relocation still differs from what was written.
    VerifyFailed {
        /// Logical address of the first byte of the failing chunk.
        address: u32,
    },

    /// The circular buffer cannot accept any more data.
    BufferFull,

    /// The underlying flash driver reported a failure.
    Device(&'static str),
}

impl FlashError {
    /// Shorthand for a range check failure.
    #[inline]
    pub(crate) const fn out_of_range(address: u32, length: usize, capacity: u32) -> Self {
        Self::OutOfRange {
            address,
            length: length as u32,
            capacity,
        }
    }
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                address,
                length,
                capacity,
            } => write!(
                f,
                "Range {:#x}+{} is outside the device ({} bytes) or spans a page",
                address, length, capacity
            ),
            Self::Unaligned { address } => {
                write!(f, "Address {:#x} is not on a page boundary", address)
            }
            Self::InvalidRegion { start, end } => {
                write!(f, "Invalid region [{:#x}, {:#x})", start, end)
            }
            Self::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Self::Unsupported(op) => write!(f, "Operation not supported: {}", op),
            Self::NoFreePage => write!(f, "No free physical page available"),
            Self::VerifyFailed { address } => {
                write!(f, "Data at {:#x} does not match after relocation", address)
            }
            Self::BufferFull => write!(f, "Circular buffer is full"),
            Self::Device(msg) => write!(f, "Flash device error: {}", msg),
        }
    }
}

impl core::error::Error for FlashError {}

impl embedded_io::Error for FlashError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::OutOfRange { .. } | Self::Unaligned { .. } | Self::InvalidRegion { .. } => {
                embedded_io::ErrorKind::InvalidInput
            }
            Self::InvalidConfig(_) => embedded_io::ErrorKind::InvalidInput,
            Self::Unsupported(_) => embedded_io::ErrorKind::Unsupported,
            Self::NoFreePage | Self::BufferFull => embedded_io::ErrorKind::OutOfMemory,
            Self::VerifyFailed { .. } => embedded_io::ErrorKind::InvalidData,
            Self::Device(_) => embedded_io::ErrorKind::Other,
        }
    }
}
