//! Ports define the interfaces between the domain and the outside world.
//!
//! [`FlashDevice`] is the driven port every leaf driver implements and every
//! adapter both consumes and implements. [`PageRng`] lets callers control the
//! free page selection of the logical page mapper.

mod flash_device;
mod page_rng;

pub use flash_device::{FlashDevice, SCRATCH_SIZE, ScratchBuffer, TransferHandler, scratch_buffer};
pub use page_rng::{PageRng, XorShift32};
