//! Infrastructure layer - storage primitives built on composed devices.
//!
//! This module provides the FIFO buffer, the cursor streams and the factory
//! functions that assemble the common adapter stacks.

mod circular_buffer;
pub mod devices;
pub mod stream;

pub use circular_buffer::CircularBuffer;
