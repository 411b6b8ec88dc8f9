//! Append-only FIFO over a flash device.
//!
//! The buffer writes pages in order and wraps at the end of the device. A page
//! is erased right before the first byte is written at its start, so the
//! device needs no preparation. Pointers live in RAM only; a fresh buffer is
//! empty regardless of the device content.
//!
//! ```text
//!            read_pointer        write_pointer
//!                 ▼                    ▼
//! ┌────────┬──────┬─────────┬─────────┬──────┬────────┐
//! │        │ used │  used   │  used   │      │        │
//! └────────┴──────┴─────────┴─────────┴──────┴────────┘
//!  page 0    page 1          page 2     page 3
//! ```
//!
//! The bytes of the page holding `read_pointer` that precede it are not
//! counted as free, since writing into that page would require erasing it.

use crate::domain::error::FlashError;
use crate::domain::ports::FlashDevice;

/// FIFO byte buffer with the whole device as capacity.
#[derive(Debug)]
pub struct CircularBuffer<D> {
    flash: D,
    write_pointer: u32,
    read_pointer: u32,
    capacity: u32,
    size: u32,
}

impl<D: FlashDevice> CircularBuffer<D> {
    /// Create an empty buffer spanning the whole device.
    pub fn new(flash: D) -> Self {
        let capacity = flash.length();
        Self {
            flash,
            write_pointer: 0,
            read_pointer: 0,
            capacity,
            size: 0,
        }
    }

    /// Append all of `buf`, or nothing if it does not fit.
    ///
    /// Returns the number of bytes written: `buf.len()` or 0.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, FlashError> {
        self.write_impl(buf, true)
    }

    /// Append as much of `buf` as fits.
    pub fn write_soft(&mut self, buf: &[u8]) -> Result<usize, FlashError> {
        self.write_impl(buf, false)
    }

    /// Remove exactly `buf.len()` bytes, or nothing if fewer are buffered.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, FlashError> {
        self.read_impl(buf, true)
    }

    /// Remove up to `buf.len()` bytes.
    pub fn read_soft(&mut self, buf: &mut [u8]) -> Result<usize, FlashError> {
        self.read_impl(buf, false)
    }

    /// Number of bytes that can be read.
    #[inline]
    pub fn available(&self) -> usize {
        self.size as usize
    }

    /// Total size of the buffer in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Number of bytes that can be written.
    #[inline]
    pub fn free(&self) -> usize {
        (self.capacity - self.size - self.read_pointer % self.flash.page_size()) as usize
    }

    /// Borrow the underlying device.
    pub fn flash(&self) -> &D {
        &self.flash
    }

    /// Consume the buffer and return the underlying device.
    pub fn into_inner(self) -> D {
        self.flash
    }

    fn write_impl(&mut self, buf: &[u8], hard: bool) -> Result<usize, FlashError> {
        let space = self.free();
        let len = if buf.len() <= space {
            buf.len()
        } else if hard {
            return Ok(0);
        } else {
            space
        };

        let page_size = self.flash.page_size();
        let mut done = 0usize;
        while done < len {
            let offset = self.write_pointer % page_size;
            let count = ((page_size - offset) as usize).min(len - done);
            if offset == 0 {
                self.flash.erase_page(self.write_pointer)?;
            }
            self.flash.write_page(self.write_pointer, &buf[done..done + count])?;

            self.write_pointer += count as u32;
            if self.write_pointer == self.capacity {
                self.write_pointer = 0;
            }
            self.size += count as u32;
            done += count;
        }
        trace!("buffered {} bytes, {} available", len, self.size);
        Ok(len)
    }

    fn read_impl(&mut self, buf: &mut [u8], hard: bool) -> Result<usize, FlashError> {
        let len = if buf.len() <= self.size as usize {
            buf.len()
        } else if hard {
            return Ok(0);
        } else {
            self.size as usize
        };

        let page_size = self.flash.page_size();
        let mut done = 0usize;
        while done < len {
            let offset = self.read_pointer % page_size;
            let count = ((page_size - offset) as usize).min(len - done);
            self.flash.read_page(self.read_pointer, &mut buf[done..done + count])?;

            self.read_pointer += count as u32;
            if self.read_pointer == self.capacity {
                self.read_pointer = 0;
            }
            self.size -= count as u32;
            done += count;
        }
        Ok(len)
    }
}
