//! Redundant byte storage that postpones page erases.
//!
//! Every logical byte occupies an 8-byte slot on the inner device (see
//! [`slot`](crate::domain::value_objects::slot)), so a byte can be rewritten
//! with arbitrary values up to seven times before its page has to be
//! relocated. Relocation goes through the inner device's `copy_page`, which
//! normally is a [`LogicalPageMapper`](super::LogicalPageMapper).
//!
//! ```text
//! logical page n:  b0        b1        b2       ...
//!                  │         │         │
//! inner page n:    [slot 0 ] [slot 1 ] [slot 2 ] ...
//!                  8 bytes   8 bytes   8 bytes
//! ```

use crate::domain::error::FlashError;
use crate::domain::ports::{FlashDevice, SCRATCH_SIZE, TransferHandler, scratch_buffer};
use crate::domain::value_objects::ExcludeRegion;
use crate::domain::value_objects::slot::{
    SLOT_SIZE, SLOT_SIZE_SHIFT, compact_slot, read_slot, write_slot,
};

/// Logical bytes handled per scratch buffer.
const SLOTS_PER_CHUNK: usize = SCRATCH_SIZE >> SLOT_SIZE_SHIFT;

/// Stores each logical byte in an 8-byte slot of the inner device.
///
/// The inner device must provide `copy_page` for `write_erase_page` to
/// recover from an exhausted slot.
#[derive(Debug)]
pub struct MultiWriteFlashStore<D> {
    inner: D,
}

impl<D: FlashDevice> MultiWriteFlashStore<D> {
    /// Wrap a device. Its page size should be a multiple of 8; any remainder
    /// is left unused.
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    /// Borrow the inner device.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Mutably borrow the inner device.
    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    /// Consume the store and return the inner device.
    pub fn into_inner(self) -> D {
        self.inner
    }

    /// Inner address of the slot holding logical byte `address`.
    #[inline]
    fn to_inner_address(&self, address: u32) -> u32 {
        let size = self.page_size();
        self.inner.page_address(address / size) + ((address % size) << SLOT_SIZE_SHIFT)
    }

    fn check(&self, address: u32, extent: usize) -> Result<(), FlashError> {
        if self.is_valid_address(address, extent) {
            Ok(())
        } else {
            Err(FlashError::out_of_range(address, extent, self.length()))
        }
    }

    /// Compact the page containing `address`, leaving the slots of logical
    /// offsets `[start, end)` within that page erased.
    fn compact_page(
        &mut self,
        address: u32,
        start: u32,
        end: u32,
        scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        let region = ExcludeRegion::new(start << SLOT_SIZE_SHIFT, end << SLOT_SIZE_SHIFT);
        let inner_address = self.to_inner_address(address);
        debug!("compacting slots of page {}", self.address_page(address));
        self.inner.copy_page(
            inner_address,
            &mut |page_offset: u32, chunk: &mut [u8]| {
                let whole = chunk.len() & !(SLOT_SIZE - 1);
                for (i, slot) in chunk[..whole].chunks_exact_mut(SLOT_SIZE).enumerate() {
                    if region.is_excluded(page_offset + (i * SLOT_SIZE) as u32) {
                        slot.fill(0xFF);
                    } else {
                        compact_slot(slot);
                    }
                }
            },
            scratch,
        )
    }
}

impl<D: FlashDevice> FlashDevice for MultiWriteFlashStore<D> {
    #[inline]
    fn page_size(&self) -> u32 {
        self.inner.page_size() >> SLOT_SIZE_SHIFT
    }

    #[inline]
    fn page_count(&self) -> u32 {
        self.inner.page_count()
    }

    fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        if !self.is_page_address(address) {
            return Err(FlashError::Unaligned { address });
        }
        self.check(address, 0)?;
        let inner_address = self.to_inner_address(address);
        self.inner.erase_page(inner_address)
    }

    /// ANDs each byte into the current position of its slot, which gives raw
    /// flash semantics at the logical level.
    fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        let mut buf = scratch_buffer();
        for (index, values) in data.chunks(SLOTS_PER_CHUNK).enumerate() {
            let dest = self.to_inner_address(address + (index * SLOTS_PER_CHUNK) as u32);
            let raw = &mut buf[..values.len() << SLOT_SIZE_SHIFT];
            self.inner.read_page(dest, raw)?;
            for (slot, &value) in raw.chunks_exact_mut(SLOT_SIZE).zip(values) {
                write_slot(value, slot, true);
            }
            self.inner.write_page(dest, raw)?;
        }
        Ok(())
    }

    fn read_page(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        let mut buf = scratch_buffer();
        for (index, values) in data.chunks_mut(SLOTS_PER_CHUNK).enumerate() {
            let dest = self.to_inner_address(address + (index * SLOTS_PER_CHUNK) as u32);
            let raw = &mut buf[..values.len() << SLOT_SIZE_SHIFT];
            self.inner.read_page(dest, raw)?;
            for (value, slot) in values.iter_mut().zip(raw.chunks_exact(SLOT_SIZE)) {
                *value = read_slot(slot);
            }
        }
        Ok(())
    }

    /// Stores each byte in a fresh slot position where needed. When a slot is
    /// exhausted the page is compacted through the inner `copy_page` and the
    /// write resumes at the first byte that did not fit.
    fn write_erase_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.check(address, data.len())?;
        let page_offset = address % self.page_size();
        let end = page_offset + data.len() as u32;
        let mut buf = scratch_buffer();
        let mut offset = 0usize;
        let mut compacted_at = None;

        while offset < data.len() {
            let count = SLOTS_PER_CHUNK.min(data.len() - offset);
            let dest = self.to_inner_address(address + offset as u32);
            let raw = &mut buf[..count << SLOT_SIZE_SHIFT];
            self.inner.read_page(dest, raw)?;

            let mut stored = 0;
            for (slot, &value) in raw.chunks_exact_mut(SLOT_SIZE).zip(&data[offset..offset + count]) {
                if !write_slot(value, slot, false) {
                    break;
                }
                stored += 1;
            }

            if stored == count {
                self.inner.write_page(dest, raw)?;
                offset += count;
                continue;
            }

            // keep the slots already updated, then make room for the rest
            if stored > 0 {
                self.inner.write_page(dest, &raw[..stored << SLOT_SIZE_SHIFT])?;
            }
            let failed = offset + stored;
            if compacted_at == Some(failed) {
                warn!("slot {:#x} exhausted after compaction", address + failed as u32);
                return Err(FlashError::VerifyFailed {
                    address: address + failed as u32,
                });
            }
            self.compact_page(
                address + failed as u32,
                page_offset + failed as u32,
                end,
                &mut buf[..],
            )?;
            compacted_at = Some(failed);
            offset = failed;
        }

        Ok(())
    }

    /// Relocates the page through the inner device, normalizing every slot
    /// and passing each decoded byte through `handler` one at a time.
    fn copy_page(
        &mut self,
        address: u32,
        handler: &mut TransferHandler<'_>,
        scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        self.check(address, 0)?;
        let inner_address = self.to_inner_address(address);
        self.inner.copy_page(
            inner_address,
            &mut |page_offset: u32, chunk: &mut [u8]| {
                let first = page_offset >> SLOT_SIZE_SHIFT;
                let whole = chunk.len() & !(SLOT_SIZE - 1);
                for (i, slot) in chunk[..whole].chunks_exact_mut(SLOT_SIZE).enumerate() {
                    let mut value = [read_slot(slot)];
                    slot.fill(0xFF);
                    handler(first + i as u32, &mut value);
                    write_slot(value[0], slot, false);
                }
            },
            scratch,
        )
    }
}
