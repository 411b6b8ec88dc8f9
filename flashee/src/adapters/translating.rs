//! Building blocks for layers that rewrite pages of an inner device.
//!
//! [`write_erase_relocating`] gives `write_erase_page` semantics to any layer
//! that can AND-write and relocate a page. [`copy_page_between`] moves page
//! content through a [`TransferHandler`] in scratch-sized chunks.

use crate::domain::error::FlashError;
use crate::domain::ports::{FlashDevice, TransferHandler};
use crate::domain::value_objects::ExcludeRegion;

/// Transfer handler that leaves every chunk untouched.
#[inline]
pub fn keep_chunk(_page_offset: u32, _chunk: &mut [u8]) {}

/// Write `data` at `address` so that it reads back exactly.
///
/// Each scratch-sized chunk is AND-written with `write_page` and read back.
/// On a mismatch the page is relocated with `copy_page`, leaving the rest of
/// the write range erased, and the chunk is retried. A chunk that still
/// differs after its relocation fails with [`FlashError::VerifyFailed`].
///
/// `address..address + data.len()` must lie within one page of `device`.
pub fn write_erase_relocating<D: FlashDevice + ?Sized>(
    device: &mut D,
    address: u32,
    data: &[u8],
    scratch: &mut [u8],
) -> Result<(), FlashError> {
    if scratch.is_empty() {
        return Err(FlashError::InvalidConfig("scratch buffer is empty"));
    }

    let page_offset = address % device.page_size();
    let end = page_offset + data.len() as u32;
    let mut offset = 0usize;
    let mut relocated_at = None;

    while offset < data.len() {
        let count = scratch.len().min(data.len() - offset);
        let dest = address + offset as u32;
        let chunk = &data[offset..offset + count];

        device.write_page(dest, chunk)?;
        device.read_page(dest, &mut scratch[..count])?;

        if scratch[..count] != *chunk {
            if relocated_at == Some(offset) {
                warn!("data at {:#x} still differs after relocation", dest);
                return Err(FlashError::VerifyFailed { address: dest });
            }

            let region = ExcludeRegion::new(page_offset + offset as u32, end);
            debug!(
                "relocating page of {:#x}, excluding [{}, {})",
                dest,
                region.start(),
                region.end()
            );
            device.copy_page(
                dest,
                &mut |chunk_offset: u32, chunk: &mut [u8]| region.erase_excluded(chunk_offset, chunk),
                scratch,
            )?;
            relocated_at = Some(offset);
            continue;
        }

        offset += count;
    }

    Ok(())
}

/// Copy `count` bytes starting at `page_offset` of page `src_page` to the same
/// offset of page `dest_page` on `flash`, passing every chunk through `handler`.
///
/// The handler sees offsets relative to `page_offset`. The destination is
/// AND-written, so it is normally erased beforehand.
pub fn copy_page_between<D: FlashDevice + ?Sized>(
    flash: &mut D,
    src_page: u32,
    dest_page: u32,
    page_offset: u32,
    count: u32,
    handler: &mut TransferHandler<'_>,
    scratch: &mut [u8],
) -> Result<(), FlashError> {
    if scratch.is_empty() {
        return Err(FlashError::InvalidConfig("scratch buffer is empty"));
    }

    let old_base = flash.page_address(src_page) + page_offset;
    let new_base = flash.page_address(dest_page) + page_offset;
    let mut offset = 0u32;
    while offset < count {
        let to_read = (scratch.len() as u32).min(count - offset);
        let chunk = &mut scratch[..to_read as usize];
        flash.read_page(old_base + offset, chunk)?;
        handler(offset, chunk);
        flash.write_page(new_base + offset, chunk)?;
        offset += to_read;
    }
    Ok(())
}
