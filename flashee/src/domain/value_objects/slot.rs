//! Redundant multi-write slots.
//!
//! A slot is 8 bytes of flash storing a single logical byte. Byte 0 is a
//! bitmap; bit N is cleared once `slot[N]` holds a value, and the lowest set
//! bit marks the current one. An erased slot (all `0xFF`) reads as `0xFF`.
//!
//! ```text
//! bitmap   slot[1..8]                  current
//! 0xFF     -- -- -- -- -- -- --        0xFF (never written)
//! 0xFE     a  -- -- -- -- -- --        a
//! 0xFC     a  b  -- -- -- -- --        b
//! 0x80     a  b  c  d  e  f  g         g   (full)
//! ```
//!
//! Writing a value that only clears bits of the current one reuses the same
//! position, so only "destructive" writes consume a position.

/// Bytes of flash per slot.
pub const SLOT_SIZE: usize = 8;

/// `log2(SLOT_SIZE)`, used to convert between logical and slot addresses.
pub const SLOT_SIZE_SHIFT: u32 = 3;

/// Number of value positions in a slot.
pub const DATA_BYTES_PER_SLOT: usize = 7;

/// Index of the position holding the current value.
///
/// Returns 0 for an uninitialized slot (the bitmap itself, `0xFF`) and 8 for
/// a bitmap with every bit cleared.
#[inline]
pub fn current_index(bitmap: u8) -> usize {
    bitmap.trailing_zeros() as usize
}

/// Read the current value of a slot.
pub fn read_slot(slot: &[u8]) -> u8 {
    let bitmap = slot[0];
    if bitmap == 0 {
        return 0;
    }
    slot[current_index(bitmap)]
}

/// Store `value` in a slot.
///
/// Returns `false` when every position has been consumed and `value` is not a
/// bit subset of the current value; the slot is left untouched in that case.
/// With `in_place` the value is always ANDed into the current position, which
/// gives raw flash write semantics at the logical level.
pub fn write_slot(value: u8, slot: &mut [u8], in_place: bool) -> bool {
    let bitmap = slot[0];
    if bitmap == 0xFF {
        if value != 0xFF {
            slot[1] = value;
            slot[0] = 0xFE;
        }
        return true;
    }

    let index = current_index(bitmap).min(DATA_BYTES_PER_SLOT);
    let merged = slot[index] & value;
    if merged == value || in_place {
        slot[index] = merged;
        return true;
    }

    if index < DATA_BYTES_PER_SLOT {
        slot[0] = bitmap << 1;
        slot[index + 1] = value;
        return true;
    }

    false
}

/// Collapse a slot to a single position holding its current value.
pub fn compact_slot(slot: &mut [u8]) {
    let value = read_slot(slot);
    slot[..SLOT_SIZE].fill(0xFF);
    write_slot(value, slot, false);
}

/// Whether a slot has no free position left for a destructive write.
#[inline]
pub fn is_exhausted(slot: &[u8]) -> bool {
    slot[0] != 0xFF && current_index(slot[0]) >= DATA_BYTES_PER_SLOT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn erased() -> [u8; SLOT_SIZE] {
        [0xFF; SLOT_SIZE]
    }

    #[test]
    fn test_uninitialized_reads_ff() {
        assert_eq!(read_slot(&erased()), 0xFF);
    }

    #[test]
    fn test_first_write_uses_index_one() {
        let mut slot = erased();
        assert!(write_slot(0x42, &mut slot, false));
        assert_eq!(slot[0], 0xFE);
        assert_eq!(slot[1], 0x42);
        assert_eq!(read_slot(&slot), 0x42);
    }

    #[test]
    fn test_writing_ff_to_erased_slot_is_a_no_op() {
        let mut slot = erased();
        assert!(write_slot(0xFF, &mut slot, false));
        assert_eq!(slot, erased());
    }

    #[test]
    fn test_subset_write_stays_in_place() {
        let mut slot = erased();
        write_slot(0xF0, &mut slot, false);
        assert!(write_slot(0x30, &mut slot, false));
        assert_eq!(slot[0], 0xFE);
        assert_eq!(read_slot(&slot), 0x30);
    }

    #[test]
    fn test_destructive_writes_advance_until_full() {
        let mut slot = erased();
        for i in 0..DATA_BYTES_PER_SLOT as u8 {
            let value = if i % 2 == 0 { 0x0F } else { 0xF0 };
            assert!(write_slot(value, &mut slot, false), "write {} failed", i);
            assert_eq!(read_slot(&slot), value);
        }
        assert_eq!(slot[0], 0x80);
        assert!(is_exhausted(&slot));

        let before = slot;
        assert!(!write_slot(0xF0, &mut slot, false));
        assert_eq!(slot, before);
    }

    #[test]
    fn test_in_place_write_ands_value() {
        let mut slot = erased();
        write_slot(0xF0, &mut slot, false);
        assert!(write_slot(0x3C, &mut slot, true));
        assert_eq!(read_slot(&slot), 0x30);
        assert_eq!(slot[0], 0xFE);
    }

    #[test]
    fn test_compact_keeps_current_value() {
        let mut slot = erased();
        write_slot(0x01, &mut slot, false);
        write_slot(0x02, &mut slot, false);
        write_slot(0x04, &mut slot, false);
        compact_slot(&mut slot);
        assert_eq!(slot, [0xFE, 0x04, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_zero_bitmap_reads_zero() {
        assert_eq!(read_slot(&[0u8; SLOT_SIZE]), 0);
    }
}
