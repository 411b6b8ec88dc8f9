//! Multi-write slots on top of the page mapper.

mod common;

use common::pattern;
use flashee::{
    FlashDevice, LogicalPageMapper, MapperConfig, MultiWriteFlashStore, RamFlash,
    create_address_erase,
};

fn store() -> MultiWriteFlashStore<LogicalPageMapper<RamFlash>> {
    let mapper = LogicalPageMapper::new(RamFlash::new(6, 258), MapperConfig::new(3)).unwrap();
    MultiWriteFlashStore::new(mapper)
}

#[test]
fn test_eighth_destructive_write_compacts() {
    let mut store = store();
    store.write_erase_page(5, &[0xAA]).unwrap();
    let first = store.inner().physical_page_for(0);
    assert!(first.is_some());

    for write in 2..=8u32 {
        let value = if write % 2 == 0 { 0x55 } else { 0xAA };
        store.write_erase_page(5, &[value]).unwrap();
        assert_eq!(store.read_byte(5).unwrap(), value, "write {}", write);

        let page = store.inner().physical_page_for(0);
        if write < 8 {
            assert_eq!(page, first, "write {} relocated early", write);
        } else {
            assert_ne!(page, first, "write {} did not compact", write);
        }
    }
    assert_eq!(store.inner().inner().total_erases(), 0);
}

#[test]
fn test_one_relocation_per_seven_writes() {
    let mut store = store();
    store.write_erase_page(0, &pattern(32, 9)).unwrap();
    let mut page = store.inner().physical_page_for(0);
    let mut relocations = 0;

    for write in 1..=50u32 {
        let value = if write % 2 == 0 { 0x0F } else { 0xF0 };
        store.write_erase_page(10, &[value]).unwrap();
        let now = store.inner().physical_page_for(0);
        if now != page {
            relocations += 1;
            page = now;
        }
        // the initial pattern already took the first position of the slot
        assert_eq!(relocations, write / 7, "after write {}", write);
    }

    let mut buf = [0u8; 32];
    store.read_page(0, &mut buf).unwrap();
    let mut expected = pattern(32, 9);
    expected[10] = 0x0F;
    assert_eq!(buf.to_vec(), expected);
}

#[test]
fn test_neighbours_survive_compaction() {
    let mut store = store();
    let data = pattern(32, 3);
    store.write_erase_page(32, &data).unwrap();
    for round in 0..20u8 {
        store.write_erase_page(40, &[round, !round]).unwrap();
    }
    let mut buf = [0u8; 32];
    store.read_page(32, &mut buf).unwrap();
    assert_eq!(&buf[..8], &data[..8]);
    assert_eq!(&buf[8..10], &[19, !19]);
    assert_eq!(&buf[10..], &data[10..]);
}

#[test]
fn test_address_erase_device_rewrites_text() {
    let mut device = create_address_erase(RamFlash::new(10, 514), 0, 514 * 10, 3).unwrap();
    assert_eq!(device.page_size(), 64);
    assert_eq!(device.page_count(), 7);

    let words = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel"];
    for word in words.iter().cycle().take(40) {
        device.write_str(60, word, true).unwrap();
        let mut buf = vec![0u8; word.len() + 1];
        device.read(60, &mut buf).unwrap();
        assert_eq!(&buf[..word.len()], word.as_bytes());
        assert_eq!(buf[word.len()], 0);
    }
}
