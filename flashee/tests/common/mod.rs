//! Shared helpers for the integration tests.

#![allow(dead_code)]

use flashee::{FlashDevice, FlashError, RamFlash, TransferHandler};

/// RAM flash that stops accepting mutations after a budget of operations,
/// emulating a power loss in the middle of a multi-step update.
#[derive(Debug)]
pub struct PowerCutFlash {
    inner: RamFlash,
    budget: Option<usize>,
    mutations: usize,
}

impl PowerCutFlash {
    pub fn new(inner: RamFlash) -> Self {
        Self {
            inner,
            budget: None,
            mutations: 0,
        }
    }

    /// Allow `ops` more erases or writes, then fail every later one.
    pub fn cut_after(&mut self, ops: usize) {
        self.budget = Some(ops);
    }

    /// Number of erases and writes that reached the flash.
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    pub fn into_inner(self) -> RamFlash {
        self.inner
    }

    fn spend(&mut self) -> Result<(), FlashError> {
        match self.budget {
            Some(0) => Err(FlashError::Device("power cut")),
            Some(n) => {
                self.budget = Some(n - 1);
                self.mutations += 1;
                Ok(())
            }
            None => {
                self.mutations += 1;
                Ok(())
            }
        }
    }
}

impl FlashDevice for PowerCutFlash {
    fn page_size(&self) -> u32 {
        self.inner.page_size()
    }

    fn page_count(&self) -> u32 {
        self.inner.page_count()
    }

    fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        self.spend()?;
        self.inner.erase_page(address)
    }

    fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.spend()?;
        self.inner.write_page(address, data)
    }

    fn read_page(&mut self, address: u32, data: &mut [u8]) -> Result<(), FlashError> {
        self.inner.read_page(address, data)
    }

    fn write_erase_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        self.spend()?;
        self.inner.write_erase_page(address, data)
    }

    fn copy_page(
        &mut self,
        address: u32,
        handler: &mut TransferHandler<'_>,
        scratch: &mut [u8],
    ) -> Result<(), FlashError> {
        self.inner.copy_page(address, handler, scratch)
    }
}

/// Deterministic byte pattern for a given seed.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
