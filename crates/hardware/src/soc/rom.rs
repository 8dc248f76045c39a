//! Boot ROM.
//!
//! A read-only byte region, conventionally at physical address zero, holding
//! the reset trampoline and the devtree pointer words. Contents are supplied
//! by the embedder; writes are ignored.

use tracing::warn;

use super::device::Device;
use crate::mem::SparseRam;

/// Read-only memory region.
pub struct Rom {
    data: Vec<u8>,
}

impl Rom {
    /// Creates a ROM over the given contents.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl Device for Rom {
    fn name(&self) -> &'static str {
        "rom"
    }

    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn read_u8(&mut self, offset: u32, _ram: &mut SparseRam) -> u8 {
        self.data.get(offset as usize).copied().unwrap_or(0)
    }

    fn write_u8(&mut self, offset: u32, _value: u8, _ram: &mut SparseRam) {
        warn!(offset, "write to boot rom ignored");
    }
}
