//! System-on-chip: the shared machine state and its MMIO devices.
//!
//! This module owns everything the harts share:
//! 1. **System:** backing store + coherence domain + MMIO bus in one struct.
//! 2. **Device trait:** byte-wise MMIO endpoints with irq/ack and tick.
//! 3. **Devices:** UART 16550a, ACLINT, PLIC, virtio-mmio block, boot ROM.

/// ACLINT (MSWI + MTIMER, legacy CLINT layout).
pub mod aclint;

/// MMIO bus routing.
pub mod bus;

/// Device trait for memory-mapped I/O.
pub mod device;

/// Platform-level interrupt controller.
pub mod plic;

/// Boot ROM.
pub mod rom;

/// UART 16550a.
pub mod uart;

/// Legacy virtio-mmio block device.
pub mod virtio;

pub use aclint::Aclint;
pub use bus::MmioBus;
pub use device::Device;
pub use plic::Plic;
pub use rom::Rom;
pub use uart::{Uart, UartBuffer};
pub use virtio::VirtioBlock;

use crate::common::constants::RAM_BASE;
use crate::mem::{CacheSet, SparseRam};

/// The shared machine: backing store, coherence domain, and MMIO bus.
///
/// Harts and DMA masters all operate on this one structure; the simulator
/// owns it and threads a mutable borrow through each step.
pub struct System {
    /// Sparse physical memory.
    pub ram: SparseRam,
    /// Every cache in the coherence domain.
    pub caches: CacheSet,
    /// MMIO devices by physical range.
    pub bus: MmioBus,
    /// Base of the RAM window; addresses at or above it are cacheable.
    pub ram_base: u32,
    /// Size of the RAM window (bounds the page walker).
    pub ram_size: u32,
}

impl System {
    /// Creates a system with an empty bus and the given RAM window.
    pub fn new(ram_base: u32, ram_size: u32, page_budget: usize) -> Self {
        Self {
            ram: SparseRam::new(page_budget),
            caches: CacheSet::new(),
            bus: MmioBus::new(),
            ram_base,
            ram_size,
        }
    }

    /// True when `paddr` is backed by cacheable RAM rather than MMIO.
    #[inline(always)]
    pub fn is_cacheable(&self, paddr: u32) -> bool {
        paddr >= self.ram_base
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new(RAM_BASE, 0x0800_0000, (512 * 1024 * 1024) / 4096)
    }
}
