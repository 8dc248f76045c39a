//! Common constants used throughout the simulator.
//!
//! Memory-map defaults, page geometry, fetch-window sizing, and the access
//! type used by translation, PMP, and the trigger unit.

/// Page size shift (4 KiB pages).
pub const PAGE_SHIFT: u32 = 12;

/// Page size in bytes.
pub const PAGE_SIZE: u32 = 1 << PAGE_SHIFT;

/// Mask covering the page-offset bits of an address.
pub const PAGE_OFFSET_MASK: u32 = PAGE_SIZE - 1;

/// Default base address of the boot ROM region.
pub const ROM_BASE: u32 = 0x0000_0000;

/// Default base address of the ACLINT (MSWI + MTIMER, legacy CLINT layout).
pub const ACLINT_BASE: u32 = 0x0200_0000;

/// Default base address of the PLIC.
pub const PLIC_BASE: u32 = 0x0C00_0000;

/// Default base address of the UART 16550a.
pub const UART_BASE: u32 = 0x1000_0000;

/// Default base address of the virtio-mmio block device.
pub const VIRTIO_BASE: u32 = 0x1000_1000;

/// Default base address of main RAM. Addresses at or above this are cacheable.
pub const RAM_BASE: u32 = 0x8000_0000;

/// Number of slots in a hart's instruction fetch window.
pub const WINDOW_SIZE: usize = 8;

/// Sentinel PC stored in unoccupied fetch-window slots. Not a valid fetch
/// address (misaligned and all-ones), so no lookup can alias against it.
pub const WINDOW_PC_INVALID: u32 = 0xFFFF_FFFF;

/// Number of general-purpose registers.
pub const NUM_GPR: usize = 32;

/// Number of floating-point registers.
pub const NUM_FPR: usize = 32;

/// Memory access categories.
///
/// The discriminants equal the PTE permission bit each access requires
/// (R=bit1, W=bit2, X=bit3), which lets the page walker test
/// `pte & (access as u32)` directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    /// Instruction fetch (requires PTE.X).
    Instruction = 1 << 3,
    /// Data load (requires PTE.R).
    Load = 1 << 1,
    /// Data store or AMO (requires PTE.W).
    Store = 1 << 2,
}
