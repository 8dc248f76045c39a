//! Device trait for memory-mapped I/O.
//!
//! All bus-attached components implement [`Device`]. The LSU performs MMIO
//! byte-by-byte, so the access surface is byte reads and writes at
//! device-relative offsets; wider registers assemble and split themselves,
//! with side effects keyed to the low byte of a register. Devices that own
//! DMA (the virtio block device) receive the backing store in their write
//! path; devices that raise interrupts expose a level and an acknowledge
//! hook the PLIC drives on completion.

use super::aclint::Aclint;
use super::plic::Plic;
use super::uart::Uart;
use crate::mem::SparseRam;

/// Trait for memory-mapped I/O devices attached to the system bus.
pub trait Device: Send {
    /// Short name for logs (e.g. `"uart0"`).
    fn name(&self) -> &'static str;

    /// Size in bytes of the device's MMIO window.
    fn size(&self) -> u32;

    /// Reads one byte at a device-relative offset.
    fn read_u8(&mut self, offset: u32, ram: &mut SparseRam) -> u8;

    /// Writes one byte at a device-relative offset.
    fn write_u8(&mut self, offset: u32, value: u8, ram: &mut SparseRam);

    /// Advances device-internal time by one bus tick.
    fn tick(&mut self, _ram: &mut SparseRam) {}

    /// PLIC source number, for devices that interrupt.
    fn irq_id(&self) -> Option<u32> {
        None
    }

    /// Current interrupt level.
    fn irq_level(&self) -> bool {
        false
    }

    /// Interrupt acknowledge, driven by PLIC completion.
    fn irq_ack(&mut self) {}

    /// Downcast to the PLIC.
    fn as_plic_mut(&mut self) -> Option<&mut Plic> {
        None
    }

    /// Downcast to the ACLINT.
    fn as_aclint_mut(&mut self) -> Option<&mut Aclint> {
        None
    }

    /// Downcast to a UART.
    fn as_uart_mut(&mut self) -> Option<&mut Uart> {
        None
    }
}
