//! MMIO bus routing.
//!
//! An ordered set of `(base, size, device)` ranges consulted by physical
//! address after translation and PMP. The bus also runs the per-iteration
//! device tick, feeding each device's interrupt level into the PLIC, and
//! relays PLIC completions back to the device as an acknowledge.

use tracing::debug;

use super::device::Device;
use crate::mem::SparseRam;

struct Mapping {
    base: u32,
    size: u32,
    dev: Box<dyn Device>,
}

/// The MMIO bus: ordered device ranges plus routing and tick fan-out.
#[derive(Default)]
pub struct MmioBus {
    maps: Vec<Mapping>,
}

impl MmioBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `dev` at physical base address `base`. Ranges are kept
    /// sorted for lookup.
    pub fn add_device(&mut self, base: u32, dev: Box<dyn Device>) {
        let size = dev.size();
        self.maps.push(Mapping { base, size, dev });
        self.maps.sort_by_key(|m| m.base);
    }

    fn find(&mut self, paddr: u32) -> Option<(&mut Mapping, u32)> {
        self.maps
            .iter_mut()
            .find(|m| paddr >= m.base && paddr - m.base < m.size)
            .map(|m| {
                let off = paddr - m.base;
                (m, off)
            })
    }

    /// True when some device claims `paddr`.
    pub fn claims(&self, paddr: u32) -> bool {
        self.maps
            .iter()
            .any(|m| paddr >= m.base && paddr - m.base < m.size)
    }

    /// MMIO load of `len` bytes, assembled little-endian byte-by-byte.
    /// Returns `None` when no device claims the address.
    pub fn load(&mut self, paddr: u32, len: u32, ram: &mut SparseRam) -> Option<u32> {
        let mut value = 0u32;
        for i in 0..len {
            let (m, off) = self.find(paddr + i)?;
            value |= u32::from(m.dev.read_u8(off, ram)) << (8 * i);
        }
        Some(value)
    }

    /// MMIO store of `len` bytes, split little-endian byte-by-byte.
    /// Returns `false` when no device claims the address.
    pub fn store(&mut self, paddr: u32, len: u32, value: u32, ram: &mut SparseRam) -> bool {
        for i in 0..len {
            let Some((m, off)) = self.find(paddr + i) else {
                return false;
            };
            m.dev.write_u8(off, (value >> (8 * i)) as u8, ram);
        }
        // A PLIC completion names a source to acknowledge; relay it to the
        // owning device now that the borrow is back.
        self.relay_plic_acks();
        true
    }

    fn relay_plic_acks(&mut self) {
        let mut acks: Vec<u32> = Vec::new();
        for m in &mut self.maps {
            if let Some(plic) = m.dev.as_plic_mut() {
                acks.extend(plic.take_pending_acks());
            }
        }
        for irq in acks {
            for m in &mut self.maps {
                if m.dev.irq_id() == Some(irq) {
                    m.dev.irq_ack();
                }
            }
        }
    }

    /// One bus tick: advance every device, then latch each interrupting
    /// device's level into the PLIC pending set.
    pub fn tick(&mut self, ram: &mut SparseRam) {
        let mut levels: u64 = 0;
        for m in &mut self.maps {
            m.dev.tick(ram);
            if let (Some(irq), true) = (m.dev.irq_id(), m.dev.irq_level()) {
                if irq < 64 {
                    levels |= 1 << irq;
                }
            }
        }
        for m in &mut self.maps {
            if let Some(plic) = m.dev.as_plic_mut() {
                plic.set_levels(levels);
            }
        }
    }

    /// Finds the PLIC, if one is attached.
    pub fn plic_mut(&mut self) -> Option<&mut super::plic::Plic> {
        self.maps.iter_mut().find_map(|m| m.dev.as_plic_mut())
    }

    /// Finds the ACLINT, if one is attached.
    pub fn aclint_mut(&mut self) -> Option<&mut super::aclint::Aclint> {
        self.maps.iter_mut().find_map(|m| m.dev.as_aclint_mut())
    }

    /// Finds the UART, if one is attached.
    pub fn uart_mut(&mut self) -> Option<&mut super::uart::Uart> {
        self.maps.iter_mut().find_map(|m| m.dev.as_uart_mut())
    }

    /// Logs the memory map at startup.
    pub fn log_map(&self) {
        for m in &self.maps {
            debug!(
                base = format_args!("{:#010x}", m.base),
                size = format_args!("{:#x}", m.size),
                name = m.dev.name(),
                "mmio mapping"
            );
        }
    }
}
