//! Legacy virtio-mmio block device.
//!
//! Implements the legacy (version 1) virtio-mmio register layout with a
//! single virtqueue addressed by guest page number (QueuePFN). A write to
//! QueueNotify processes every new descriptor chain synchronously against
//! guest RAM: the chain is header (type, reserved, sector), data buffers,
//! and a status byte. Type 0 reads sectors from the disk image into the
//! buffer; type 1 writes the buffer to the image. Completion appends to the
//! used ring and raises the interrupt line until acknowledged.

use tracing::{debug, warn};

use super::device::Device;
use crate::mem::SparseRam;

/// Magic value register ("virt").
const REG_MAGIC: u32 = 0x00;
/// Device version register (1 = legacy).
const REG_VERSION: u32 = 0x04;
/// Device ID register (2 = block).
const REG_DEVICE_ID: u32 = 0x08;
/// Vendor ID register.
const REG_VENDOR_ID: u32 = 0x0C;
/// Device features register.
const REG_DEVICE_FEATURES: u32 = 0x10;
/// Driver features register.
const REG_DRIVER_FEATURES: u32 = 0x20;
/// Guest page size register (legacy).
const REG_GUEST_PAGE_SIZE: u32 = 0x28;
/// Queue select register.
const REG_QUEUE_SEL: u32 = 0x30;
/// Queue size maximum register.
const REG_QUEUE_NUM_MAX: u32 = 0x34;
/// Queue size register.
const REG_QUEUE_NUM: u32 = 0x38;
/// Queue alignment register (legacy).
const REG_QUEUE_ALIGN: u32 = 0x3C;
/// Queue page frame number register (legacy).
const REG_QUEUE_PFN: u32 = 0x40;
/// Queue notify register.
const REG_QUEUE_NOTIFY: u32 = 0x50;
/// Interrupt status register.
const REG_INTERRUPT_STATUS: u32 = 0x60;
/// Interrupt acknowledge register.
const REG_INTERRUPT_ACK: u32 = 0x64;
/// Device status register.
const REG_STATUS: u32 = 0x70;
/// Configuration space: capacity in 512-byte sectors (u64 LE).
const REG_CONFIG: u32 = 0x100;

/// "virt" magic.
const MAGIC: u32 = 0x7472_6976;
/// QEMU vendor id.
const VENDOR: u32 = 0x554D_4551;
/// Largest queue we accept.
const QUEUE_NUM_MAX: u32 = 16;
/// Disk sector size.
const SECTOR_SIZE: u32 = 512;

/// Descriptor flag: another descriptor follows in the chain.
const DESC_F_NEXT: u16 = 1;
/// Descriptor flag: device writes into this buffer.
const DESC_F_WRITE: u16 = 2;

/// Request type: read sectors.
const REQ_READ: u32 = 0;
/// Request type: write sectors.
const REQ_WRITE: u32 = 1;

/// Legacy virtio-mmio block device.
pub struct VirtioBlock {
    image: Vec<u8>,
    guest_page_size: u32,
    queue_sel: u32,
    queue_num: u32,
    queue_align: u32,
    queue_pfn: u32,
    interrupt_status: u32,
    status: u32,
    driver_features: u32,
    last_avail_idx: u16,
}

impl VirtioBlock {
    /// Creates a block device over an in-memory disk image.
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            guest_page_size: 4096,
            queue_sel: 0,
            queue_num: 0,
            queue_align: 4096,
            queue_pfn: 0,
            interrupt_status: 0,
            status: 0,
            driver_features: 0,
            last_avail_idx: 0,
        }
    }

    /// Capacity in sectors.
    fn capacity(&self) -> u64 {
        (self.image.len() as u64) / u64::from(SECTOR_SIZE)
    }

    /// The disk image (for test inspection after writes).
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    fn read_u16_ram(ram: &mut SparseRam, addr: u32) -> u16 {
        let mut b = [0u8; 2];
        ram.read_bytes(addr, &mut b);
        u16::from_le_bytes(b)
    }

    fn read_u32_ram(ram: &mut SparseRam, addr: u32) -> u32 {
        let mut b = [0u8; 4];
        ram.read_bytes(addr, &mut b);
        u32::from_le_bytes(b)
    }

    fn read_u64_ram(ram: &mut SparseRam, addr: u32) -> u64 {
        let mut b = [0u8; 8];
        ram.read_bytes(addr, &mut b);
        u64::from_le_bytes(b)
    }

    /// Reads descriptor `idx`: (addr, len, flags, next).
    fn read_desc(&self, ram: &mut SparseRam, idx: u16) -> (u32, u32, u16, u16) {
        let base = self.desc_base() + u32::from(idx) * 16;
        let addr = Self::read_u64_ram(ram, base) as u32;
        let len = Self::read_u32_ram(ram, base + 8);
        let flags = Self::read_u16_ram(ram, base + 12);
        let next = Self::read_u16_ram(ram, base + 14);
        (addr, len, flags, next)
    }

    fn desc_base(&self) -> u32 {
        self.queue_pfn * self.guest_page_size
    }

    fn avail_base(&self) -> u32 {
        self.desc_base() + self.queue_num * 16
    }

    /// Legacy layout: the used ring starts at the next queue-align boundary
    /// after the available ring.
    fn used_base(&self) -> u32 {
        let avail_end = self.avail_base() + 4 + 2 * self.queue_num + 2;
        let align = self.queue_align.max(4);
        (avail_end + align - 1) & !(align - 1)
    }

    /// Services one descriptor chain; returns the byte count written to
    /// guest memory (for the used ring).
    fn service_chain(&mut self, ram: &mut SparseRam, head: u16) -> u32 {
        let (hdr_addr, _hdr_len, hdr_flags, mut next) = self.read_desc(ram, head);
        if hdr_flags & DESC_F_NEXT == 0 {
            warn!("virtio request without data descriptor");
            return 0;
        }
        let req_type = Self::read_u32_ram(ram, hdr_addr);
        let sector = Self::read_u64_ram(ram, hdr_addr + 8);

        let mut written = 0u32;
        let mut status_ok = true;
        loop {
            let (addr, len, flags, nxt) = self.read_desc(ram, next);
            if flags & DESC_F_NEXT == 0 {
                // Status descriptor: 0 = OK, 1 = I/O error.
                ram.write_bytes(addr, &[u8::from(!status_ok)]);
                written += 1;
                break;
            }
            let offset = sector as usize * SECTOR_SIZE as usize;
            let end = offset + len as usize;
            match req_type {
                REQ_READ if flags & DESC_F_WRITE != 0 => {
                    if end <= self.image.len() {
                        ram.write_bytes(addr, &self.image[offset..end]);
                        written += len;
                    } else {
                        status_ok = false;
                    }
                }
                REQ_WRITE => {
                    if end <= self.image.len() {
                        let mut buf = vec![0u8; len as usize];
                        ram.read_bytes(addr, &mut buf);
                        self.image[offset..end].copy_from_slice(&buf);
                    } else {
                        status_ok = false;
                    }
                }
                _ => {
                    warn!(req_type, "unsupported virtio block request");
                    status_ok = false;
                }
            }
            next = nxt;
        }
        written
    }

    /// Processes every chain the driver has made available since the last
    /// notify, then flags the used-ring interrupt.
    fn process_queue(&mut self, ram: &mut SparseRam) {
        if self.queue_pfn == 0 || self.queue_num == 0 {
            return;
        }
        let avail = self.avail_base();
        let used = self.used_base();
        let avail_idx = Self::read_u16_ram(ram, avail + 2);

        while self.last_avail_idx != avail_idx {
            let slot = u32::from(self.last_avail_idx) % self.queue_num;
            let head = Self::read_u16_ram(ram, avail + 4 + 2 * slot);
            let written = self.service_chain(ram, head);

            let used_idx = Self::read_u16_ram(ram, used + 2);
            let used_slot = u32::from(used_idx) % self.queue_num;
            let elem = used + 4 + 8 * used_slot;
            ram.write_bytes(elem, &u32::from(head).to_le_bytes());
            ram.write_bytes(elem + 4, &written.to_le_bytes());
            ram.write_bytes(used + 2, &used_idx.wrapping_add(1).to_le_bytes());

            self.last_avail_idx = self.last_avail_idx.wrapping_add(1);
            debug!(head, written, "virtio block request served");
        }
        self.interrupt_status |= 1;
    }

    fn reg_value(&self, base: u32) -> u32 {
        match base {
            REG_MAGIC => MAGIC,
            REG_VERSION => 1,
            REG_DEVICE_ID => 2,
            REG_VENDOR_ID => VENDOR,
            REG_DEVICE_FEATURES => 0,
            REG_DRIVER_FEATURES => self.driver_features,
            REG_QUEUE_SEL => self.queue_sel,
            REG_QUEUE_NUM_MAX => QUEUE_NUM_MAX,
            REG_QUEUE_NUM => self.queue_num,
            REG_QUEUE_PFN => self.queue_pfn,
            REG_INTERRUPT_STATUS => self.interrupt_status,
            REG_STATUS => self.status,
            REG_CONFIG => self.capacity() as u32,
            v if v == REG_CONFIG + 4 => (self.capacity() >> 32) as u32,
            _ => 0,
        }
    }

    fn write_reg_byte(&mut self, base: u32, woff: u32, value: u8, ram: &mut SparseRam) {
        let apply = |reg: &mut u32| {
            *reg = (*reg & !(0xFF << (8 * woff))) | (u32::from(value) << (8 * woff));
        };
        match base {
            REG_DRIVER_FEATURES => apply(&mut self.driver_features),
            REG_GUEST_PAGE_SIZE => {
                apply(&mut self.guest_page_size);
            }
            REG_QUEUE_SEL => apply(&mut self.queue_sel),
            REG_QUEUE_NUM => apply(&mut self.queue_num),
            REG_QUEUE_ALIGN => apply(&mut self.queue_align),
            REG_QUEUE_PFN => apply(&mut self.queue_pfn),
            REG_QUEUE_NOTIFY => {
                // Notification processes synchronously within the store; the
                // queue index fits in the low byte.
                if woff == 0 {
                    self.process_queue(ram);
                }
            }
            REG_INTERRUPT_ACK => {
                if woff == 0 {
                    self.interrupt_status &= !u32::from(value);
                }
            }
            REG_STATUS => apply(&mut self.status),
            _ => {}
        }
    }
}

impl Device for VirtioBlock {
    fn name(&self) -> &'static str {
        "virtio-blk"
    }

    fn size(&self) -> u32 {
        0x1000
    }

    fn read_u8(&mut self, offset: u32, _ram: &mut SparseRam) -> u8 {
        let base = offset & !0x3;
        let woff = offset & 0x3;
        (self.reg_value(base) >> (8 * woff)) as u8
    }

    fn write_u8(&mut self, offset: u32, value: u8, ram: &mut SparseRam) {
        let base = offset & !0x3;
        let woff = offset & 0x3;
        self.write_reg_byte(base, woff, value, ram);
    }

    fn irq_id(&self) -> Option<u32> {
        Some(1)
    }

    fn irq_level(&self) -> bool {
        self.interrupt_status & 1 != 0
    }

    fn irq_ack(&mut self) {
        // Level drops when the driver writes InterruptAck.
    }
}
