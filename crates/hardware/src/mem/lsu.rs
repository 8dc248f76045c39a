//! Load/store unit.
//!
//! Every data-side access funnels through here: alignment check, address
//! translation (TLB plus hardware walk), PMP enforcement, then routing to
//! the write-back dcache for RAM or byte-serial MMIO for device space.
//! LR/SC ride the cache line's reservation flag; AMOs are a read-modify-
//! write on the line with optional ordering write-backs. The fence family
//! and sfence.vma perform the cache and TLB maintenance the ISA requires.
//!
//! Faults populate the step record's physical address and exception code
//! and leave memory untouched.

use crate::common::constants::AccessType;
use crate::core::mode::PrivilegeMode;
use crate::core::step::StepResult;
use crate::isa::cause::exception;
use crate::soc::System;

use super::cache::Cache;
use super::coherent::MasterId;
use super::pmp::Pmp;
use super::tlb::Tlb;

/// SC.W result value for success.
pub const STORE_SUCCESS: u32 = 0;
/// SC.W result value for failure.
pub const STORE_FAILURE: u32 = 1;

/// Per-hart load/store unit.
pub struct Lsu {
    /// Instruction cache master handle.
    pub icache: MasterId,
    /// Data cache master handle.
    pub dcache: MasterId,
    /// Translation cache.
    pub tlb: Tlb,
    /// Physical memory protection.
    pub pmp: Pmp,
    /// Virtual memory enabled (satp mode bit).
    vmflag: bool,
    /// Root page-table physical base (`satp.ppn << 12`).
    vmrppn: u32,
}

impl Lsu {
    /// Creates an LSU, registering its caches in the coherence domain.
    ///
    /// Geometry: `(line_len, line_count)` per cache, `tlb_lines` entries.
    pub fn new(
        sys: &mut System,
        icache_geom: (u32, u32),
        dcache_geom: (u32, u32),
        tlb_lines: u32,
    ) -> Self {
        let icache = sys.caches.register(Cache::new(icache_geom.0, icache_geom.1));
        let dcache = sys.caches.register(Cache::new(dcache_geom.0, dcache_geom.1));
        Self {
            icache,
            dcache,
            tlb: Tlb::new(tlb_lines),
            pmp: Pmp::new(),
            vmflag: false,
            vmrppn: 0,
        }
    }

    /// Turns Sv32 translation on with root page number `ppn`.
    pub fn atp_on(&mut self, ppn: u32) {
        self.vmflag = true;
        self.vmrppn = ppn << 12;
    }

    /// Turns translation off.
    pub fn atp_off(&mut self) {
        self.vmflag = false;
        self.vmrppn = 0;
    }

    /// Reconstructs the architectural `satp` value.
    pub fn atp_get(&self) -> u32 {
        (u32::from(self.vmflag) << 31) | ((self.vmrppn >> 12) & 0x000F_FFFF)
    }

    /// Translates `vaddr` and applies the PMP check.
    ///
    /// `satp` is dead in machine mode and when translation is off; the
    /// address passes through untranslated.
    pub fn translate(
        &mut self,
        vaddr: u32,
        access: AccessType,
        prv: PrivilegeMode,
        sys: &mut System,
    ) -> Result<u32, u32> {
        let paddr = if !self.vmflag || prv == PrivilegeMode::Machine {
            vaddr
        } else {
            let System {
                ref mut ram,
                ref mut caches,
                ram_base,
                ram_size,
                ..
            } = *sys;
            self.tlb
                .get(self.vmrppn, vaddr, access, prv, ram, caches, ram_base, ram_size)?
        };
        match self.pmp.check(paddr, access, prv) {
            0 => Ok(paddr),
            code => Err(code),
        }
    }

    fn misaligned(vaddr: u32, len: u32) -> bool {
        len > 1 && vaddr & (len - 1) != 0
    }

    /// Load of `len ∈ {1, 2, 4}` bytes at `result.m_vaddr`. The value lands
    /// zero-extended in `result.rd_data`; sign extension is the execute
    /// stage's concern.
    pub fn load(&mut self, len: u32, sys: &mut System, result: &mut StepResult) -> u32 {
        if Self::misaligned(result.m_vaddr, len) {
            result.exception_code = exception::LOAD_ADDRESS_MISALIGNED;
            return result.exception_code;
        }
        match self.translate(result.m_vaddr, AccessType::Load, result.prv, sys) {
            Ok(paddr) => result.m_paddr = paddr,
            Err(code) => {
                result.exception_code = code;
                return code;
            }
        }
        if sys.is_cacheable(result.m_paddr) {
            let System {
                ref mut ram,
                ref mut caches,
                ..
            } = *sys;
            let line = caches.get_line(self.dcache, result.m_paddr, false, ram);
            let off = (result.m_paddr & (line.data.len() as u32 - 1)) as usize;
            result.rd_data = match len {
                1 => u32::from(line.data[off]),
                2 => u32::from(u16::from_le_bytes([line.data[off], line.data[off + 1]])),
                _ => u32::from_le_bytes([
                    line.data[off],
                    line.data[off + 1],
                    line.data[off + 2],
                    line.data[off + 3],
                ]),
            };
        } else {
            let System {
                ref mut ram,
                ref mut bus,
                ..
            } = *sys;
            match bus.load(result.m_paddr, len, ram) {
                Some(value) => result.rd_data = value,
                None => result.exception_code = exception::LOAD_ACCESS_FAULT,
            }
        }
        result.exception_code
    }

    /// Store of `len ∈ {1, 2, 4}` bytes of `result.m_data` at
    /// `result.m_vaddr`.
    pub fn store(&mut self, len: u32, sys: &mut System, result: &mut StepResult) -> u32 {
        if Self::misaligned(result.m_vaddr, len) {
            result.exception_code = exception::STORE_ADDRESS_MISALIGNED;
            return result.exception_code;
        }
        match self.translate(result.m_vaddr, AccessType::Store, result.prv, sys) {
            Ok(paddr) => result.m_paddr = paddr,
            Err(code) => {
                result.exception_code = code;
                return code;
            }
        }
        if sys.is_cacheable(result.m_paddr) {
            let System {
                ref mut ram,
                ref mut caches,
                ..
            } = *sys;
            let line = caches.get_line(self.dcache, result.m_paddr, true, ram);
            let off = (result.m_paddr & (line.data.len() as u32 - 1)) as usize;
            let bytes = result.m_data.to_le_bytes();
            for i in 0..len as usize {
                line.data[off + i] = bytes[i];
            }
        } else {
            let System {
                ref mut ram,
                ref mut bus,
                ..
            } = *sys;
            if !bus.store(result.m_paddr, len, result.m_data, ram) {
                result.exception_code = exception::STORE_ACCESS_FAULT;
            }
        }
        result.exception_code
    }

    /// LR.W: load a word and set the line's reservation. Acquire ordering
    /// drains the dirty lines first.
    pub fn load_reserved(&mut self, aq: bool, sys: &mut System, result: &mut StepResult) -> u32 {
        if Self::misaligned(result.m_vaddr, 4) {
            result.exception_code = exception::LOAD_ADDRESS_MISALIGNED;
            return result.exception_code;
        }
        match self.translate(result.m_vaddr, AccessType::Load, result.prv, sys) {
            Ok(paddr) => result.m_paddr = paddr,
            Err(code) => {
                result.exception_code = code;
                return code;
            }
        }
        if !sys.is_cacheable(result.m_paddr) {
            result.exception_code = exception::LOAD_ACCESS_FAULT;
            return result.exception_code;
        }
        let System {
            ref mut ram,
            ref mut caches,
            ..
        } = *sys;
        if aq {
            caches.cache_mut(self.dcache).write_back_all(ram);
        }
        let line = caches.get_line(self.dcache, result.m_paddr, false, ram);
        let off = (result.m_paddr & (line.data.len() as u32 - 1)) as usize;
        result.rd_data = u32::from_le_bytes([
            line.data[off],
            line.data[off + 1],
            line.data[off + 2],
            line.data[off + 3],
        ]);
        line.reserved = true;
        0
    }

    /// SC.W: store a word iff the line still carries this hart's
    /// reservation. `rd_data` reports success (0) or failure (1). Release
    /// ordering drains the dirty lines afterwards.
    pub fn store_conditional(&mut self, rl: bool, sys: &mut System, result: &mut StepResult) -> u32 {
        if Self::misaligned(result.m_vaddr, 4) {
            result.exception_code = exception::STORE_ADDRESS_MISALIGNED;
            return result.exception_code;
        }
        match self.translate(result.m_vaddr, AccessType::Store, result.prv, sys) {
            Ok(paddr) => result.m_paddr = paddr,
            Err(code) => {
                result.exception_code = code;
                return code;
            }
        }
        if !sys.is_cacheable(result.m_paddr) {
            result.exception_code = exception::STORE_ACCESS_FAULT;
            return result.exception_code;
        }
        let System {
            ref mut ram,
            ref mut caches,
            ..
        } = *sys;
        let line = caches.get_line(self.dcache, result.m_paddr, true, ram);
        if line.reserved {
            let off = (result.m_paddr & (line.data.len() as u32 - 1)) as usize;
            line.data[off..off + 4].copy_from_slice(&result.m_data.to_le_bytes());
            line.reserved = false;
            result.rd_data = STORE_SUCCESS;
        } else {
            result.rd_data = STORE_FAILURE;
        }
        if rl {
            caches.cache_mut(self.dcache).write_back_all(ram);
        }
        0
    }

    /// AMO: load, combine through `op(mem, rs2)`, store back, with optional
    /// acquire/release write-backs around the pair.
    pub fn amo(
        &mut self,
        aq: bool,
        rl: bool,
        op: fn(u32, u32) -> u32,
        sys: &mut System,
        result: &mut StepResult,
    ) -> u32 {
        if aq {
            let System {
                ref mut ram,
                ref mut caches,
                ..
            } = *sys;
            caches.cache_mut(self.dcache).write_back_all(ram);
        }
        if self.load(4, sys, result) != 0 {
            // Loads of AMO targets report store faults.
            result.exception_code = match result.exception_code {
                exception::LOAD_ACCESS_FAULT => exception::STORE_ACCESS_FAULT,
                exception::LOAD_PAGE_FAULT => exception::STORE_PAGE_FAULT,
                exception::LOAD_ADDRESS_MISALIGNED => exception::STORE_ADDRESS_MISALIGNED,
                code => code,
            };
            return result.exception_code;
        }
        result.m_data = op(result.rd_data, result.m_data);
        if self.store(4, sys, result) != 0 {
            return result.exception_code;
        }
        if rl {
            let System {
                ref mut ram,
                ref mut caches,
                ..
            } = *sys;
            caches.cache_mut(self.dcache).write_back_all(ram);
        }
        0
    }

    /// FENCE.I: discard the icache and invalidate the dcache.
    pub fn fence_i(&mut self, sys: &mut System) {
        let System {
            ref mut ram,
            ref mut caches,
            ..
        } = *sys;
        caches.cache_mut(self.icache).discard_all();
        caches.cache_mut(self.dcache).invalidate_all(ram);
    }

    /// FENCE / FENCE.TSO: only the full fence is modeled; dirty lines drain.
    pub fn fence(&mut self, sys: &mut System) {
        let System {
            ref mut ram,
            ref mut caches,
            ..
        } = *sys;
        caches.cache_mut(self.dcache).write_back_all(ram);
    }

    /// SFENCE.VMA: discard the icache, drain the dcache, clear the TLB.
    pub fn sfence_vma(&mut self, sys: &mut System) {
        let System {
            ref mut ram,
            ref mut caches,
            ..
        } = *sys;
        caches.cache_mut(self.icache).discard_all();
        caches.cache_mut(self.dcache).write_back_all(ram);
        self.tlb.clear();
    }
}
