//! Instruction fetch window.
//!
//! A bounded run of decoded instructions for straight-line code, amortizing
//! translation and icache line fetch across several steps. Each occupied
//! slot holds the virtual PC, physical PC, expanded 32-bit instruction,
//! parcel length, and any fetch exception; unoccupied slots carry an
//! impossible PC so no lookup can alias. A fetch that misses the window
//! refills it starting at the requested PC, walking one icache line and
//! re-translating whenever the line or page runs out, including the case
//! of a 32-bit instruction straddling a line boundary, whose second parcel
//! re-translates `pc + 2`.
//!
//! Anything that can change translation (satp writes, sfence.vma, fence.i,
//! trap entry and return) must flush the window; the step logic raises the
//! flush flag and the simulator applies it.

use crate::common::constants::{AccessType, WINDOW_PC_INVALID, WINDOW_SIZE};
use crate::core::mode::PrivilegeMode;
use crate::core::step::StepResult;
use crate::isa::cause::exception;
use crate::isa::rvc;
use crate::mem::Lsu;
use crate::soc::System;

/// The per-hart fetch window.
pub struct FetchWindow {
    pcs: [u32; WINDOW_SIZE],
    paddrs: [u32; WINDOW_SIZE],
    insts: [u32; WINDOW_SIZE],
    lens: [u32; WINDOW_SIZE],
    excs: [u32; WINDOW_SIZE],
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchWindow {
    /// Creates an empty (flushed) window.
    pub fn new() -> Self {
        Self {
            pcs: [WINDOW_PC_INVALID; WINDOW_SIZE],
            paddrs: [WINDOW_PC_INVALID; WINDOW_SIZE],
            insts: [0; WINDOW_SIZE],
            lens: [0; WINDOW_SIZE],
            excs: [0; WINDOW_SIZE],
        }
    }

    /// Invalidates every slot.
    pub fn flush(&mut self) {
        self.pcs = [WINDOW_PC_INVALID; WINDOW_SIZE];
    }

    fn lookup(&self, pc: u32) -> Option<usize> {
        self.pcs.iter().position(|p| *p == pc)
    }

    /// Reads one icache line's bytes for the fetch, or falls back to the
    /// MMIO bus for non-cacheable instruction memory (the boot ROM).
    fn fetch_line(
        lsu: &Lsu,
        sys: &mut System,
        line_base: u32,
        buf: &mut [u8],
    ) -> Result<(), u32> {
        if sys.is_cacheable(line_base) {
            let System {
                ref mut ram,
                ref mut caches,
                ..
            } = *sys;
            let line = caches.get_line(lsu.icache, line_base, false, ram);
            buf.copy_from_slice(&line.data);
            Ok(())
        } else {
            let System {
                ref mut ram,
                ref mut bus,
                ..
            } = *sys;
            for (i, byte) in buf.iter_mut().enumerate() {
                match bus.load(line_base + i as u32, 1, ram) {
                    Some(v) => *byte = v as u8,
                    None => return Err(exception::INSTRUCTION_ACCESS_FAULT),
                }
            }
            Ok(())
        }
    }

    /// Refills the window starting at `start_pc`.
    fn refill(&mut self, start_pc: u32, lsu: &mut Lsu, sys: &mut System, prv: PrivilegeMode) {
        self.flush();
        let line_len = sys.caches.cache(lsu.icache).line_len();
        let line_mask = line_len - 1;
        let mut buf = vec![0u8; line_len as usize];

        let mut window_pc = start_pc;
        let mut line_base;
        let mut index;
        match lsu.translate(window_pc, AccessType::Instruction, prv, sys) {
            Ok(paddr) => {
                line_base = paddr & !line_mask;
                index = paddr & line_mask;
                if let Err(code) = Self::fetch_line(lsu, sys, line_base, &mut buf) {
                    self.record_fault(0, window_pc, code);
                    return;
                }
            }
            Err(code) => {
                self.record_fault(0, window_pc, code);
                return;
            }
        }

        for slot in 0..WINDOW_SIZE {
            if index >= line_len {
                // The line is spent; the next parcel may also cross a page.
                match lsu.translate(window_pc, AccessType::Instruction, prv, sys) {
                    Ok(paddr) => {
                        line_base = paddr & !line_mask;
                        index = paddr & line_mask;
                        if let Err(code) = Self::fetch_line(lsu, sys, line_base, &mut buf) {
                            self.record_fault(slot, window_pc, code);
                            return;
                        }
                    }
                    Err(code) => {
                        self.record_fault(slot, window_pc, code);
                        return;
                    }
                }
            }

            let slot_paddr = line_base + index;
            let lo = u32::from(buf[index as usize]) | (u32::from(buf[index as usize + 1]) << 8);
            let (inst, len) = if lo & 0x3 == 0x3 {
                if index + 2 >= line_len {
                    // A 32-bit parcel straddling the line boundary: the
                    // second half re-translates pc + 2.
                    match lsu.translate(window_pc + 2, AccessType::Instruction, prv, sys) {
                        Ok(paddr2) => {
                            line_base = paddr2 & !line_mask;
                            if let Err(code) = Self::fetch_line(lsu, sys, line_base, &mut buf) {
                                self.record_fault(slot, window_pc, code);
                                return;
                            }
                            index = 2;
                            let hi = u32::from(buf[0]) | (u32::from(buf[1]) << 8);
                            (lo | (hi << 16), 4)
                        }
                        Err(code) => {
                            self.record_fault(slot, window_pc, code);
                            return;
                        }
                    }
                } else {
                    let hi = u32::from(buf[index as usize + 2])
                        | (u32::from(buf[index as usize + 3]) << 8);
                    index += 4;
                    (lo | (hi << 16), 4)
                }
            } else {
                index += 2;
                (rvc::expand(lo), 2)
            };

            self.pcs[slot] = window_pc;
            self.paddrs[slot] = slot_paddr;
            self.insts[slot] = inst;
            self.lens[slot] = len;
            self.excs[slot] = 0;
            window_pc += len;
        }
    }

    fn record_fault(&mut self, slot: usize, pc: u32, code: u32) {
        self.pcs[slot] = pc;
        self.paddrs[slot] = WINDOW_PC_INVALID;
        self.insts[slot] = 0;
        self.lens[slot] = 0;
        self.excs[slot] = code;
    }

    /// Fetches the instruction at `pc`, refilling on a miss, and records the
    /// outcome (instruction, physical PC, exception, window snapshot) into
    /// `result`. Returns the parcel length (0 when the fetch faulted).
    pub fn fetch(
        &mut self,
        pc: u32,
        lsu: &mut Lsu,
        sys: &mut System,
        prv: PrivilegeMode,
        result: &mut StepResult,
    ) -> u32 {
        if self.lookup(pc).is_none() {
            self.refill(pc, lsu, sys, prv);
        }
        result.window_pcs = self.pcs;
        result.window_insts = self.insts;
        match self.lookup(pc) {
            Some(slot) => {
                result.window_pos = slot;
                result.inst = self.insts[slot];
                result.pc_paddr = self.paddrs[slot];
                result.exception_code = self.excs[slot];
                self.lens[slot]
            }
            None => {
                // The refill recorded a fault before reaching this PC.
                result.exception_code = exception::INSTRUCTION_ACCESS_FAULT;
                0
            }
        }
    }
}
