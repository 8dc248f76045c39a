//! Hart: architectural state and the per-instruction step.
//!
//! A hart owns its register files, PC, fetch window, LSU, and CSR file; it
//! shares the system (RAM, caches, bus) and the trigger unit with its
//! peers. One call to [`Hart::step`] fetches, executes, and writes back a
//! single instruction, producing the step record the simulator uses to
//! finish the step (trap entry, trap return, or PC advance).

/// Control and status register file.
pub mod csr;

/// Execute stage.
pub mod execute;

/// Privilege modes.
pub mod mode;

/// Step result record.
pub mod step;

/// Debug trigger unit.
pub mod trigger;

/// Instruction fetch window.
pub mod window;

use crate::common::reg::{FprFile, GprFile};
use crate::isa::InstructionBits;
use crate::mem::Lsu;
use crate::soc::System;

use self::csr::CsrFile;
use self::step::StepResult;
use self::trigger::TriggerUnit;
use self::window::FetchWindow;

/// One hardware thread of execution.
pub struct Hart {
    /// General-purpose registers.
    pub gpr: GprFile,
    /// Floating-point registers.
    pub fpr: FprFile,
    /// Program counter.
    pub pc: u32,
    /// CSR file (holds the current privilege).
    pub csr: CsrFile,
    /// Load/store unit.
    pub lsu: Lsu,
    /// Fetch window.
    pub window: FetchWindow,
    /// Parked in WFI until an interrupt pends.
    pub wfi_parked: bool,
    /// Parked in debug mode by a trigger; steps are no-ops until resumed.
    pub debug_halted: bool,
}

impl Hart {
    /// Creates a hart at reset: machine mode, PC at `reset_pc`.
    pub fn new(hart_id: usize, reset_pc: u32, lsu: Lsu) -> Self {
        Self {
            gpr: GprFile::new(),
            fpr: FprFile::new(),
            pc: reset_pc,
            csr: CsrFile::new(hart_id),
            lsu,
            window: FetchWindow::new(),
            wfi_parked: false,
            debug_halted: false,
        }
    }

    /// Executes one instruction at the current PC.
    ///
    /// Fetch (through the window), execute, write-back, window-flush. The
    /// caller owns what happens next: trap entry on a nonzero exception
    /// code, trap return when flagged, otherwise `pc ← pc_next`, and the
    /// trigger poll.
    pub fn step(&mut self, sys: &mut System, trig: &mut TriggerUnit, mtime: u64) -> StepResult {
        let mut result = StepResult::new(self.csr.hart_id, self.csr.cycle, self.csr.mode, self.pc);

        let len = self
            .window
            .fetch(self.pc, &mut self.lsu, sys, self.csr.mode, &mut result);
        if result.exception_code != 0 {
            return result;
        }
        result.pc_next = self.pc.wrapping_add(len);
        result.opcode = result.inst.opcode();

        self.execute(sys, trig, mtime, &mut result);

        if result.exception_code != 0 {
            return result;
        }
        if result.rd_is_fpr {
            self.fpr.write(result.rd, result.rd_data);
            self.csr.dirty_fp(result.fflags);
        } else {
            if !result.fflags.is_empty() {
                // Comparisons and conversions accrue flags even though the
                // destination is an integer register.
                self.csr.dirty_fp(result.fflags);
            }
            self.gpr.write(result.rd, result.rd_data);
        }
        if result.flush {
            self.window.flush();
        }
        result
    }
}
