//! Per-instruction step result record.
//!
//! One record is produced for every attempted instruction. It carries
//! everything the enclosing simulator needs to finish the step (trap entry,
//! trap return, PC advance), everything the trigger unit matches on, and a
//! snapshot of the fetch window for tracing consumers.

use crate::common::constants::{WINDOW_PC_INVALID, WINDOW_SIZE};
use crate::core::mode::PrivilegeMode;
use crate::softfloat::Fflags;

/// Memory access kind of a retired instruction, as observed by the trigger
/// unit. The discriminant doubles as the match6 access mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MemAccessKind {
    /// No data-side access.
    #[default]
    None,
    /// Load.
    Load,
    /// Store.
    Store,
    /// Atomic read-modify-write (matches both load and store triggers).
    Access,
}

impl MemAccessKind {
    /// The match6-style access mask (load = bit 0, store = bit 1).
    #[inline(always)]
    pub fn mask(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Load => 0b01,
            Self::Store => 0b10,
            Self::Access => 0b11,
        }
    }
}

/// Which trap-return instruction retired this step, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapReturn {
    /// MRET.
    Machine,
    /// SRET (and the legacy URET encoding).
    Supervisor,
}

/// The per-step record.
#[derive(Clone, Debug)]
pub struct StepResult {
    /// Hart that executed the step.
    pub hart_id: usize,
    /// Cycle counter at issue.
    pub cycle: u64,
    /// Privilege the instruction executed in.
    pub prv: PrivilegeMode,
    /// Virtual PC of the instruction.
    pub pc: u32,
    /// Physical PC of the instruction.
    pub pc_paddr: u32,
    /// Successor PC (branch target or fall-through).
    pub pc_next: u32,
    /// The fetched instruction parcel (16-bit parcels in the low half).
    pub inst: u32,
    /// Major opcode after expansion.
    pub opcode: u32,
    /// Destination register number.
    pub rd: usize,
    /// First source register number.
    pub rs1: usize,
    /// Second source register number.
    pub rs2: usize,
    /// Third source register number (FMA forms).
    pub rs3: usize,
    /// Destination is a floating-point register.
    pub rd_is_fpr: bool,
    /// Value written to the destination.
    pub rd_data: u32,
    /// Floating-point flags accrued this step.
    pub fflags: Fflags,
    /// Data-side access kind.
    pub m_access: MemAccessKind,
    /// Data-side virtual address.
    pub m_vaddr: u32,
    /// Data-side physical address.
    pub m_paddr: u32,
    /// Data written (stores and atomics).
    pub m_data: u32,
    /// Synchronous exception code; zero means the step retired.
    pub exception_code: u32,
    /// Trap-return instruction retired this step.
    pub trap_return: Option<TrapReturn>,
    /// The step requested a fetch-window flush.
    pub flush: bool,
    /// WFI retired: hold the PC and park until an interrupt pends.
    pub wfi: bool,
    /// Virtual PCs of the fetch window at retirement.
    pub window_pcs: [u32; WINDOW_SIZE],
    /// Expanded instructions of the fetch window at retirement.
    pub window_insts: [u32; WINDOW_SIZE],
    /// Window slot the instruction was issued from.
    pub window_pos: usize,
}

impl StepResult {
    /// A fresh record for one step at `pc`.
    pub fn new(hart_id: usize, cycle: u64, prv: PrivilegeMode, pc: u32) -> Self {
        Self {
            hart_id,
            cycle,
            prv,
            pc,
            pc_paddr: 0,
            pc_next: pc,
            inst: 0,
            opcode: 0,
            rd: 0,
            rs1: 0,
            rs2: 0,
            rs3: 0,
            rd_is_fpr: false,
            rd_data: 0,
            fflags: Fflags::NONE,
            m_access: MemAccessKind::None,
            m_vaddr: 0,
            m_paddr: 0,
            m_data: 0,
            exception_code: 0,
            trap_return: None,
            flush: false,
            wfi: false,
            window_pcs: [WINDOW_PC_INVALID; WINDOW_SIZE],
            window_insts: [0; WINDOW_SIZE],
            window_pos: 0,
        }
    }
}
