//! Exception and interrupt cause codes.
//!
//! Numeric codes from the RISC-V Privileged Specification. Synchronous
//! exception codes travel in the step result's `exception_code` field with
//! zero meaning "no exception"; interrupt causes are written to `mcause`/
//! `scause` with [`INTERRUPT_BIT`] set.

/// Bit 31 of `mcause`/`scause`: set for interrupts, clear for exceptions.
pub const INTERRUPT_BIT: u32 = 0x8000_0000;

/// Synchronous exception codes.
pub mod exception {
    /// Instruction address misaligned.
    pub const INSTRUCTION_ADDRESS_MISALIGNED: u32 = 0;
    /// Instruction access fault.
    pub const INSTRUCTION_ACCESS_FAULT: u32 = 1;
    /// Illegal instruction.
    pub const ILLEGAL_INSTRUCTION: u32 = 2;
    /// Breakpoint (EBREAK or trigger with trap action).
    pub const BREAKPOINT: u32 = 3;
    /// Load address misaligned.
    pub const LOAD_ADDRESS_MISALIGNED: u32 = 4;
    /// Load access fault.
    pub const LOAD_ACCESS_FAULT: u32 = 5;
    /// Store/AMO address misaligned.
    pub const STORE_ADDRESS_MISALIGNED: u32 = 6;
    /// Store/AMO access fault.
    pub const STORE_ACCESS_FAULT: u32 = 7;
    /// Environment call from U-mode.
    pub const ENVIRONMENT_CALL_U: u32 = 8;
    /// Environment call from S-mode.
    pub const ENVIRONMENT_CALL_S: u32 = 9;
    /// Environment call from M-mode.
    pub const ENVIRONMENT_CALL_M: u32 = 11;
    /// Instruction page fault.
    pub const INSTRUCTION_PAGE_FAULT: u32 = 12;
    /// Load page fault.
    pub const LOAD_PAGE_FAULT: u32 = 13;
    /// Store/AMO page fault.
    pub const STORE_PAGE_FAULT: u32 = 15;
}

/// Interrupt cause codes (without [`super::INTERRUPT_BIT`]).
pub mod interrupt {
    /// Supervisor software interrupt.
    pub const SUPERVISOR_SOFTWARE: u32 = 1;
    /// Machine software interrupt.
    pub const MACHINE_SOFTWARE: u32 = 3;
    /// Supervisor timer interrupt.
    pub const SUPERVISOR_TIMER: u32 = 5;
    /// Machine timer interrupt.
    pub const MACHINE_TIMER: u32 = 7;
    /// Supervisor external interrupt.
    pub const SUPERVISOR_EXTERNAL: u32 = 9;
    /// Machine external interrupt.
    pub const MACHINE_EXTERNAL: u32 = 11;
}
