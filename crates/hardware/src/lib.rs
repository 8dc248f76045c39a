//! RV32 system simulator library.
//!
//! This crate implements a functional, cycle-aware RISC-V RV32IMAFC
//! simulator with the following:
//! 1. **Core:** fetch window, decode, execute, write-back, CSR file with
//!    M/S/U privileges, trap machinery, and a debug trigger unit.
//! 2. **Memory:** Sv32 MMU (TLB + hardware page walk), PMP, and per-hart
//!    write-back caches kept MSI-coherent across masters.
//! 3. **Soft-float:** a bit-exact IEEE-754 single-precision kernel (FMA,
//!    SRT-4 divide/square-root, comparisons, conversions, classification).
//! 4. **SoC:** sparse backing store, MMIO bus, UART 16550a, ACLINT, PLIC,
//!    legacy virtio-mmio block device, and boot ROM.
//! 5. **Simulation:** a deterministic multi-hart driving loop with step
//!    callbacks, debug halt/resume, and an ELF loader.

/// Common types and constants (addresses, registers, errors).
pub mod common;
/// Simulator configuration (defaults and JSON deserialization).
pub mod config;
/// Hart core (CSR file, execute, fetch window, triggers).
pub mod core;
/// Instruction set (opcodes, causes, decode, compressed expansion).
pub mod isa;
/// Memory hierarchy (backing store, caches, TLB, PMP, LSU).
pub mod mem;
/// Simulation: `Simulator` and the ELF loader.
pub mod sim;
/// System-on-chip (bus, devices, shared machine state).
pub mod soc;
/// Bit-exact single-precision soft-float kernel.
pub mod softfloat;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// One hardware thread: registers, PC, CSR file, LSU, fetch window.
pub use crate::core::Hart;
/// Top-level simulator; owns the system, the triggers, and the harts.
pub use crate::sim::Simulator;
/// Shared machine state (RAM, coherent caches, MMIO bus).
pub use crate::soc::System;
