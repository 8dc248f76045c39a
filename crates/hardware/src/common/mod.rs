//! Common utilities and types used throughout the RISC-V system simulator.
//!
//! This module provides fundamental building blocks that are shared across
//! all components of the simulator. It includes:
//! 1. **Constants:** System-wide constants for the memory map and simulation.
//! 2. **Memory Access:** Definitions for categorizing memory operations.
//! 3. **Error Handling:** Fatal simulator errors (guest-visible outcomes are
//!    numeric exception codes in the step record).
//! 4. **Register Management:** GPR and FPR register files.

/// Common constants used throughout the simulator.
pub mod constants;

/// Fatal simulator error types.
pub mod error;

/// Register file implementation.
pub mod reg;

pub use constants::AccessType;
pub use error::SimError;
pub use reg::{FprFile, GprFile};
