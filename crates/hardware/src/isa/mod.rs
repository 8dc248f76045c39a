//! Instruction set definitions and decoding.
//!
//! This module covers the static side of the ISA:
//! 1. **Opcodes:** Major opcode and function-field constants for RV32IMAFC.
//! 2. **Causes:** Exception and interrupt cause codes from the privileged spec.
//! 3. **Decode:** Field extraction and immediate reconstruction for 32-bit encodings.
//! 4. **RVC:** Expansion of 16-bit compressed instructions to their 32-bit forms.

/// Exception and interrupt cause codes.
pub mod cause;

/// Instruction field extraction and immediate decoding.
pub mod decode;

/// Major opcode and function-field constants.
pub mod opcodes;

/// Compressed (C extension) instruction expansion.
pub mod rvc;

pub use decode::InstructionBits;
