//! Exception codes and fatal simulator errors.
//!
//! Guest-visible outcomes travel as numeric RISC-V exception codes inside the
//! per-step result record; this module only names them (see
//! [`crate::isa::cause`]) and defines the *simulator-fatal* error type that
//! the embedding API surfaces. Everything a guest can recover from is an
//! exception code; everything here aborts the driving loop.

use thiserror::Error;

/// Fatal, non-architectural failures that abort the simulation loop.
///
/// These are conditions the guest cannot observe or recover from: host
/// resource exhaustion, malformed input images, and misuse of the embedding
/// API.
#[derive(Debug, Error)]
pub enum SimError {
    /// The sparse backing store exceeded its configured page budget.
    #[error("backing store page budget exhausted ({allocated} pages allocated, limit {limit})")]
    OutOfMemory {
        /// Pages allocated when the limit was hit.
        allocated: usize,
        /// Configured page budget.
        limit: usize,
    },

    /// The provided ELF image could not be parsed or is not a loadable RV32 executable.
    #[error("ELF load failed: {0}")]
    ElfLoad(String),

    /// Disk image I/O failed while attaching or accessing the virtio block device.
    #[error("disk image error: {0}")]
    DiskImage(#[from] std::io::Error),

    /// A hart index outside the configured hart count was addressed.
    #[error("hart {0} does not exist")]
    NoSuchHart(usize),
}
