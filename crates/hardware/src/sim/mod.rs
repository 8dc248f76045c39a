//! Simulation: the multi-hart driving loop and the ELF loader.

/// RV32 ELF image loading.
pub mod loader;

/// The multi-hart simulator.
pub mod simulator;

pub use loader::{load_elf, LoadedImage};
pub use simulator::Simulator;
