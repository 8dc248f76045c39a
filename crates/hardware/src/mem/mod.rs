//! Memory hierarchy: backing store, coherent caches, translation, protection.
//!
//! This module implements the data side of the machine:
//! 1. **Backing store:** Sparse 4-KiB page map allocated on first touch.
//! 2. **Caches:** Per-master direct-mapped write-back lines with MSI state.
//! 3. **TLB:** Direct-mapped Sv32 translation cache plus the hardware walker.
//! 4. **PMP:** Physical-memory-protection range checks.
//! 5. **LSU:** The load/store unit tying translation, protection, caches,
//!    MMIO routing, atomics, and fences together.

/// Sparse backing store.
pub mod backing;

/// Direct-mapped write-back cache with MSI state.
pub mod cache;

/// The coherence domain owning every master's cache.
pub mod coherent;

/// Load/store unit.
pub mod lsu;

/// Physical memory protection.
pub mod pmp;

/// Sv32 TLB and page walker.
pub mod tlb;

pub use backing::SparseRam;
pub use cache::{Cache, LineState};
pub use coherent::{CacheSet, MasterId};
pub use lsu::Lsu;
pub use pmp::Pmp;
pub use tlb::Tlb;
