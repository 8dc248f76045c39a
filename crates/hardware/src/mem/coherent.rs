//! The coherence domain owning every master's cache.
//!
//! All caches in the machine live here, addressed by [`MasterId`], so that
//! any master's line access can broadcast to its peers before touching its
//! own line. This realizes the MSI protocol of the per-line states: a write
//! broadcast invalidates peer copies (clearing their LR reservations), a
//! read broadcast downgrades a peer's Modified line to Shared via
//! write-back, and only then does the requesting cache fill or hit.

use super::backing::SparseRam;
use super::cache::{Cache, CacheLine};

/// Handle identifying one cache inside the coherence domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MasterId(usize);

/// Every cache in the machine, in registration order.
#[derive(Default)]
pub struct CacheSet {
    caches: Vec<Cache>,
}

impl CacheSet {
    /// Creates an empty coherence domain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cache and returns its master handle.
    pub fn register(&mut self, cache: Cache) -> MasterId {
        self.caches.push(cache);
        MasterId(self.caches.len() - 1)
    }

    /// Direct access to one cache (maintenance operations).
    pub fn cache_mut(&mut self, id: MasterId) -> &mut Cache {
        &mut self.caches[id.0]
    }

    /// Read-only access to one cache (performance counters).
    pub fn cache(&self, id: MasterId) -> &Cache {
        &self.caches[id.0]
    }

    /// Broadcasts a coherence event for `paddr` from `origin` to every peer
    /// cache. Used by line accesses and by non-cached masters (DMA).
    pub fn broadcast(&mut self, origin: Option<MasterId>, paddr: u32, is_write: bool, ram: &mut SparseRam) {
        for (idx, cache) in self.caches.iter_mut().enumerate() {
            if Some(MasterId(idx)) == origin {
                continue;
            }
            cache.snoop(paddr, is_write, ram);
        }
    }

    /// Fetches the line holding `paddr` for `master`, broadcasting the
    /// coherence event to the peers first.
    pub fn get_line(
        &mut self,
        master: MasterId,
        paddr: u32,
        for_write: bool,
        ram: &mut SparseRam,
    ) -> &mut CacheLine {
        self.broadcast(Some(master), paddr, for_write, ram);
        self.caches[master.0].get_line(paddr, for_write, ram)
    }
}
