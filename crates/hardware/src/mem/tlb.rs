//! Sv32 TLB and hardware page walker.
//!
//! Direct-mapped translation cache indexed by `vpn[0]`, tagged with the
//! remaining virtual page number bits, holding the leaf PTE and a mega-page
//! flag. A hit still performs the privilege check against the cached leaf,
//! so presence and permission fail independently. A miss runs the two-level
//! walk: the level-1 PTE at `vmrppn | vpn[1] << 2`, then (for a pointer
//! entry) the level-0 PTE at `ppn << 12 | vpn[0] << 2`. PTE fetches outside
//! RAM raise the access fault matching the access kind; permission
//! violations raise the matching page fault.

use tracing::trace;

use super::backing::SparseRam;
use super::coherent::CacheSet;
use crate::common::constants::AccessType;
use crate::core::mode::PrivilegeMode;
use crate::isa::cause::exception;

/// PTE valid bit.
pub const PTE_V: u32 = 1 << 0;
/// PTE read-permission bit.
pub const PTE_R: u32 = 1 << 1;
/// PTE write-permission bit.
pub const PTE_W: u32 = 1 << 2;
/// PTE execute-permission bit.
pub const PTE_X: u32 = 1 << 3;
/// PTE user-accessible bit.
pub const PTE_U: u32 = 1 << 4;
/// PTE global bit.
pub const PTE_G: u32 = 1 << 5;
/// PTE accessed bit.
pub const PTE_A: u32 = 1 << 6;
/// PTE dirty bit.
pub const PTE_D: u32 = 1 << 7;

/// Size of one page-table entry in bytes.
const PTE_SIZE: u32 = 4;

#[derive(Clone, Copy, Default)]
struct TlbLine {
    valid: bool,
    tag: u32,
    pte: u32,
    megapage: bool,
}

/// Direct-mapped Sv32 translation cache.
pub struct Tlb {
    lines: Vec<TlbLine>,
    index_mask: u32,
    tag_mask: u32,
    access_count: u64,
    hit_count: u64,
}

/// A PTE is a leaf iff any of R/W/X is set.
#[inline]
fn pte_is_leaf(pte: u32) -> bool {
    pte & (PTE_R | PTE_W | PTE_X) != 0
}

/// Presence and permission check for one PTE.
///
/// A leaf must be valid, carry the access-appropriate permission bit, and,
/// for user mode, the U bit. A pointer entry only needs to be valid.
fn pte_permits(pte: u32, access: AccessType, prv: PrivilegeMode) -> bool {
    if pte & PTE_V == 0 {
        return false;
    }
    if pte_is_leaf(pte) {
        if prv == PrivilegeMode::User && pte & PTE_U == 0 {
            return false;
        }
        pte & (access as u32) != 0
    } else {
        true
    }
}

/// Maps a walk or permission failure to the fault code for `access`.
fn page_fault(access: AccessType) -> u32 {
    match access {
        AccessType::Instruction => exception::INSTRUCTION_PAGE_FAULT,
        AccessType::Load => exception::LOAD_PAGE_FAULT,
        AccessType::Store => exception::STORE_PAGE_FAULT,
    }
}

fn access_fault(access: AccessType) -> u32 {
    match access {
        AccessType::Instruction => exception::INSTRUCTION_ACCESS_FAULT,
        AccessType::Load => exception::LOAD_ACCESS_FAULT,
        AccessType::Store => exception::STORE_ACCESS_FAULT,
    }
}

/// Physical address materialized from a leaf PTE and the virtual address.
#[inline]
fn leaf_paddr(pte: u32, vaddr: u32, megapage: bool) -> u32 {
    if megapage {
        ((pte & 0xFFF0_0000) << 2) | (vaddr & 0x003F_FFFF)
    } else {
        ((pte & 0xFFFF_FC00) << 2) | (vaddr & 0x0000_0FFF)
    }
}

impl Tlb {
    /// Creates a TLB with `line_count` entries (a power of two).
    pub fn new(line_count: u32) -> Self {
        debug_assert!(line_count.is_power_of_two());
        Self {
            lines: vec![TlbLine::default(); line_count as usize],
            index_mask: line_count - 1,
            tag_mask: (0xFFFF_FFFF ^ (line_count - 1)) << 12,
            access_count: 0,
            hit_count: 0,
        }
    }

    /// Number of lookups observed.
    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Number of lookups that hit.
    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    /// Invalidates every entry (sfence.vma, satp write).
    pub fn clear(&mut self) {
        for line in &mut self.lines {
            line.valid = false;
            line.megapage = false;
        }
    }

    /// Coherent PTE fetch: peer caches holding the entry dirty are
    /// downgraded first so the store is current.
    fn fetch_pte(pte_addr: u32, ram: &mut SparseRam, caches: &mut CacheSet) -> u32 {
        caches.broadcast(None, pte_addr, false, ram);
        ram.load(pte_addr, 4)
    }

    /// Two-level hardware walk. Returns the leaf PTE and mega-page flag.
    #[allow(clippy::too_many_arguments)]
    fn walk(
        vaddr: u32,
        mut pte_base: u32,
        access: AccessType,
        prv: PrivilegeMode,
        ram: &mut SparseRam,
        caches: &mut CacheSet,
        ram_base: u32,
        ram_size: u32,
    ) -> Result<(u32, bool), u32> {
        for level in (0..=1u32).rev() {
            let vpn = (vaddr >> (12 + 10 * level)) & 0x3FF;
            let pte_addr = pte_base.wrapping_add(vpn * PTE_SIZE);
            if pte_addr < ram_base || pte_addr >= ram_base.wrapping_add(ram_size) {
                trace!(vaddr = format_args!("{vaddr:#010x}"), pte_addr = format_args!("{pte_addr:#010x}"), "page walk left RAM");
                return Err(access_fault(access));
            }
            let pte = Self::fetch_pte(pte_addr, ram, caches);
            if !pte_permits(pte, access, prv) {
                return Err(page_fault(access));
            }
            if pte_is_leaf(pte) {
                return Ok((pte, level == 1));
            }
            if level == 0 {
                // Level-0 pointer entry: the walk has nowhere left to go.
                return Err(page_fault(access));
            }
            pte_base = (pte >> 10) << 12;
        }
        Err(page_fault(access))
    }

    /// Translates `vaddr` under root page number `vmrppn`.
    ///
    /// On success the translated physical address is returned and the leaf
    /// is installed; on failure the page/access fault code for `access`.
    #[allow(clippy::too_many_arguments)]
    pub fn get(
        &mut self,
        vmrppn: u32,
        vaddr: u32,
        access: AccessType,
        prv: PrivilegeMode,
        ram: &mut SparseRam,
        caches: &mut CacheSet,
        ram_base: u32,
        ram_size: u32,
    ) -> Result<u32, u32> {
        let index = ((vaddr >> 12) & self.index_mask) as usize;
        let tag = vaddr & self.tag_mask;
        self.access_count += 1;

        let line = self.lines[index];
        if line.valid && line.tag == tag {
            self.hit_count += 1;
            return if pte_permits(line.pte, access, prv) {
                Ok(leaf_paddr(line.pte, vaddr, line.megapage))
            } else {
                Err(page_fault(access))
            };
        }

        let (pte, megapage) = Self::walk(
            vaddr, vmrppn, access, prv, ram, caches, ram_base, ram_size,
        )?;
        self.lines[index] = TlbLine {
            valid: true,
            tag,
            pte,
            megapage,
        };
        Ok(leaf_paddr(pte, vaddr, megapage))
    }
}
