//! Configuration system for the simulator.
//!
//! Hierarchical configuration with serde deserialization (JSON-friendly) and
//! a `Default` that describes the stock machine: one hart, RAM at
//! 0x8000_0000, the conventional device map, and modest cache and TLB
//! geometry. Every field falls back to its default when absent from the
//! deserialized input.

use serde::Deserialize;

use crate::common::constants;

/// Baseline hardware constants used by the defaults.
mod defaults {
    /// Number of harts.
    pub const HARTS: usize = 1;

    /// Reset PC: the start of RAM.
    pub const RESET_PC: u32 = super::constants::RAM_BASE;

    /// Number of debug triggers.
    pub const TRIGGERS: usize = 4;

    /// RAM size (128 MiB).
    pub const RAM_SIZE: u32 = 128 * 1024 * 1024;

    /// Backing-store page budget (512 MiB of 4-KiB pages).
    pub const PAGE_BUDGET: usize = (512 * 1024 * 1024) / 4096;

    /// Instruction cache line length in bytes.
    pub const ICACHE_LINE_LEN: u32 = 32;

    /// Instruction cache line count.
    pub const ICACHE_LINES: u32 = 128;

    /// Data cache line length in bytes.
    pub const DCACHE_LINE_LEN: u32 = 32;

    /// Data cache line count.
    pub const DCACHE_LINES: u32 = 256;

    /// TLB entry count.
    pub const TLB_LINES: u32 = 64;

    /// mtime advances once per this many bus ticks.
    pub const MTIME_DIVIDER: u64 = 10;
}

/// General machine parameters.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Number of harts.
    pub harts: usize,
    /// Reset program counter for every hart.
    pub reset_pc: u32,
    /// Number of debug triggers in the shared bank.
    pub triggers: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            harts: defaults::HARTS,
            reset_pc: defaults::RESET_PC,
            triggers: defaults::TRIGGERS,
        }
    }
}

/// Memory-hierarchy geometry.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Base of the RAM window.
    pub ram_base: u32,
    /// Size of the RAM window.
    pub ram_size: u32,
    /// Backing-store page budget.
    pub page_budget: usize,
    /// Instruction cache line length (power of two).
    pub icache_line_len: u32,
    /// Instruction cache line count (power of two).
    pub icache_lines: u32,
    /// Data cache line length (power of two).
    pub dcache_line_len: u32,
    /// Data cache line count (power of two).
    pub dcache_lines: u32,
    /// TLB entry count (power of two).
    pub tlb_lines: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ram_base: constants::RAM_BASE,
            ram_size: defaults::RAM_SIZE,
            page_budget: defaults::PAGE_BUDGET,
            icache_line_len: defaults::ICACHE_LINE_LEN,
            icache_lines: defaults::ICACHE_LINES,
            dcache_line_len: defaults::DCACHE_LINE_LEN,
            dcache_lines: defaults::DCACHE_LINES,
            tlb_lines: defaults::TLB_LINES,
        }
    }
}

/// Device memory map and timer pacing.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// ACLINT base address.
    pub aclint_base: u32,
    /// PLIC base address.
    pub plic_base: u32,
    /// UART base address.
    pub uart_base: u32,
    /// virtio-mmio base address.
    pub virtio_base: u32,
    /// mtime advances once per this many bus ticks.
    pub mtime_divider: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            aclint_base: constants::ACLINT_BASE,
            plic_base: constants::PLIC_BASE,
            uart_base: constants::UART_BASE,
            virtio_base: constants::VIRTIO_BASE,
            mtime_divider: defaults::MTIME_DIVIDER,
        }
    }
}

/// Root configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General machine parameters.
    pub general: GeneralConfig,
    /// Memory-hierarchy geometry.
    pub memory: MemoryConfig,
    /// Device map.
    pub devices: DeviceConfig,
}

impl Config {
    /// Parses a configuration from JSON.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
