//! RV32 ELF image loading.
//!
//! Parses an executable, copies its loadable segments into the backing
//! store, and reports the entry point plus the `tohost` symbol address when
//! the image carries one (used by the HTIF-style exit watch).

use object::{Architecture, Object, ObjectSegment, ObjectSymbol};
use tracing::debug;

use crate::common::SimError;
use crate::mem::SparseRam;

/// What an ELF load produced.
#[derive(Clone, Copy, Debug)]
pub struct LoadedImage {
    /// Program entry point.
    pub entry: u32,
    /// Address of the `tohost` word, if the image defines one.
    pub tohost: Option<u32>,
}

/// Loads an RV32 ELF executable into the backing store.
pub fn load_elf(ram: &mut SparseRam, bytes: &[u8]) -> Result<LoadedImage, SimError> {
    let file = object::File::parse(bytes).map_err(|e| SimError::ElfLoad(e.to_string()))?;
    if file.architecture() != Architecture::Riscv32 {
        return Err(SimError::ElfLoad(format!(
            "unsupported architecture {:?}",
            file.architecture()
        )));
    }

    for segment in file.segments() {
        let data = segment
            .data()
            .map_err(|e| SimError::ElfLoad(e.to_string()))?;
        if data.is_empty() {
            continue;
        }
        let addr = segment.address() as u32;
        ram.write_bytes(addr, data);
        debug!(
            addr = format_args!("{addr:#010x}"),
            len = data.len(),
            "loaded segment"
        );
    }

    let tohost = file
        .symbols()
        .find(|s| s.name() == Ok("tohost"))
        .map(|s| s.address() as u32);

    Ok(LoadedImage {
        entry: file.entry() as u32,
        tohost,
    })
}
