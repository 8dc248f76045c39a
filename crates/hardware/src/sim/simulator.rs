//! The multi-hart simulator.
//!
//! A single deterministic loop drives the machine: each pass ticks the
//! devices once (advancing the timer and latching interrupt levels into the
//! PLIC), then steps every hart in turn. Per hart: sample the interrupt
//! lines into mip, deliver the highest-ranked permitted interrupt if one is
//! due, otherwise execute one instruction and finish it: trap entry on a
//! nonzero exception code, trap return when flagged, or `pc <- pc_next`.
//! The trigger unit then observes the retired step. Step
//! callbacks fan out the full record to tracing consumers.
//!
//! Harts parked in WFI yield their turn until an interrupt pends; harts
//! halted by a debug trigger are no-ops until resumed.

use tracing::{debug, info};

use crate::common::SimError;
use crate::config::{Config, DeviceConfig};
use crate::core::csr::IrqLines;
use crate::core::step::StepResult;
use crate::core::trigger::{TriggerAction, TriggerUnit};
use crate::core::Hart;
use crate::isa::cause::exception;
use crate::mem::Lsu;
use crate::sim::loader::{self, LoadedImage};
use crate::soc::{Aclint, MmioBus, Plic, Rom, System, Uart, UartBuffer, VirtioBlock};

/// dcsr cause value for a trigger-induced halt.
const DCSR_CAUSE_TRIGGER: u32 = 2 << 6;

/// Per-step observer callback.
pub type StepCallback = Box<dyn FnMut(&StepResult)>;

/// The simulator: owns the shared system, the trigger unit, and the harts.
pub struct Simulator {
    /// Shared machine state (RAM, caches, MMIO bus).
    pub sys: System,
    /// Shared debug trigger bank.
    pub trig: TriggerUnit,
    harts: Vec<Hart>,
    callbacks: Vec<StepCallback>,
    uart: Option<UartBuffer>,
    devices: DeviceConfig,
    /// HTIF-style exit watch address.
    tohost: Option<u32>,
    exit_code: Option<u32>,
}

impl Simulator {
    /// Builds a machine from the configuration: system, ACLINT, PLIC, UART,
    /// and the configured number of harts at the reset PC.
    pub fn new(config: &Config) -> Self {
        let mut sys = System::new(
            config.memory.ram_base,
            config.memory.ram_size,
            config.memory.page_budget,
        );

        let mut bus = MmioBus::new();
        bus.add_device(
            config.devices.aclint_base,
            Box::new(Aclint::new(config.general.harts, config.devices.mtime_divider)),
        );
        bus.add_device(
            config.devices.plic_base,
            Box::new(Plic::new(config.general.harts)),
        );
        let (uart, uart_buffer) = Uart::new();
        bus.add_device(config.devices.uart_base, Box::new(uart));
        bus.log_map();
        sys.bus = bus;

        let harts = (0..config.general.harts)
            .map(|hart_id| {
                let lsu = Lsu::new(
                    &mut sys,
                    (config.memory.icache_line_len, config.memory.icache_lines),
                    (config.memory.dcache_line_len, config.memory.dcache_lines),
                    config.memory.tlb_lines,
                );
                Hart::new(hart_id, config.general.reset_pc, lsu)
            })
            .collect();

        info!(harts = config.general.harts, "machine constructed");
        Self {
            sys,
            trig: TriggerUnit::new(config.general.triggers),
            harts,
            callbacks: Vec::new(),
            uart: Some(uart_buffer),
            devices: config.devices.clone(),
            tohost: None,
            exit_code: None,
        }
    }

    /// Attaches a virtio-mmio block device over `image`.
    pub fn attach_virtio(&mut self, image: Vec<u8>) {
        self.sys
            .bus
            .add_device(self.devices.virtio_base, Box::new(VirtioBlock::new(image)));
    }

    /// Attaches a boot ROM at physical address `base`.
    pub fn attach_rom(&mut self, base: u32, data: Vec<u8>) {
        self.sys.bus.add_device(base, Box::new(Rom::new(data)));
    }

    /// Loads an RV32 ELF image, pointing every hart at its entry and arming
    /// the exit watch when the image defines `tohost`.
    pub fn load_elf(&mut self, bytes: &[u8]) -> Result<LoadedImage, SimError> {
        let image = loader::load_elf(&mut self.sys.ram, bytes)?;
        for hart in &mut self.harts {
            hart.pc = image.entry;
        }
        if let Some(tohost) = image.tohost {
            self.set_tohost(tohost);
        }
        Ok(image)
    }

    /// The UART's shared buffer handle (input feed and output drain).
    pub fn uart_buffer(&self) -> Option<UartBuffer> {
        self.uart.clone()
    }

    /// Registers a per-step observer.
    pub fn add_step_callback(&mut self, cb: StepCallback) {
        self.callbacks.push(cb);
    }

    /// Watches the HTIF `tohost` word: an odd write requests shutdown with
    /// the exit code in bits 31..1.
    pub fn set_tohost(&mut self, addr: u32) {
        self.tohost = Some(addr);
    }

    /// Number of harts.
    pub fn hart_count(&self) -> usize {
        self.harts.len()
    }

    /// Direct hart access (test setup, debugger register peeks).
    pub fn hart_mut(&mut self, idx: usize) -> &mut Hart {
        &mut self.harts[idx]
    }

    /// Read-only hart access.
    pub fn hart(&self, idx: usize) -> &Hart {
        &self.harts[idx]
    }

    /// Split borrow of one hart and the shared system, for callers that
    /// drive the hart's LSU directly (debug stubs, tests).
    pub fn hart_and_system(&mut self, idx: usize) -> (&mut Hart, &mut System) {
        (&mut self.harts[idx], &mut self.sys)
    }

    /// Exit code, once the guest has requested shutdown.
    pub fn take_exit(&mut self) -> Option<u32> {
        self.exit_code.take()
    }

    /// DMA-style memory peek (debugger): coherent against the caches.
    pub fn read_memory(&mut self, paddr: u32, buf: &mut [u8]) {
        let System {
            ref mut ram,
            ref mut caches,
            ..
        } = self.sys;
        for i in 0..buf.len() as u32 {
            caches.broadcast(None, paddr + i, false, ram);
        }
        ram.read_bytes(paddr, buf);
    }

    /// DMA-style memory write (debugger and loader): invalidates matching
    /// cache lines and clears overlapping reservations.
    pub fn write_memory(&mut self, paddr: u32, data: &[u8]) {
        let System {
            ref mut ram,
            ref mut caches,
            ..
        } = self.sys;
        for i in 0..data.len() as u32 {
            caches.broadcast(None, paddr + i, true, ram);
        }
        ram.write_bytes(paddr, data);
    }

    /// Halts a hart (debugger request).
    pub fn halt_hart(&mut self, idx: usize) -> Result<(), SimError> {
        let hart = self.harts.get_mut(idx).ok_or(SimError::NoSuchHart(idx))?;
        hart.csr.dpc = hart.pc;
        hart.debug_halted = true;
        hart.window.flush();
        Ok(())
    }

    /// Resumes a halted hart at its debug PC.
    pub fn resume_hart(&mut self, idx: usize) -> Result<(), SimError> {
        let hart = self.harts.get_mut(idx).ok_or(SimError::NoSuchHart(idx))?;
        hart.pc = hart.csr.dpc;
        hart.debug_halted = false;
        hart.window.flush();
        Ok(())
    }

    /// Single-steps one halted hart (debugger request).
    pub fn single_step(&mut self, idx: usize) -> Result<(), SimError> {
        if idx >= self.harts.len() {
            return Err(SimError::NoSuchHart(idx));
        }
        self.resume_hart(idx)?;
        self.step_hart(idx);
        self.halt_hart(idx)
    }

    /// One pass of the driving loop: tick devices, then step each hart.
    pub fn step(&mut self) -> Result<(), SimError> {
        {
            let System {
                ref mut ram,
                ref mut bus,
                ..
            } = self.sys;
            bus.tick(ram);
        }
        if self.sys.ram.exhausted() {
            return Err(SimError::OutOfMemory {
                allocated: self.sys.ram.allocated_pages(),
                limit: self.sys.ram.page_budget(),
            });
        }
        for idx in 0..self.harts.len() {
            self.step_hart(idx);
        }
        self.check_tohost();
        Ok(())
    }

    /// Runs until the guest exits or `max_passes` loop passes elapse.
    pub fn run(&mut self, max_passes: u64) -> Result<Option<u32>, SimError> {
        for _ in 0..max_passes {
            self.step()?;
            if self.exit_code.is_some() {
                return Ok(self.exit_code);
            }
        }
        Ok(None)
    }

    fn sample_irq_lines(&mut self, hart_idx: usize) -> (IrqLines, u64) {
        let mut lines = IrqLines::default();
        let mut mtime = 0;
        if let Some(aclint) = self.sys.bus.aclint_mut() {
            lines.mtip = aclint.mtip(hart_idx);
            lines.msip = aclint.msip(hart_idx);
            mtime = aclint.mtime();
        }
        if let Some(plic) = self.sys.bus.plic_mut() {
            lines.meip = plic.irq_pending(2 * hart_idx);
            lines.seip = plic.irq_pending(2 * hart_idx + 1);
        }
        (lines, mtime)
    }

    fn step_hart(&mut self, idx: usize) {
        if self.harts[idx].debug_halted {
            return;
        }

        let (lines, mtime) = self.sample_irq_lines(idx);
        let hart = &mut self.harts[idx];
        hart.csr.update_irq_lines(lines);
        hart.csr.cycle += 1;

        // A parked hart yields its turn until an interrupt pends; the WFI's
        // PC is preserved so the resumed flow re-examines it.
        if hart.wfi_parked {
            if hart.csr.any_interrupt_pending() {
                hart.wfi_parked = false;
            } else {
                return;
            }
        }

        // Asynchronous interrupt injection wins over instruction issue.
        if let Some(code) = hart.csr.pending_interrupt() {
            let handler = hart.csr.interrupt_enter(code, hart.pc);
            hart.pc = handler;
            hart.window.flush();
            return;
        }

        let result = self.harts[idx].step(&mut self.sys, &mut self.trig, mtime);
        let hart = &mut self.harts[idx];

        if result.exception_code != 0 {
            let handler = hart.csr.trap_enter(&result);
            hart.pc = handler;
            hart.window.flush();
        } else if let Some(kind) = result.trap_return {
            hart.pc = hart.csr.trap_return(kind);
            hart.csr.instret += 1;
        } else {
            if result.wfi {
                hart.wfi_parked = true;
            }
            hart.pc = result.pc_next;
            hart.csr.instret += 1;
        }

        // The trigger unit observes every retired step.
        if result.exception_code == 0 {
            if let Some(action) = self.trig.cycle(&result) {
                let hart = &mut self.harts[idx];
                match action {
                    TriggerAction::Trap => {
                        let mut trap_step = result.clone();
                        trap_step.exception_code = exception::BREAKPOINT;
                        hart.pc = hart.csr.trap_enter(&trap_step);
                        hart.window.flush();
                    }
                    TriggerAction::EnterDebug => {
                        debug!(hart = idx, pc = format_args!("{:#010x}", hart.pc), "trigger halt");
                        hart.csr.dcsr = (hart.csr.dcsr & !(0x7 << 6)) | DCSR_CAUSE_TRIGGER;
                        hart.csr.dpc = hart.pc;
                        hart.debug_halted = true;
                        hart.window.flush();
                    }
                }
            }
        }

        for cb in &mut self.callbacks {
            cb(&result);
        }
    }

    fn check_tohost(&mut self) {
        let Some(addr) = self.tohost else {
            return;
        };
        let System {
            ref mut ram,
            ref mut caches,
            ..
        } = self.sys;
        // The guest's store may still sit dirty in a dcache line.
        caches.broadcast(None, addr, false, ram);
        let value = ram.load(addr, 4);
        if value == 0 {
            return;
        }
        if value & 1 != 0 {
            // Odd word: shutdown with the exit code in bits 31..1.
            info!(code = value >> 1, "guest requested shutdown");
            self.exit_code = Some(value >> 1);
        } else {
            // Even word: a host syscall request. Console plumbing lives
            // outside the core; acknowledge so the guest can proceed.
            caches.broadcast(None, addr, true, ram);
            ram.store(addr, 4, 0);
        }
    }
}
