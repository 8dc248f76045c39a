//! Full-system scenarios: whole programs through the machine, covering
//! traps, interrupts, WFI, atomics, translation, triggers, and devices.

use pretty_assertions::assert_eq;

use wrensim_core::common::constants::{RAM_BASE, UART_BASE};
use wrensim_core::core::csr::{IRQ_MSI, IRQ_MTI, MSTATUS_MIE, MSTATUS_MPP_SHIFT};
use wrensim_core::core::mode::PrivilegeMode;
use wrensim_core::core::step::StepResult;
use wrensim_core::isa::cause::{exception, interrupt, INTERRUPT_BIT};
use wrensim_core::mem::tlb::{PTE_R, PTE_U, PTE_V, PTE_W, PTE_X};
use wrensim_core::softfloat::Fflags;

use crate::common::asm::*;
use crate::common::harness::TestMachine;

const HANDLER: u32 = RAM_BASE + 0x2000;

fn park_mtvec(m: &mut TestMachine) {
    m.load_program_at(HANDLER, &[jal(0, 0)]);
    m.sim.hart_mut(0).csr.mtvec = HANDLER;
}

// ══════════════════════════════════════════════════════════
// 1. Seed: ADDI / ADD / BNE loop
// ══════════════════════════════════════════════════════════

#[test]
fn seed_accumulator_loop() {
    let mut m = TestMachine::new();
    park_mtvec(&mut m);
    m.load_program(&[
        addi(1, 0, 10),
        addi(2, 0, 0),
        add(2, 2, 1),    // L:
        addi(1, 1, -1),
        bne(1, 0, -8),
        ebreak(),
    ]);
    m.run(40);
    assert_eq!(m.x(2), 55);
    let csr = &m.sim.hart(0).csr;
    assert_eq!(csr.mcause, exception::BREAKPOINT);
    assert_eq!(csr.mepc, RAM_BASE + 20, "mepc points at the ebreak");
}

// ══════════════════════════════════════════════════════════
// 2. Seed: LR/SC success and failure
// ══════════════════════════════════════════════════════════

#[test]
fn seed_lr_sc_success() {
    let mut m = TestMachine::new();
    let addr = RAM_BASE + 0x3000;
    m.set_x(11, addr); // a1
    m.set_x(13, 0x5EED_F00D); // a3
    m.load_program(&[lr_w(10, 11), sc_w(12, 13, 11)]);
    m.run(2);
    assert_eq!(m.x(12), 0, "sc.w reports success");
    assert_eq!(m.mem_word(addr), 0x5EED_F00D);
}

#[test]
fn seed_lr_sc_fails_on_foreign_store() {
    let mut m = TestMachine::new();
    let addr = RAM_BASE + 0x3000;
    m.set_x(11, addr);
    m.set_x(13, 0x2222_2222);
    m.load_program(&[lr_w(10, 11), sc_w(12, 13, 11)]);

    m.run(1); // lr.w retires and reserves the line
    // Another master writes the line through backing-store coherence.
    m.sim.write_memory(addr, &0x1111_1111u32.to_le_bytes());
    m.run(1); // sc.w

    assert_ne!(m.x(12), 0, "sc.w reports failure");
    assert_eq!(m.mem_word(addr), 0x1111_1111, "memory holds the foreign value");
}

#[test]
fn lr_sc_across_two_harts() {
    let mut m = TestMachine::with_harts(2);
    let addr = RAM_BASE + 0x3000;
    // Hart 0: lr.w; nop; sc.w. The nop leaves hart 1's store between the
    // pair in the round-robin interleave.
    m.load_program(&[lr_w(10, 11), addi(0, 0, 0), sc_w(12, 13, 11)]);
    // Hart 1 starts two instructions in (skips into its own store).
    let h1_text = RAM_BASE + 0x100;
    m.load_program_at(h1_text, &[sw(13, 11, 0), jal(0, 0)]);
    for h in 0..2 {
        m.sim.hart_mut(h).gpr.write(11, addr);
    }
    m.sim.hart_mut(0).gpr.write(13, 0xAAAA_AAAA);
    m.sim.hart_mut(1).gpr.write(13, 0xBBBB_BBBB);
    m.sim.hart_mut(1).pc = h1_text;

    // Pass 1: hart0 lr.w, hart1 sw (invalidates the reservation).
    // Pass 2: hart0 nop; pass 3: hart0 sc.w fails.
    m.run(3);
    assert_ne!(m.x(12), 0);
    assert_eq!(m.mem_word(addr), 0xBBBB_BBBB);
}

#[test]
fn amoadd_is_coherent_across_harts() {
    let mut m = TestMachine::with_harts(2);
    let addr = RAM_BASE + 0x3100;
    let program: Vec<u32> = std::iter::repeat(amoadd_w(5, 6, 7)).take(5).collect();
    m.load_program(&program);
    for h in 0..2 {
        m.sim.hart_mut(h).gpr.write(6, 1);
        m.sim.hart_mut(h).gpr.write(7, addr);
    }
    m.run(5);
    assert_eq!(m.mem_word(addr), 10, "ten coherent increments");
}

// ══════════════════════════════════════════════════════════
// 3. Seed: Sv32 mega-page
// ══════════════════════════════════════════════════════════

#[test]
fn seed_megapage_user_load() {
    let mut m = TestMachine::new();
    let root = RAM_BASE + 0x0040_0000;
    let vpn1 = RAM_BASE >> 22;
    // Level-1 leaf: identity map of 0x8000_0000..0x8040_0000 with U+R.
    let pte = ((RAM_BASE >> 12) << 10) | PTE_U | PTE_R | PTE_V;
    m.sim.write_memory(root + vpn1 * 4, &pte.to_le_bytes());
    m.sim
        .write_memory(RAM_BASE + 0x0010_0004, &0x0BAD_F00Du32.to_le_bytes());

    let (hart, sys) = m.sim.hart_and_system(0);
    hart.lsu.atp_on(root >> 12);

    let mut step = StepResult::new(0, 0, PrivilegeMode::User, 0);
    step.m_vaddr = RAM_BASE + 0x0010_0004;
    assert_eq!(hart.lsu.load(4, sys, &mut step), 0);
    assert_eq!(step.rd_data, 0x0BAD_F00D);
    assert_eq!(step.m_paddr, RAM_BASE + 0x0010_0004, "identity translation");
}

#[test]
fn seed_megapage_without_user_bit_faults() {
    let mut m = TestMachine::new();
    let root = RAM_BASE + 0x0040_0000;
    let vpn1 = RAM_BASE >> 22;
    let pte = ((RAM_BASE >> 12) << 10) | PTE_R | PTE_V; // no U
    m.sim.write_memory(root + vpn1 * 4, &pte.to_le_bytes());

    let (hart, sys) = m.sim.hart_and_system(0);
    hart.lsu.atp_on(root >> 12);

    let mut step = StepResult::new(0, 0, PrivilegeMode::User, 0);
    step.m_vaddr = RAM_BASE + 0x0010_0004;
    assert_eq!(
        hart.lsu.load(4, sys, &mut step),
        exception::LOAD_PAGE_FAULT
    );
}

#[test]
fn satp_switch_runs_supervisor_code_under_translation() {
    let mut m = TestMachine::new();
    park_mtvec(&mut m);
    let root = RAM_BASE + 0x0040_0000;
    let vpn1 = RAM_BASE >> 22;
    // Identity mega-page with RWX for supervisor execution.
    let pte = ((RAM_BASE >> 12) << 10) | PTE_X | PTE_W | PTE_R | PTE_V;
    m.sim.write_memory(root + vpn1 * 4, &pte.to_le_bytes());

    // M-mode prologue: write satp, mret into S-mode at +8.
    m.set_x(1, 0x8000_0000 | (root >> 12));
    m.load_program(&[
        csrrw(0, 0x180, 1), // satp
        mret(),
        addi(5, 0, 7), // executes translated, in S-mode
        ebreak(),
    ]);
    {
        let csr = &mut m.sim.hart_mut(0).csr;
        csr.mepc = RAM_BASE + 8;
        csr.mstatus |= 1 << MSTATUS_MPP_SHIFT; // MPP = S
    }
    m.run(4);
    assert_eq!(m.x(5), 7);
    let csr = &m.sim.hart(0).csr;
    assert_eq!(csr.mcause, exception::BREAKPOINT);
    assert_eq!(csr.mode, PrivilegeMode::Machine, "ebreak trapped back to M");
}

// ══════════════════════════════════════════════════════════
// 4. Seed: FDIV through the pipeline
// ══════════════════════════════════════════════════════════

#[test]
fn seed_fdiv_one_third() {
    let mut m = TestMachine::new();
    m.set_f(1, 1.0f32.to_bits());
    m.set_f(2, 3.0f32.to_bits());
    m.load_program(&[fdiv_s(3, 1, 2, 0)]); // RNE
    m.run(1);
    assert_eq!(m.f(3), 0x3EAA_AAAB);
    let csr = &m.sim.hart(0).csr;
    assert_eq!(
        u32::from(csr.fflags.bits()) & u32::from(Fflags::NX.0),
        u32::from(Fflags::NX.0)
    );
}

#[test]
fn float_roundtrip_through_memory() {
    let mut m = TestMachine::new();
    let data = RAM_BASE + 0x3200;
    m.set_x(1, data);
    m.set_x(2, 2.5f32.to_bits());
    m.load_program(&[
        fmv_w_x(1, 2),      // f1 = 2.5
        fsw(1, 1, 0),       // store
        flw(2, 1, 0),       // reload into f2
        fadd_s(3, 1, 2, 0), // 5.0
        fmv_x_w(5, 3),
    ]);
    m.run(5);
    assert_eq!(f32::from_bits(m.x(5)), 5.0);
}

#[test]
fn invalid_rounding_mode_is_illegal() {
    let mut m = TestMachine::new();
    park_mtvec(&mut m);
    m.set_f(1, 1.0f32.to_bits());
    m.set_f(2, 2.0f32.to_bits());
    m.load_program(&[fadd_s(3, 1, 2, 0b101)]); // reserved rm
    m.run(1);
    assert_eq!(m.sim.hart(0).csr.mcause, exception::ILLEGAL_INSTRUCTION);
}

// ══════════════════════════════════════════════════════════
// 5. Seed: timer interrupt
// ══════════════════════════════════════════════════════════

#[test]
fn seed_timer_interrupt_enters_the_handler() {
    let mut m = TestMachine::new();
    park_mtvec(&mut m);
    m.load_program(&[addi(1, 0, 1), jal(0, 0)]);
    {
        let csr = &mut m.sim.hart_mut(0).csr;
        csr.mie = IRQ_MTI;
        csr.mstatus |= MSTATUS_MIE;
    }
    // mtimecmp is already at its reset maximum; bring it below mtime so
    // mtip levels immediately.
    if let Some(aclint) = m.sim.sys.bus.aclint_mut() {
        aclint.set_mtime(1);
        aclint.set_mtimecmp(0, 0);
    }

    m.run(1);
    let csr = &m.sim.hart(0).csr;
    assert_eq!(csr.mcause, INTERRUPT_BIT | interrupt::MACHINE_TIMER);
    assert_eq!(csr.mepc, RAM_BASE, "the interrupted instruction's pc");
    assert_eq!(m.pc(), HANDLER);
}

#[test]
fn software_interrupt_via_msip() {
    let mut m = TestMachine::new();
    park_mtvec(&mut m);
    m.load_program(&[jal(0, 0)]);
    {
        let csr = &mut m.sim.hart_mut(0).csr;
        csr.mie = IRQ_MSI;
        csr.mstatus |= MSTATUS_MIE;
    }
    m.run(1); // no interrupt yet
    assert_eq!(m.pc(), RAM_BASE);

    if let Some(aclint) = m.sim.sys.bus.aclint_mut() {
        aclint.set_msip(0, true);
    }
    m.run(1);
    let csr = &m.sim.hart(0).csr;
    assert_eq!(csr.mcause, INTERRUPT_BIT | interrupt::MACHINE_SOFTWARE);
    assert_eq!(m.pc(), HANDLER);
}

// ══════════════════════════════════════════════════════════
// 6. WFI
// ══════════════════════════════════════════════════════════

#[test]
fn wfi_parks_until_an_interrupt_pends() {
    let mut m = TestMachine::new();
    park_mtvec(&mut m);
    m.load_program(&[wfi()]);
    {
        let csr = &mut m.sim.hart_mut(0).csr;
        csr.mie = IRQ_MSI;
        csr.mstatus |= MSTATUS_MIE;
    }

    m.run(5);
    assert_eq!(m.pc(), RAM_BASE, "pc holds at the wfi");
    assert!(m.sim.hart(0).wfi_parked);

    if let Some(aclint) = m.sim.sys.bus.aclint_mut() {
        aclint.set_msip(0, true);
    }
    m.run(1);
    assert!(!m.sim.hart(0).wfi_parked);
    assert_eq!(m.pc(), HANDLER, "wake delivers straight into the handler");
    assert_eq!(m.sim.hart(0).csr.mepc, RAM_BASE);
}

// ══════════════════════════════════════════════════════════
// 7. Triggers and debug mode
// ══════════════════════════════════════════════════════════

#[test]
fn store_address_trigger_raises_breakpoint() {
    let mut m = TestMachine::new();
    park_mtvec(&mut m);
    let watched = RAM_BASE + 0x3300;
    // match6, store-access, M-mode, action = trap.
    m.sim.trig.set_tdata(0, 0, (6 << 28) | (1 << 6) | 0b010);
    m.sim.trig.set_tdata(0, 1, watched);

    m.set_x(1, watched);
    m.set_x(2, 0x77);
    m.load_program(&[sw(2, 1, 0), addi(5, 0, 1)]);
    m.run(1);

    let csr = &m.sim.hart(0).csr;
    assert_eq!(csr.mcause, exception::BREAKPOINT);
    assert_eq!(m.mem_word(watched), 0x77, "the store itself retired");
    assert_eq!(m.pc(), HANDLER);
}

#[test]
fn icount_trigger_parks_the_hart_in_debug_mode() {
    let mut m = TestMachine::new();
    // icount, count = 2, M-mode, action = enter debug.
    m.sim.trig.set_tdata(0, 0, (3 << 28) | (2 << 10) | (1 << 9) | 1);
    m.load_program(&[addi(1, 0, 1), addi(2, 0, 2), addi(3, 0, 3)]);

    m.run(4);
    let hart = m.sim.hart(0);
    assert!(hart.debug_halted);
    assert_eq!(m.x(2), 2, "two instructions retired before the halt");
    assert_eq!(m.x(3), 0, "the third never ran");
    assert_eq!(m.sim.hart(0).csr.dpc, RAM_BASE + 8);

    m.sim.resume_hart(0).unwrap();
    m.run(1);
    assert_eq!(m.x(3), 3);
}

#[test]
fn debugger_halt_and_single_step() {
    let mut m = TestMachine::new();
    m.load_program(&[addi(1, 0, 1), addi(2, 0, 2), addi(3, 0, 3)]);
    m.sim.halt_hart(0).unwrap();
    m.run(3);
    assert_eq!(m.x(1), 0, "halted hart makes no progress");

    m.sim.single_step(0).unwrap();
    assert_eq!(m.x(1), 1);
    assert_eq!(m.x(2), 0);
    assert!(m.sim.hart(0).debug_halted);

    m.sim.resume_hart(0).unwrap();
    m.run(2);
    assert_eq!(m.x(3), 3);
}

// ══════════════════════════════════════════════════════════
// 8. Devices from guest code
// ══════════════════════════════════════════════════════════

#[test]
fn guest_writes_reach_the_uart() {
    let mut m = TestMachine::new();
    let buffer = m.sim.uart_buffer().unwrap();
    buffer.push_input(b"y");

    m.set_x(1, UART_BASE);
    m.set_x(2, u32::from(b'H'));
    m.load_program(&[
        sb(2, 1, 0),  // THR <- 'H'
        lbu(3, 1, 5), // LSR: receiver-data-ready
        lbu(4, 1, 0), // RHR <- 'y'
    ]);
    m.run(3);
    assert_eq!(buffer.take_output(), b"H");
    assert_eq!(m.x(3) & 1, 1);
    assert_eq!(m.x(4), u32::from(b'y'));
}

#[test]
fn virtio_capacity_visible_to_the_guest() {
    use std::io::Write;

    // Stage a disk image on disk, the way an embedder would attach one.
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&vec![0u8; 2048]).unwrap();
    let image = std::fs::read(file.path()).unwrap();

    let mut m = TestMachine::new();
    m.sim.attach_virtio(image);

    m.set_x(1, 0x1000_1000); // virtio-mmio base
    m.load_program(&[
        lw(2, 1, 0),     // magic
        lw(3, 1, 0x100), // capacity in sectors
    ]);
    m.run(2);
    assert_eq!(m.x(2), 0x7472_6976, "\"virt\" magic");
    assert_eq!(m.x(3), 4, "2048 bytes is four 512-byte sectors");
}

#[test]
fn htif_style_exit_watch() {
    let mut m = TestMachine::new();
    let tohost = RAM_BASE + 0x3400;
    m.sim.set_tohost(tohost);
    m.set_x(1, tohost);
    m.set_x(2, (42 << 1) | 1); // odd: shutdown, code 42
    m.load_program(&[sw(2, 1, 0), jal(0, 0)]);
    m.run(2);
    assert_eq!(m.sim.take_exit(), Some(42));
}
