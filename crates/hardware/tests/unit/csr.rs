//! CSR file tests: access control, trap setup, delegation, interrupt
//! ranking, and the satp side effect.

use pretty_assertions::assert_eq;

use wrensim_core::core::csr::{
    self, CsrCtx, CsrFile, IrqLines, MSTATUS_MIE, MSTATUS_MPP_SHIFT, MSTATUS_SIE,
};
use wrensim_core::core::mode::PrivilegeMode;
use wrensim_core::core::step::{StepResult, TrapReturn};
use wrensim_core::core::trigger::TriggerUnit;
use wrensim_core::isa::cause::{exception, interrupt, INTERRUPT_BIT};
use wrensim_core::mem::Lsu;
use wrensim_core::soc::System;

struct Fixture {
    csr: CsrFile,
    lsu: Lsu,
    trig: TriggerUnit,
    sys: System,
}

impl Fixture {
    fn new() -> Self {
        let mut sys = System::default();
        let lsu = Lsu::new(&mut sys, (32, 64), (32, 64), 64);
        Self {
            csr: CsrFile::new(0),
            lsu,
            trig: TriggerUnit::new(4),
            sys,
        }
    }

    fn op<R>(&mut self, f: impl FnOnce(&mut CsrFile, &mut CsrCtx<'_>, &mut StepResult) -> R) -> (R, StepResult) {
        let mut result = StepResult::new(0, 0, self.csr.mode, 0x8000_0000);
        let mut ctx = CsrCtx {
            lsu: &mut self.lsu,
            trig: &mut self.trig,
            mtime: 0x1234_5678_9ABC,
        };
        let r = f(&mut self.csr, &mut ctx, &mut result);
        (r, result)
    }
}

// ══════════════════════════════════════════════════════════
// 1. Access control
// ══════════════════════════════════════════════════════════

#[test]
fn user_mode_cannot_touch_machine_csrs() {
    let mut fx = Fixture::new();
    fx.csr.mode = PrivilegeMode::User;
    let (_, result) = fx.op(|c, ctx, r| c.csrrs(csr::MSTATUS, 0, false, ctx, r));
    assert_eq!(result.exception_code, exception::ILLEGAL_INSTRUCTION);
}

#[test]
fn writes_to_read_only_csrs_are_illegal() {
    let mut fx = Fixture::new();
    let (_, result) = fx.op(|c, ctx, r| c.csrrw(csr::MHARTID, 1, ctx, r));
    assert_eq!(result.exception_code, exception::ILLEGAL_INSTRUCTION);

    // A read-only CSR read through CSRRS without a write is fine.
    let (v, result) = fx.op(|c, ctx, r| c.csrrs(csr::MHARTID, 0, false, ctx, r));
    assert_eq!(result.exception_code, 0);
    assert_eq!(v, 0);
}

#[test]
fn unknown_csr_is_illegal() {
    let mut fx = Fixture::new();
    let (_, result) = fx.op(|c, ctx, r| c.csrrs(0x5C0, 0, false, ctx, r));
    assert_eq!(result.exception_code, exception::ILLEGAL_INSTRUCTION);
}

#[test]
fn counters_gate_on_mcounteren() {
    let mut fx = Fixture::new();
    fx.csr.mode = PrivilegeMode::Supervisor;
    let (_, result) = fx.op(|c, ctx, r| c.csrrs(csr::CYCLE, 0, false, ctx, r));
    assert_eq!(result.exception_code, exception::ILLEGAL_INSTRUCTION);

    fx.csr.mcounteren = 0b111;
    let (_, result) = fx.op(|c, ctx, r| c.csrrs(csr::CYCLE, 0, false, ctx, r));
    assert_eq!(result.exception_code, 0);
}

#[test]
fn time_reads_come_from_the_aclint_sample() {
    let mut fx = Fixture::new();
    let (lo, _) = fx.op(|c, ctx, r| c.csrrs(csr::TIME, 0, false, ctx, r));
    let (hi, _) = fx.op(|c, ctx, r| c.csrrs(csr::TIMEH, 0, false, ctx, r));
    assert_eq!(lo, 0x5678_9ABC);
    assert_eq!(hi, 0x1234);
}

#[test]
fn sstatus_is_a_masked_view_of_mstatus() {
    let mut fx = Fixture::new();
    let (_, _) = fx.op(|c, ctx, r| {
        c.csrrw(csr::MSTATUS, MSTATUS_SIE | MSTATUS_MIE, ctx, r)
    });
    let (sstatus, _) = fx.op(|c, ctx, r| c.csrrs(csr::SSTATUS, 0, false, ctx, r));
    assert_eq!(sstatus & MSTATUS_SIE, MSTATUS_SIE);
    assert_eq!(sstatus & MSTATUS_MIE, 0, "MIE is invisible through sstatus");
}

// ══════════════════════════════════════════════════════════
// 2. satp side effect
// ══════════════════════════════════════════════════════════

#[test]
fn satp_write_retargets_the_lsu_and_flushes() {
    let mut fx = Fixture::new();
    let (_, result) = fx.op(|c, ctx, r| c.csrrw(csr::SATP, 0x8008_0123, ctx, r));
    assert!(result.flush, "translation change must flush the fetch window");
    assert_eq!(fx.lsu.atp_get(), 0x8008_0123);

    let (old, _) = fx.op(|c, ctx, r| c.csrrw(csr::SATP, 0, ctx, r));
    assert_eq!(old, 0x8008_0123);
    assert_eq!(fx.lsu.atp_get(), 0);
}

// ══════════════════════════════════════════════════════════
// 3. Trap entry, delegation, and return
// ══════════════════════════════════════════════════════════

fn exception_step(code: u32, pc: u32) -> StepResult {
    let mut r = StepResult::new(0, 0, PrivilegeMode::User, pc);
    r.exception_code = code;
    r
}

#[test]
fn machine_trap_saves_and_redirects() {
    let mut fx = Fixture::new();
    fx.csr.mtvec = 0x8000_4000;
    fx.csr.mstatus |= MSTATUS_MIE;
    fx.csr.mode = PrivilegeMode::User;

    let step = exception_step(exception::ENVIRONMENT_CALL_U, 0x8000_0010);
    let handler = fx.csr.trap_enter(&step);

    assert_eq!(handler, 0x8000_4000);
    assert_eq!(fx.csr.mcause, exception::ENVIRONMENT_CALL_U);
    assert_eq!(fx.csr.mepc, 0x8000_0010);
    assert_eq!(fx.csr.mode, PrivilegeMode::Machine);
    assert_eq!(fx.csr.mstatus & MSTATUS_MIE, 0, "MIE cleared on entry");
    assert_eq!(
        (fx.csr.mstatus >> MSTATUS_MPP_SHIFT) & 3,
        0,
        "MPP records user mode"
    );
}

#[test]
fn delegated_exception_lands_in_supervisor() {
    let mut fx = Fixture::new();
    fx.csr.stvec = 0x8000_5000;
    fx.csr.medeleg = 1 << exception::ENVIRONMENT_CALL_U;
    fx.csr.mode = PrivilegeMode::User;

    let step = exception_step(exception::ENVIRONMENT_CALL_U, 0x8000_0020);
    let handler = fx.csr.trap_enter(&step);

    assert_eq!(handler, 0x8000_5000);
    assert_eq!(fx.csr.scause, exception::ENVIRONMENT_CALL_U);
    assert_eq!(fx.csr.sepc, 0x8000_0020);
    assert_eq!(fx.csr.mode, PrivilegeMode::Supervisor);
}

#[test]
fn machine_mode_traps_ignore_delegation() {
    let mut fx = Fixture::new();
    fx.csr.mtvec = 0x8000_4000;
    fx.csr.medeleg = 1 << exception::ILLEGAL_INSTRUCTION;
    fx.csr.mode = PrivilegeMode::Machine;

    let mut step = exception_step(exception::ILLEGAL_INSTRUCTION, 0x8000_0030);
    step.prv = PrivilegeMode::Machine;
    let handler = fx.csr.trap_enter(&step);
    assert_eq!(handler, 0x8000_4000, "M-mode never delegates to S");
    assert_eq!(fx.csr.mode, PrivilegeMode::Machine);
}

#[test]
fn mret_restores_privilege_and_interrupt_enable() {
    let mut fx = Fixture::new();
    fx.csr.mtvec = 0x8000_4000;
    fx.csr.mstatus |= MSTATUS_MIE;
    fx.csr.mode = PrivilegeMode::User;
    let _ = fx.csr.trap_enter(&exception_step(exception::ENVIRONMENT_CALL_U, 0x8000_0040));

    let target = fx.csr.trap_return(TrapReturn::Machine);
    assert_eq!(target, 0x8000_0040);
    assert_eq!(fx.csr.mode, PrivilegeMode::User);
    assert_eq!(fx.csr.mstatus & MSTATUS_MIE, MSTATUS_MIE, "MIE restored from MPIE");
}

#[test]
fn vectored_interrupts_offset_by_cause() {
    let mut fx = Fixture::new();
    fx.csr.mtvec = 0x8000_4001; // vectored
    let handler = fx.csr.interrupt_enter(interrupt::MACHINE_TIMER, 0x8000_0050);
    assert_eq!(handler, 0x8000_4000 + 4 * interrupt::MACHINE_TIMER);
    assert_eq!(fx.csr.mcause, INTERRUPT_BIT | interrupt::MACHINE_TIMER);
}

// ══════════════════════════════════════════════════════════
// 4. Interrupt ranking and permission
// ══════════════════════════════════════════════════════════

#[test]
fn external_outranks_software_outranks_timer() {
    let mut fx = Fixture::new();
    fx.csr.mstatus |= MSTATUS_MIE;
    fx.csr.mie = csr::IRQ_MEI | csr::IRQ_MSI | csr::IRQ_MTI;
    fx.csr.update_irq_lines(IrqLines {
        meip: true,
        seip: false,
        mtip: true,
        msip: true,
    });
    assert_eq!(fx.csr.pending_interrupt(), Some(interrupt::MACHINE_EXTERNAL));

    fx.csr.update_irq_lines(IrqLines {
        meip: false,
        seip: false,
        mtip: true,
        msip: true,
    });
    assert_eq!(fx.csr.pending_interrupt(), Some(interrupt::MACHINE_SOFTWARE));

    fx.csr.update_irq_lines(IrqLines {
        meip: false,
        seip: false,
        mtip: true,
        msip: false,
    });
    assert_eq!(fx.csr.pending_interrupt(), Some(interrupt::MACHINE_TIMER));
}

#[test]
fn machine_interrupts_need_mie_only_in_machine_mode() {
    let mut fx = Fixture::new();
    fx.csr.mie = csr::IRQ_MTI;
    fx.csr.update_irq_lines(IrqLines {
        mtip: true,
        ..Default::default()
    });

    // M-mode with MIE clear: masked.
    assert_eq!(fx.csr.pending_interrupt(), None);
    // Lower privilege: machine interrupts are always permitted.
    fx.csr.mode = PrivilegeMode::User;
    assert_eq!(fx.csr.pending_interrupt(), Some(interrupt::MACHINE_TIMER));
}

#[test]
fn delegated_interrupt_targets_supervisor_enable() {
    let mut fx = Fixture::new();
    fx.csr.mideleg = csr::IRQ_SSI;
    fx.csr.mie = csr::IRQ_SSI;
    let (_, _) = fx.op(|c, ctx, r| c.csrrs(csr::SIP, csr::IRQ_SSI, true, ctx, r));

    // S-mode with SIE clear: masked.
    fx.csr.mode = PrivilegeMode::Supervisor;
    assert_eq!(fx.csr.pending_interrupt(), None);
    fx.csr.mstatus |= MSTATUS_SIE;
    assert_eq!(
        fx.csr.pending_interrupt(),
        Some(interrupt::SUPERVISOR_SOFTWARE)
    );
}

// ══════════════════════════════════════════════════════════
// 5. Trigger CSR delegation
// ══════════════════════════════════════════════════════════

#[test]
fn tdata_accesses_route_through_tselect() {
    let mut fx = Fixture::new();
    let (_, _) = fx.op(|c, ctx, r| c.csrrw(csr::TSELECT, 1, ctx, r));
    let (_, _) = fx.op(|c, ctx, r| c.csrrw(csr::TDATA2, 0x8000_1234, ctx, r));
    assert_eq!(fx.trig.tdata(1, 1), 0x8000_1234);
    assert_eq!(fx.trig.tdata(0, 1), 0, "trigger 0 untouched");

    // tselect clamps to the implemented range.
    let (_, _) = fx.op(|c, ctx, r| c.csrrw(csr::TSELECT, 99, ctx, r));
    let (v, _) = fx.op(|c, ctx, r| c.csrrs(csr::TSELECT, 0, false, ctx, r));
    assert_eq!(v, 3);
}
