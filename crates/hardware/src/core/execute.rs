//! Execute stage.
//!
//! Dispatches the expanded 32-bit instruction to its functional unit,
//! recording destinations, memory effects, and exceptions in the step
//! result. Sign extension of sub-word loads, the M-extension edge cases,
//! and the soft-float operand substitutions all live here; write-back
//! decisions stay in [`super::Hart::step`].

use super::csr::CsrCtx;
use super::mode::PrivilegeMode;
use super::step::{MemAccessKind, StepResult, TrapReturn};
use super::Hart;
use crate::isa::cause::exception;
use crate::isa::decode::{imm_b, imm_i, imm_j, imm_s, imm_u, ALT_FUNCT_BIT};
use crate::isa::opcodes::{self, amo, fp, system};
use crate::isa::InstructionBits;
use crate::softfloat::{self, RoundingMode, SIGN_BIT};

/// 1.0f32, the multiplicative identity substituted for FADD/FSUB.
const F32_ONE: u32 = 0x3F80_0000;

// Atomic ALU operations (AMO funct5 dispatch).
fn op_add(a: u32, b: u32) -> u32 {
    a.wrapping_add(b)
}
fn op_swap(_a: u32, b: u32) -> u32 {
    b
}
fn op_xor(a: u32, b: u32) -> u32 {
    a ^ b
}
fn op_or(a: u32, b: u32) -> u32 {
    a | b
}
fn op_and(a: u32, b: u32) -> u32 {
    a & b
}
fn op_min(a: u32, b: u32) -> u32 {
    if (a as i32) < (b as i32) {
        a
    } else {
        b
    }
}
fn op_max(a: u32, b: u32) -> u32 {
    if (a as i32) < (b as i32) {
        b
    } else {
        a
    }
}
fn op_minu(a: u32, b: u32) -> u32 {
    a.min(b)
}
fn op_maxu(a: u32, b: u32) -> u32 {
    a.max(b)
}

impl Hart {
    /// Resolves the instruction's rounding mode, substituting `frm` for the
    /// dynamic encoding. `None` raises illegal-instruction.
    fn rounding_mode(&self, inst: u32) -> Option<RoundingMode> {
        let rm = inst.rm();
        let rm = if rm == softfloat::rounding::RM_DYN {
            self.csr.frm
        } else {
            rm
        };
        RoundingMode::from_bits(rm)
    }

    /// Executes the expanded instruction in `result.inst`.
    pub(super) fn execute(
        &mut self,
        sys: &mut crate::soc::System,
        trig: &mut super::trigger::TriggerUnit,
        mtime: u64,
        result: &mut StepResult,
    ) {
        let inst = result.inst;
        match result.opcode {
            opcodes::OP_LOAD => {
                result.m_access = MemAccessKind::Load;
                result.rd = inst.rd();
                result.rs1 = inst.rs1();
                result.m_vaddr = self.gpr.read(result.rs1).wrapping_add(imm_i(inst));
                match inst.funct3() {
                    0x0 => {
                        if self.lsu.load(1, sys, result) == 0 {
                            result.rd_data = result.rd_data as u8 as i8 as i32 as u32;
                        }
                    }
                    0x1 => {
                        if self.lsu.load(2, sys, result) == 0 {
                            result.rd_data = result.rd_data as u16 as i16 as i32 as u32;
                        }
                    }
                    0x2 => {
                        let _ = self.lsu.load(4, sys, result);
                    }
                    0x4 => {
                        let _ = self.lsu.load(1, sys, result);
                    }
                    0x5 => {
                        let _ = self.lsu.load(2, sys, result);
                    }
                    _ => result.exception_code = exception::ILLEGAL_INSTRUCTION,
                }
            }

            opcodes::OP_LOAD_FP => {
                if !self.csr.fp_enabled() || inst.funct3() != 0x2 {
                    result.exception_code = exception::ILLEGAL_INSTRUCTION;
                    return;
                }
                result.m_access = MemAccessKind::Load;
                result.rd_is_fpr = true;
                result.rd = inst.rd();
                result.rs1 = inst.rs1();
                result.m_vaddr = self.gpr.read(result.rs1).wrapping_add(imm_i(inst));
                let _ = self.lsu.load(4, sys, result);
            }

            opcodes::OP_MISC_MEM => {
                if inst.funct3() == 0x1 {
                    self.lsu.fence_i(sys);
                    result.flush = true;
                } else {
                    // FENCE and FENCE.TSO: only the full fence is modeled.
                    self.lsu.fence(sys);
                }
            }

            opcodes::OP_IMM | opcodes::OP_OP => {
                let funct3 = inst.funct3();
                result.rd = inst.rd();
                result.rs1 = inst.rs1();
                let src1 = self.gpr.read(result.rs1);
                let src2 = if result.opcode == opcodes::OP_IMM {
                    imm_i(inst)
                } else {
                    result.rs2 = inst.rs2();
                    self.gpr.read(result.rs2)
                };

                if result.opcode == opcodes::OP_OP && inst.funct7() == 0x01 {
                    // M extension.
                    result.rd_data = match funct3 {
                        0x0 => (i64::from(src1 as i32).wrapping_mul(i64::from(src2 as i32)))
                            as u32,
                        0x1 => ((i64::from(src1 as i32).wrapping_mul(i64::from(src2 as i32)))
                            >> 32) as u32,
                        0x2 => ((i64::from(src1 as i32).wrapping_mul(u64::from(src2) as i64))
                            >> 32) as u32,
                        0x3 => ((u64::from(src1) * u64::from(src2)) >> 32) as u32,
                        0x4 => {
                            // DIV: division by zero yields all ones; the
                            // INT_MIN / -1 overflow yields INT_MIN.
                            if src2 == 0 {
                                u32::MAX
                            } else if src1 == 0x8000_0000 && src2 == u32::MAX {
                                0x8000_0000
                            } else {
                                ((src1 as i32) / (src2 as i32)) as u32
                            }
                        }
                        0x5 => {
                            if src2 == 0 {
                                u32::MAX
                            } else {
                                src1 / src2
                            }
                        }
                        0x6 => {
                            // REM: division by zero yields the dividend; the
                            // overflow case yields zero.
                            if src2 == 0 {
                                src1
                            } else if src1 == 0x8000_0000 && src2 == u32::MAX {
                                0
                            } else {
                                ((src1 as i32) % (src2 as i32)) as u32
                            }
                        }
                        _ => {
                            if src2 == 0 {
                                src1
                            } else {
                                src1 % src2
                            }
                        }
                    };
                } else {
                    result.rd_data = match funct3 {
                        0x0 => {
                            if result.opcode == opcodes::OP_OP && inst & ALT_FUNCT_BIT != 0 {
                                src1.wrapping_sub(src2)
                            } else {
                                src1.wrapping_add(src2)
                            }
                        }
                        0x1 => src1 << (src2 & 0x1F),
                        0x2 => u32::from((src1 as i32) < (src2 as i32)),
                        0x3 => u32::from(src1 < src2),
                        0x4 => src1 ^ src2,
                        0x5 => {
                            if inst & ALT_FUNCT_BIT != 0 {
                                ((src1 as i32) >> (src2 & 0x1F)) as u32
                            } else {
                                src1 >> (src2 & 0x1F)
                            }
                        }
                        0x6 => src1 | src2,
                        _ => src1 & src2,
                    };
                }
            }

            opcodes::OP_AUIPC => {
                result.rd = inst.rd();
                result.rd_data = result.pc.wrapping_add(imm_u(inst));
            }

            opcodes::OP_LUI => {
                result.rd = inst.rd();
                result.rd_data = imm_u(inst);
            }

            opcodes::OP_STORE => {
                result.m_access = MemAccessKind::Store;
                result.rs1 = inst.rs1();
                result.rs2 = inst.rs2();
                result.m_vaddr = self.gpr.read(result.rs1).wrapping_add(imm_s(inst));
                result.m_data = self.gpr.read(result.rs2);
                match inst.funct3() {
                    0x0 => {
                        let _ = self.lsu.store(1, sys, result);
                    }
                    0x1 => {
                        let _ = self.lsu.store(2, sys, result);
                    }
                    0x2 => {
                        let _ = self.lsu.store(4, sys, result);
                    }
                    _ => result.exception_code = exception::ILLEGAL_INSTRUCTION,
                }
            }

            opcodes::OP_STORE_FP => {
                if !self.csr.fp_enabled() || inst.funct3() != 0x2 {
                    result.exception_code = exception::ILLEGAL_INSTRUCTION;
                    return;
                }
                result.m_access = MemAccessKind::Store;
                result.rs1 = inst.rs1();
                result.rs2 = inst.rs2();
                result.m_vaddr = self.gpr.read(result.rs1).wrapping_add(imm_s(inst));
                result.m_data = self.fpr.read(result.rs2);
                let _ = self.lsu.store(4, sys, result);
            }

            opcodes::OP_AMO => {
                if inst.funct3() != 0x2 {
                    result.exception_code = exception::ILLEGAL_INSTRUCTION;
                    return;
                }
                result.m_access = MemAccessKind::Access;
                result.rd = inst.rd();
                result.rs1 = inst.rs1();
                result.rs2 = inst.rs2();
                result.m_vaddr = self.gpr.read(result.rs1);
                result.m_data = self.gpr.read(result.rs2);
                let aq = inst & opcodes::AMO_AQ != 0;
                let rl = inst & opcodes::AMO_RL != 0;
                match inst.funct5() {
                    amo::LR => {
                        let _ = self.lsu.load_reserved(aq, sys, result);
                    }
                    amo::SC => {
                        let _ = self.lsu.store_conditional(rl, sys, result);
                    }
                    amo::ADD => {
                        let _ = self.lsu.amo(aq, rl, op_add, sys, result);
                    }
                    amo::SWAP => {
                        let _ = self.lsu.amo(aq, rl, op_swap, sys, result);
                    }
                    amo::XOR => {
                        let _ = self.lsu.amo(aq, rl, op_xor, sys, result);
                    }
                    amo::OR => {
                        let _ = self.lsu.amo(aq, rl, op_or, sys, result);
                    }
                    amo::AND => {
                        let _ = self.lsu.amo(aq, rl, op_and, sys, result);
                    }
                    amo::MIN => {
                        let _ = self.lsu.amo(aq, rl, op_min, sys, result);
                    }
                    amo::MAX => {
                        let _ = self.lsu.amo(aq, rl, op_max, sys, result);
                    }
                    amo::MINU => {
                        let _ = self.lsu.amo(aq, rl, op_minu, sys, result);
                    }
                    amo::MAXU => {
                        let _ = self.lsu.amo(aq, rl, op_maxu, sys, result);
                    }
                    _ => result.exception_code = exception::ILLEGAL_INSTRUCTION,
                }
            }

            opcodes::OP_MADD | opcodes::OP_MSUB | opcodes::OP_NMSUB | opcodes::OP_NMADD => {
                if !self.csr.fp_enabled() {
                    result.exception_code = exception::ILLEGAL_INSTRUCTION;
                    return;
                }
                let Some(rm) = self.rounding_mode(inst) else {
                    result.exception_code = exception::ILLEGAL_INSTRUCTION;
                    return;
                };
                result.rd = inst.rd();
                result.rs1 = inst.rs1();
                result.rs2 = inst.rs2();
                result.rs3 = inst.rs3();
                result.rd_is_fpr = true;
                let a = self.fpr.read(result.rs1);
                let b = self.fpr.read(result.rs2);
                let c = self.fpr.read(result.rs3);
                let (value, flags) = match result.opcode {
                    opcodes::OP_MADD => softfloat::fmadd(a, b, c, rm),
                    opcodes::OP_MSUB => softfloat::fmadd(a, b, SIGN_BIT ^ c, rm),
                    opcodes::OP_NMSUB => softfloat::fmadd(SIGN_BIT ^ a, b, c, rm),
                    _ => softfloat::fmadd(SIGN_BIT ^ a, b, SIGN_BIT ^ c, rm),
                };
                result.rd_data = value;
                result.fflags |= flags;
            }

            opcodes::OP_FP => self.execute_fp(inst, result),

            opcodes::OP_BRANCH => {
                result.rs1 = inst.rs1();
                result.rs2 = inst.rs2();
                let src1 = self.gpr.read(result.rs1);
                let src2 = self.gpr.read(result.rs2);
                let taken = match inst.funct3() {
                    0x0 => src1 == src2,
                    0x1 => src1 != src2,
                    0x4 => (src1 as i32) < (src2 as i32),
                    0x5 => (src1 as i32) >= (src2 as i32),
                    0x6 => src1 < src2,
                    0x7 => src1 >= src2,
                    _ => {
                        result.exception_code = exception::ILLEGAL_INSTRUCTION;
                        return;
                    }
                };
                if taken {
                    result.pc_next = result.pc.wrapping_add(imm_b(inst));
                }
            }

            opcodes::OP_JALR => {
                result.rd = inst.rd();
                result.rs1 = inst.rs1();
                result.rd_data = result.pc_next;
                result.pc_next = self.gpr.read(result.rs1).wrapping_add(imm_i(inst)) & !1;
            }

            opcodes::OP_JAL => {
                result.rd = inst.rd();
                result.rd_data = result.pc_next;
                result.pc_next = result.pc.wrapping_add(imm_j(inst));
            }

            opcodes::OP_SYSTEM => self.execute_system(inst, sys, trig, mtime, result),

            _ => result.exception_code = exception::ILLEGAL_INSTRUCTION,
        }
    }

    /// OP-FP dispatch (funct7 selects the operation).
    fn execute_fp(&mut self, inst: u32, result: &mut StepResult) {
        if !self.csr.fp_enabled() {
            result.exception_code = exception::ILLEGAL_INSTRUCTION;
            return;
        }
        result.rd = inst.rd();
        result.rs1 = inst.rs1();
        result.rs2 = inst.rs2();
        result.rd_is_fpr = true;
        let a = self.fpr.read(result.rs1);
        let b = self.fpr.read(result.rs2);

        // The rounding operations validate rm; the rest use funct3 as a
        // selector.
        let rounded = matches!(
            inst.funct7(),
            fp::FADD | fp::FSUB | fp::FMUL | fp::FDIV | fp::FSQRT | fp::FCVT_W_S | fp::FCVT_S_W
        );
        let rm = if rounded {
            match self.rounding_mode(inst) {
                Some(rm) => rm,
                None => {
                    result.exception_code = exception::ILLEGAL_INSTRUCTION;
                    return;
                }
            }
        } else {
            RoundingMode::Rne
        };

        let (value, flags) = match inst.funct7() {
            fp::FADD => softfloat::fmadd(F32_ONE, a, b, rm),
            fp::FSUB => softfloat::fmadd(F32_ONE, a, SIGN_BIT ^ b, rm),
            fp::FMUL => softfloat::fmadd(a, b, 0, rm),
            fp::FDIV => softfloat::fdiv(a, b, rm),
            fp::FSQRT => softfloat::fsqrt(a, rm),
            fp::FSGNJ => match inst.funct3() {
                0x0 => ((b & SIGN_BIT) | (a & !SIGN_BIT), Default::default()),
                0x1 => ((!b & SIGN_BIT) | (a & !SIGN_BIT), Default::default()),
                0x2 => (((a ^ b) & SIGN_BIT) | (a & !SIGN_BIT), Default::default()),
                _ => {
                    result.exception_code = exception::ILLEGAL_INSTRUCTION;
                    return;
                }
            },
            fp::FMINMAX => match inst.funct3() {
                0x0 => softfloat::fmin(a, b),
                0x1 => softfloat::fmax(a, b),
                _ => {
                    result.exception_code = exception::ILLEGAL_INSTRUCTION;
                    return;
                }
            },
            fp::FCMP => {
                result.rd_is_fpr = false;
                match inst.funct3() {
                    0x0 => softfloat::fle(a, b),
                    0x1 => softfloat::flt(a, b),
                    0x2 => softfloat::feq(a, b),
                    _ => {
                        result.exception_code = exception::ILLEGAL_INSTRUCTION;
                        return;
                    }
                }
            }
            fp::FCVT_W_S => {
                result.rd_is_fpr = false;
                match result.rs2 {
                    0 => softfloat::fcvt_w_s(a, rm, false),
                    1 => softfloat::fcvt_w_s(a, rm, true),
                    _ => {
                        result.exception_code = exception::ILLEGAL_INSTRUCTION;
                        return;
                    }
                }
            }
            fp::FCVT_S_W => {
                let word = self.gpr.read(result.rs1);
                match result.rs2 {
                    0 => softfloat::fcvt_s_w(word, rm, false),
                    1 => softfloat::fcvt_s_w(word, rm, true),
                    _ => {
                        result.exception_code = exception::ILLEGAL_INSTRUCTION;
                        return;
                    }
                }
            }
            fp::FMV_X_W => {
                result.rd_is_fpr = false;
                match inst.funct3() {
                    0x0 => (a, Default::default()),
                    0x1 => (softfloat::fclass(a), Default::default()),
                    _ => {
                        result.exception_code = exception::ILLEGAL_INSTRUCTION;
                        return;
                    }
                }
            }
            fp::FMV_W_X => (self.gpr.read(result.rs1), Default::default()),
            _ => {
                result.exception_code = exception::ILLEGAL_INSTRUCTION;
                return;
            }
        };
        result.rd_data = value;
        result.fflags |= flags;
    }

    /// SYSTEM dispatch: CSR operations, ECALL/EBREAK, xRET, WFI,
    /// SFENCE.VMA.
    fn execute_system(
        &mut self,
        inst: u32,
        sys: &mut crate::soc::System,
        trig: &mut super::trigger::TriggerUnit,
        mtime: u64,
        result: &mut StepResult,
    ) {
        let funct3 = inst.funct3();
        if funct3 & 0x3 != 0 {
            result.rd = inst.rd();
            let addr = inst.csr_addr();
            let mut ctx = CsrCtx {
                lsu: &mut self.lsu,
                trig,
                mtime,
            };
            let (value, write_enable) = if funct3 & 0x4 != 0 {
                (inst.csr_imm(), inst.csr_imm() != 0)
            } else {
                result.rs1 = inst.rs1();
                (self.gpr.read(result.rs1), result.rs1 != 0)
            };
            result.rd_data = match funct3 & 0x3 {
                0x1 => self.csr.csrrw(addr, value, &mut ctx, result),
                0x2 => self.csr.csrrs(addr, value, write_enable, &mut ctx, result),
                _ => self.csr.csrrc(addr, value, write_enable, &mut ctx, result),
            };
            return;
        }
        if funct3 != 0 {
            // funct3 = 4 is the hypervisor space.
            result.exception_code = exception::ILLEGAL_INSTRUCTION;
            return;
        }
        match inst.funct12() {
            system::ECALL => {
                result.exception_code = match self.csr.mode {
                    PrivilegeMode::Machine => exception::ENVIRONMENT_CALL_M,
                    PrivilegeMode::Supervisor => exception::ENVIRONMENT_CALL_S,
                    PrivilegeMode::User => exception::ENVIRONMENT_CALL_U,
                };
            }
            system::EBREAK => {
                result.exception_code = exception::BREAKPOINT;
            }
            system::SRET => {
                if self.csr.mode < PrivilegeMode::Supervisor {
                    result.exception_code = exception::ILLEGAL_INSTRUCTION;
                } else {
                    result.trap_return = Some(TrapReturn::Supervisor);
                    result.flush = true;
                }
            }
            system::MRET => {
                if self.csr.mode < PrivilegeMode::Machine {
                    result.exception_code = exception::ILLEGAL_INSTRUCTION;
                } else {
                    result.trap_return = Some(TrapReturn::Machine);
                    result.flush = true;
                }
            }
            system::WFI => {
                // WFI holds the PC and yields until an interrupt pends.
                result.wfi = true;
                result.pc_next = result.pc;
            }
            _ => {
                if inst.funct7() == system::SFENCE_VMA_FUNCT7 {
                    if self.csr.mode < PrivilegeMode::Supervisor {
                        result.exception_code = exception::ILLEGAL_INSTRUCTION;
                    } else {
                        self.lsu.sfence_vma(sys);
                        result.flush = true;
                    }
                } else {
                    result.exception_code = exception::ILLEGAL_INSTRUCTION;
                }
            }
        }
    }
}
