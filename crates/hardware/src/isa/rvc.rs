//! Compressed (C extension) instruction expansion.
//!
//! Provides [`expand`], which converts a 16-bit compressed instruction into
//! its canonical 32-bit equivalent. Unrecognized encodings expand to the
//! all-zero word, which the execute stage surfaces as illegal-instruction.
//!
//! Coverage is the RV32FC subset: quadrant 0 (ADDI4SPN, LW/FLW, SW/FSW),
//! quadrant 1 (ADDI, JAL, LI, ADDI16SP/LUI, SRLI/SRAI/ANDI, SUB/XOR/OR/AND,
//! J, BEQZ, BNEZ) and quadrant 2 (SLLI, LWSP/FLWSP, JR/MV/EBREAK/JALR/ADD,
//! SWSP/FSWSP).

use super::decode::ALT_FUNCT_BIT;
use super::opcodes;

/// ABI index of the return-address register (x1).
const REG_RA: u32 = 1;
/// ABI index of the stack-pointer register (x2).
const REG_SP: u32 = 2;
/// ABI index of the zero register (x0).
const REG_ZERO: u32 = 0;

/// The illegal-instruction sentinel (all-zero is not a valid encoding).
const ILLEGAL: u32 = 0;

fn addi(rd: u32, rs1: u32, imm: u32) -> u32 {
    (imm << 20) | (rs1 << 15) | (rd << 7) | opcodes::OP_IMM
}

fn slli(rd: u32, rs1: u32, shamt: u32) -> u32 {
    ((shamt & 0x1F) << 20) | (rs1 << 15) | (0b001 << 12) | (rd << 7) | opcodes::OP_IMM
}

fn srli(rd: u32, rs1: u32, shamt: u32) -> u32 {
    ((shamt & 0x1F) << 20) | (rs1 << 15) | (0b101 << 12) | (rd << 7) | opcodes::OP_IMM
}

fn srai(rd: u32, rs1: u32, shamt: u32) -> u32 {
    srli(rd, rs1, shamt) | ALT_FUNCT_BIT
}

fn andi(rd: u32, rs1: u32, imm: u32) -> u32 {
    (imm << 20) | (rs1 << 15) | (0b111 << 12) | (rd << 7) | opcodes::OP_IMM
}

fn lui(rd: u32, imm: u32) -> u32 {
    (imm & 0xFFFF_F000) | (rd << 7) | opcodes::OP_LUI
}

fn lw(rd: u32, base: u32, offs: u32) -> u32 {
    (offs << 20) | (base << 15) | (0b010 << 12) | (rd << 7) | opcodes::OP_LOAD
}

fn flw(rd: u32, base: u32, offs: u32) -> u32 {
    (offs << 20) | (base << 15) | (0b010 << 12) | (rd << 7) | opcodes::OP_LOAD_FP
}

fn sw(base: u32, src: u32, offs: u32) -> u32 {
    ((offs & 0x0FE0) << 20)
        | (src << 20)
        | (base << 15)
        | (0b010 << 12)
        | ((offs & 0x1F) << 7)
        | opcodes::OP_STORE
}

fn fsw(base: u32, src: u32, offs: u32) -> u32 {
    ((offs & 0x0FE0) << 20)
        | (src << 20)
        | (base << 15)
        | (0b010 << 12)
        | ((offs & 0x1F) << 7)
        | opcodes::OP_STORE_FP
}

fn op(rd: u32, rs1: u32, rs2: u32, funct3: u32, alt: bool) -> u32 {
    let base = (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcodes::OP_OP;
    if alt { base | ALT_FUNCT_BIT } else { base }
}

fn jal(rd: u32, offs: u32) -> u32 {
    ((offs & 0x0010_0000) << 11)
        | ((offs & 0x7FE) << 20)
        | ((offs & 0x800) << 9)
        | (offs & 0x000F_F000)
        | (rd << 7)
        | opcodes::OP_JAL
}

fn jalr(rd: u32, rs1: u32, offs: u32) -> u32 {
    (offs << 20) | (rs1 << 15) | (rd << 7) | opcodes::OP_JALR
}

fn branch(rs1: u32, rs2: u32, funct3: u32, offs: u32) -> u32 {
    ((offs & 0x1000) << 19)
        | ((offs & 0x07E0) << 20)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | ((offs & 0x1E) << 7)
        | ((offs & 0x800) >> 4)
        | opcodes::OP_BRANCH
}

fn ebreak() -> u32 {
    0x0010_0073
}

/// Sign-extends the low `bits` bits of `val` to 32 bits.
#[inline]
fn sext(val: u32, bits: u32) -> u32 {
    let shift = 32 - bits;
    (((val << shift) as i32) >> shift) as u32
}

/// CIW/CL/CS scaled-by-4 load/store offset: imm[6|2|5:3].
fn cl_offset(inst: u32) -> u32 {
    (((inst >> 5) & 0x1) << 6) | (((inst >> 6) & 0x1) << 2) | (((inst >> 10) & 0x7) << 3)
}

/// CJ-format jump offset: imm[11|4|9:8|10|6|7|3:1|5].
fn cj_offset(inst: u32) -> u32 {
    sext(
        (((inst >> 12) & 0x1) << 11)
            | (((inst >> 2) & 0x1) << 5)
            | (((inst >> 3) & 0x7) << 1)
            | (((inst >> 6) & 0x1) << 7)
            | (((inst >> 7) & 0x1) << 6)
            | (((inst >> 8) & 0x1) << 10)
            | (((inst >> 9) & 0x3) << 8)
            | (((inst >> 11) & 0x1) << 4),
        12,
    )
}

/// CB-format branch offset: imm[8|4:3|7:6|2:1|5].
fn cb_offset(inst: u32) -> u32 {
    sext(
        (((inst >> 12) & 0x1) << 8)
            | (((inst >> 2) & 0x1) << 5)
            | (((inst >> 3) & 0x3) << 1)
            | (((inst >> 5) & 0x3) << 6)
            | (((inst >> 10) & 0x3) << 3),
        9,
    )
}

/// CI-format 6-bit immediate: imm[5] in bit 12, imm[4:0] in bits 6:2.
fn ci_imm(inst: u32) -> u32 {
    sext((((inst >> 12) & 0x1) << 5) | ((inst >> 2) & 0x1F), 6)
}

/// Expands a 16-bit compressed instruction to its 32-bit equivalent.
///
/// The input carries the compressed parcel in its low 16 bits; encodings with
/// low bits `0b11` are already uncompressed and pass through unchanged.
pub fn expand(inst: u32) -> u32 {
    match inst & 0x3 {
        0x0 => {
            // Quadrant 0: 3-bit register fields select x8..x15.
            let rs1 = ((inst >> 7) & 0x7) | 0x8;
            let rs2 = ((inst >> 2) & 0x7) | 0x8;
            let rd = rs2;
            match (inst >> 13) & 0x7 {
                0b000 => {
                    // C.ADDI4SPN
                    let imm = (((inst >> 5) & 0x1) << 3)
                        | (((inst >> 6) & 0x1) << 2)
                        | (((inst >> 7) & 0xF) << 6)
                        | (((inst >> 11) & 0x3) << 4);
                    if imm == 0 {
                        return ILLEGAL;
                    }
                    addi(rd, REG_SP, imm)
                }
                0b010 => lw(rd, rs1, cl_offset(inst)),
                0b011 => flw(rd, rs1, cl_offset(inst)),
                0b110 => sw(rs1, rs2, cl_offset(inst)),
                0b111 => fsw(rs1, rs2, cl_offset(inst)),
                _ => ILLEGAL,
            }
        }
        0x1 => {
            // Quadrant 1
            match (inst >> 13) & 0x7 {
                0b000 => {
                    // C.ADDI (C.NOP when rd = 0)
                    let rd = (inst >> 7) & 0x1F;
                    addi(rd, rd, ci_imm(inst))
                }
                0b001 => jal(REG_RA, cj_offset(inst)),
                0b010 => {
                    // C.LI
                    let rd = (inst >> 7) & 0x1F;
                    addi(rd, REG_ZERO, ci_imm(inst))
                }
                0b011 => {
                    let rd = (inst >> 7) & 0x1F;
                    if rd == REG_SP {
                        // C.ADDI16SP
                        let imm = sext(
                            (((inst >> 12) & 0x1) << 9)
                                | (((inst >> 2) & 0x1) << 5)
                                | (((inst >> 3) & 0x3) << 7)
                                | (((inst >> 5) & 0x1) << 6)
                                | (((inst >> 6) & 0x1) << 4),
                            10,
                        );
                        if imm == 0 {
                            return ILLEGAL;
                        }
                        addi(REG_SP, REG_SP, imm)
                    } else {
                        // C.LUI
                        let imm = sext(
                            (((inst >> 12) & 0x1) << 17) | (((inst >> 2) & 0x1F) << 12),
                            18,
                        );
                        if imm == 0 {
                            return ILLEGAL;
                        }
                        lui(rd, imm)
                    }
                }
                0b100 => {
                    let rd = ((inst >> 7) & 0x7) | 0x8;
                    match (inst >> 10) & 0x3 {
                        0b00 => {
                            let shamt = (((inst >> 12) & 0x1) << 5) | ((inst >> 2) & 0x1F);
                            srli(rd, rd, shamt)
                        }
                        0b01 => {
                            let shamt = (((inst >> 12) & 0x1) << 5) | ((inst >> 2) & 0x1F);
                            srai(rd, rd, shamt)
                        }
                        0b10 => andi(rd, rd, ci_imm(inst)),
                        _ => {
                            let rs2 = ((inst >> 2) & 0x7) | 0x8;
                            match (inst >> 5) & 0x3 {
                                0b00 => op(rd, rd, rs2, 0b000, true), // C.SUB
                                0b01 => op(rd, rd, rs2, 0b100, false), // C.XOR
                                0b10 => op(rd, rd, rs2, 0b110, false), // C.OR
                                _ => op(rd, rd, rs2, 0b111, false),   // C.AND
                            }
                        }
                    }
                }
                0b101 => jal(REG_ZERO, cj_offset(inst)),
                0b110 => branch(((inst >> 7) & 0x7) | 0x8, REG_ZERO, 0b000, cb_offset(inst)),
                _ => branch(((inst >> 7) & 0x7) | 0x8, REG_ZERO, 0b001, cb_offset(inst)),
            }
        }
        0x2 => {
            // Quadrant 2
            match (inst >> 13) & 0x7 {
                0b000 => {
                    // C.SLLI
                    let rd = (inst >> 7) & 0x1F;
                    let shamt = (((inst >> 12) & 0x1) << 5) | ((inst >> 2) & 0x1F);
                    slli(rd, rd, shamt)
                }
                0b010 => {
                    // C.LWSP
                    let rd = (inst >> 7) & 0x1F;
                    let offs = (((inst >> 2) & 0x3) << 6)
                        | (((inst >> 4) & 0x7) << 2)
                        | (((inst >> 12) & 0x1) << 5);
                    lw(rd, REG_SP, offs)
                }
                0b011 => {
                    // C.FLWSP
                    let rd = (inst >> 7) & 0x1F;
                    let offs = (((inst >> 2) & 0x3) << 6)
                        | (((inst >> 4) & 0x7) << 2)
                        | (((inst >> 12) & 0x1) << 5);
                    flw(rd, REG_SP, offs)
                }
                0b100 => {
                    let rs1 = (inst >> 7) & 0x1F;
                    let rs2 = (inst >> 2) & 0x1F;
                    if inst & 0x1000 == 0 {
                        if rs2 != 0 {
                            addi(rs1, rs2, 0) // C.MV
                        } else if rs1 != 0 {
                            jalr(REG_ZERO, rs1, 0) // C.JR
                        } else {
                            ILLEGAL
                        }
                    } else if rs1 == 0 && rs2 == 0 {
                        ebreak()
                    } else if rs2 == 0 {
                        jalr(REG_RA, rs1, 0) // C.JALR
                    } else if rs1 != 0 {
                        op(rs1, rs1, rs2, 0b000, false) // C.ADD
                    } else {
                        // rs1 = 0, rs2 != 0 is a HINT
                        ILLEGAL
                    }
                }
                0b110 => {
                    // C.SWSP
                    let rs2 = (inst >> 2) & 0x1F;
                    let offs = (((inst >> 7) & 0x3) << 6) | (((inst >> 9) & 0xF) << 2);
                    sw(REG_SP, rs2, offs)
                }
                0b111 => {
                    // C.FSWSP
                    let rs2 = (inst >> 2) & 0x1F;
                    let offs = (((inst >> 7) & 0x3) << 6) | (((inst >> 9) & 0xF) << 2);
                    fsw(REG_SP, rs2, offs)
                }
                _ => ILLEGAL,
            }
        }
        // Low bits 0b11: already a 32-bit encoding.
        _ => inst,
    }
}
