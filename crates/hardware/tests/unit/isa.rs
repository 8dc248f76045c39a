//! Decode and compressed-expansion properties.
//!
//! The expansion property under test: for every covered compressed
//! encoding, expanding the 16-bit form yields exactly the canonical 32-bit
//! encoding a direct assembler would produce; expansion is a right inverse
//! of compression.

use proptest::prelude::*;

use wrensim_core::isa::decode::{imm_b, imm_i, imm_j, imm_s};
use wrensim_core::isa::rvc;

use crate::common::asm;

// ══════════════════════════════════════════════════════════
// Compressed encoders (test-side "compressor")
// ══════════════════════════════════════════════════════════

fn c_addi(rd: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    (0b000 << 13) | (((imm >> 5) & 1) << 12) | (rd << 7) | ((imm & 0x1F) << 2) | 0b01
}

fn c_li(rd: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    (0b010 << 13) | (((imm >> 5) & 1) << 12) | (rd << 7) | ((imm & 0x1F) << 2) | 0b01
}

fn c_lui(rd: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    (0b011 << 13) | (((imm >> 17) & 1) << 12) | (rd << 7) | (((imm >> 12) & 0x1F) << 2) | 0b01
}

fn c_addi4spn(rd3: u32, imm: u32) -> u32 {
    (((imm >> 4) & 0x3) << 11)
        | (((imm >> 6) & 0xF) << 7)
        | (((imm >> 2) & 0x1) << 6)
        | (((imm >> 3) & 0x1) << 5)
        | (rd3 << 2)
        | 0b00
}

fn c_lw(rd3: u32, rs1_3: u32, offs: u32) -> u32 {
    (0b010 << 13)
        | (((offs >> 3) & 0x7) << 10)
        | (rs1_3 << 7)
        | (((offs >> 2) & 0x1) << 6)
        | (((offs >> 6) & 0x1) << 5)
        | (rd3 << 2)
        | 0b00
}

fn c_sw(rs2_3: u32, rs1_3: u32, offs: u32) -> u32 {
    (0b110 << 13)
        | (((offs >> 3) & 0x7) << 10)
        | (rs1_3 << 7)
        | (((offs >> 2) & 0x1) << 6)
        | (((offs >> 6) & 0x1) << 5)
        | (rs2_3 << 2)
        | 0b00
}

fn c_j(offs: i32) -> u32 {
    let o = offs as u32;
    (0b101 << 13)
        | (((o >> 11) & 1) << 12)
        | (((o >> 4) & 1) << 11)
        | (((o >> 8) & 3) << 9)
        | (((o >> 10) & 1) << 8)
        | (((o >> 6) & 1) << 7)
        | (((o >> 7) & 1) << 6)
        | (((o >> 1) & 7) << 3)
        | (((o >> 5) & 1) << 2)
        | 0b01
}

fn c_beqz(rs1_3: u32, offs: i32) -> u32 {
    let o = offs as u32;
    (0b110 << 13)
        | (((o >> 8) & 1) << 12)
        | (((o >> 3) & 3) << 10)
        | (rs1_3 << 7)
        | (((o >> 6) & 3) << 5)
        | (((o >> 1) & 3) << 3)
        | (((o >> 5) & 1) << 2)
        | 0b01
}

fn c_mv(rd: u32, rs2: u32) -> u32 {
    (0b100 << 13) | (rd << 7) | (rs2 << 2) | 0b10
}

fn c_add(rd: u32, rs2: u32) -> u32 {
    (0b100 << 13) | (1 << 12) | (rd << 7) | (rs2 << 2) | 0b10
}

fn c_slli(rd: u32, shamt: u32) -> u32 {
    (0b000 << 13) | (((shamt >> 5) & 1) << 12) | (rd << 7) | ((shamt & 0x1F) << 2) | 0b10
}

fn c_lwsp(rd: u32, offs: u32) -> u32 {
    (0b010 << 13)
        | (((offs >> 5) & 1) << 12)
        | (rd << 7)
        | (((offs >> 2) & 0x7) << 4)
        | (((offs >> 6) & 0x3) << 2)
        | 0b10
}

fn c_swsp(rs2: u32, offs: u32) -> u32 {
    (0b110 << 13) | (((offs >> 2) & 0xF) << 9) | (((offs >> 6) & 0x3) << 7) | (rs2 << 2) | 0b10
}

// ══════════════════════════════════════════════════════════
// Fixed expansions
// ══════════════════════════════════════════════════════════

#[test]
fn quadrant1_expansions() {
    assert_eq!(rvc::expand(c_addi(5, -3)), asm::addi(5, 5, -3));
    assert_eq!(rvc::expand(c_li(7, 21)), asm::addi(7, 0, 21));
    assert_eq!(rvc::expand(c_lui(9, 0x5000)), asm::lui(9, 0x5000));
    assert_eq!(rvc::expand(c_j(-16)), asm::jal(0, -16));
    assert_eq!(rvc::expand(c_beqz(0, 24)), asm::beq(8, 0, 24));
}

#[test]
fn quadrant0_expansions() {
    // rd/rs 3-bit fields select x8..x15.
    assert_eq!(rvc::expand(c_addi4spn(2, 16)), asm::addi(10, 2, 16));
    assert_eq!(rvc::expand(c_lw(1, 0, 8)), asm::lw(9, 8, 8));
    assert_eq!(rvc::expand(c_sw(3, 2, 64)), asm::sw(11, 10, 64));
}

#[test]
fn quadrant2_expansions() {
    assert_eq!(rvc::expand(c_mv(4, 11)), asm::addi(4, 11, 0));
    assert_eq!(rvc::expand(c_add(4, 11)), asm::add(4, 4, 11));
    assert_eq!(rvc::expand(c_slli(6, 9)), asm::slli(6, 6, 9));
    assert_eq!(rvc::expand(c_lwsp(8, 12)), asm::lw(8, 2, 12));
    assert_eq!(rvc::expand(c_swsp(8, 12)), asm::sw(8, 2, 12));
    assert_eq!(rvc::expand(0x9002), asm::ebreak());
    // C.JR / C.JALR
    assert_eq!(rvc::expand((0b100 << 13) | (5 << 7) | 0b10), asm::jalr(0, 5, 0));
    assert_eq!(
        rvc::expand((0b100 << 13) | (1 << 12) | (5 << 7) | 0b10),
        asm::jalr(1, 5, 0)
    );
}

#[test]
fn reserved_encodings_expand_to_the_illegal_sentinel() {
    assert_eq!(rvc::expand(0x0000), 0, "all-zero is defined illegal");
    assert_eq!(rvc::expand(c_addi4spn(0, 0)), 0, "ADDI4SPN with zero imm");
    // Uncompressed parcels pass through.
    assert_eq!(rvc::expand(asm::ecall()), asm::ecall());
}

// ══════════════════════════════════════════════════════════
// Properties
// ══════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn immediate_decoders_are_inverse_of_encoders(
        imm12 in -2048i32..2048,
        reg in 1u32..32,
    ) {
        prop_assert_eq!(imm_i(asm::addi(1, reg, imm12)) as i32, imm12);
        prop_assert_eq!(imm_s(asm::sw(reg, 1, imm12)) as i32, imm12);
    }

    #[test]
    fn branch_and_jump_offsets_roundtrip(
        boffs in (-2048i32..2048).prop_map(|x| x * 2),
        joffs in (-262_144i32..262_144).prop_map(|x| x * 2),
    ) {
        prop_assert_eq!(imm_b(asm::beq(1, 2, boffs)) as i32, boffs);
        prop_assert_eq!(imm_j(asm::jal(1, joffs)) as i32, joffs);
    }

    #[test]
    fn c_addi_expansion_is_right_inverse(rd in 1u32..32, imm in -32i32..32) {
        prop_assert_eq!(rvc::expand(c_addi(rd, imm)), asm::addi(rd, rd, imm));
    }

    #[test]
    fn c_lw_sw_expansion_is_right_inverse(
        r1 in 0u32..8,
        r2 in 0u32..8,
        offs in (0u32..32).prop_map(|x| x * 4),
    ) {
        prop_assert_eq!(rvc::expand(c_lw(r1, r2, offs)), asm::lw(8 + r1, 8 + r2, offs as i32));
        prop_assert_eq!(rvc::expand(c_sw(r1, r2, offs)), asm::sw(8 + r1, 8 + r2, offs as i32));
    }

    #[test]
    fn c_j_expansion_is_right_inverse(offs in (-1024i32..1024).prop_map(|x| x * 2)) {
        prop_assert_eq!(rvc::expand(c_j(offs)), asm::jal(0, offs));
    }
}
