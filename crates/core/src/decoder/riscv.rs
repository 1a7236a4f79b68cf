// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// RV32I base set plus the M extension and the machine-mode SYSTEM group.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction {
    Lui { rd: u8, imm: u32 },
    Auipc { rd: u8, imm: u32 },
    Jal { rd: u8, imm: i32 },
    Jalr { rd: u8, rs1: u8, imm: i32 },
    Beq { rs1: u8, rs2: u8, imm: i32 },
    Bne { rs1: u8, rs2: u8, imm: i32 },
    Blt { rs1: u8, rs2: u8, imm: i32 },
    Bge { rs1: u8, rs2: u8, imm: i32 },
    Bltu { rs1: u8, rs2: u8, imm: i32 },
    Bgeu { rs1: u8, rs2: u8, imm: i32 },
    Lb { rd: u8, rs1: u8, imm: i32 },
    Lh { rd: u8, rs1: u8, imm: i32 },
    Lw { rd: u8, rs1: u8, imm: i32 },
    Lbu { rd: u8, rs1: u8, imm: i32 },
    Lhu { rd: u8, rs1: u8, imm: i32 },
    Sb { rs1: u8, rs2: u8, imm: i32 },
    Sh { rs1: u8, rs2: u8, imm: i32 },
    Sw { rs1: u8, rs2: u8, imm: i32 },
    Addi { rd: u8, rs1: u8, imm: i32 },
    Slti { rd: u8, rs1: u8, imm: i32 },
    Sltiu { rd: u8, rs1: u8, imm: i32 },
    Xori { rd: u8, rs1: u8, imm: i32 },
    Ori { rd: u8, rs1: u8, imm: i32 },
    Andi { rd: u8, rs1: u8, imm: i32 },
    Slli { rd: u8, rs1: u8, shamt: u8 },
    Srli { rd: u8, rs1: u8, shamt: u8 },
    Srai { rd: u8, rs1: u8, shamt: u8 },
    Add { rd: u8, rs1: u8, rs2: u8 },
    Sub { rd: u8, rs1: u8, rs2: u8 },
    Sll { rd: u8, rs1: u8, rs2: u8 },
    Slt { rd: u8, rs1: u8, rs2: u8 },
    Sltu { rd: u8, rs1: u8, rs2: u8 },
    Xor { rd: u8, rs1: u8, rs2: u8 },
    Srl { rd: u8, rs1: u8, rs2: u8 },
    Sra { rd: u8, rs1: u8, rs2: u8 },
    Or { rd: u8, rs1: u8, rs2: u8 },
    And { rd: u8, rs1: u8, rs2: u8 },
    Mul { rd: u8, rs1: u8, rs2: u8 },
    Mulh { rd: u8, rs1: u8, rs2: u8 },
    Mulhsu { rd: u8, rs1: u8, rs2: u8 },
    Mulhu { rd: u8, rs1: u8, rs2: u8 },
    Div { rd: u8, rs1: u8, rs2: u8 },
    Divu { rd: u8, rs1: u8, rs2: u8 },
    Rem { rd: u8, rs1: u8, rs2: u8 },
    Remu { rd: u8, rs1: u8, rs2: u8 },
    Fence,
    Ecall,
    Ebreak,
    Mret,
    Wfi,
    Csrrw { rd: u8, rs1: u8, csr: u16 },
    Csrrs { rd: u8, rs1: u8, csr: u16 },
    Csrrc { rd: u8, rs1: u8, csr: u16 },
    Csrrwi { rd: u8, imm: u8, csr: u16 },
    Csrrsi { rd: u8, imm: u8, csr: u16 },
    Csrrci { rd: u8, imm: u8, csr: u16 },
    Unknown(u32),
}

fn imm_i(inst: u32) -> i32 {
    (inst as i32) >> 20
}

fn imm_s(inst: u32) -> i32 {
    ((inst as i32) >> 25 << 5) | ((inst >> 7) & 0x1F) as i32
}

fn imm_b(inst: u32) -> i32 {
    let sign = (inst as i32) >> 31 << 12;
    let bit11 = ((inst >> 7) & 1) << 11;
    let bits10_5 = ((inst >> 25) & 0x3F) << 5;
    let bits4_1 = ((inst >> 8) & 0xF) << 1;
    sign | (bit11 | bits10_5 | bits4_1) as i32
}

fn imm_j(inst: u32) -> i32 {
    let sign = (inst as i32) >> 31 << 20;
    let bits19_12 = inst & 0x000F_F000;
    let bit11 = ((inst >> 20) & 1) << 11;
    let bits10_1 = ((inst >> 21) & 0x3FF) << 1;
    sign | (bits19_12 | bit11 | bits10_1) as i32
}

pub fn decode_rv32(inst: u32) -> Instruction {
    let opcode = inst & 0x7F;
    let rd = ((inst >> 7) & 0x1F) as u8;
    let funct3 = ((inst >> 12) & 0x7) as u8;
    let rs1 = ((inst >> 15) & 0x1F) as u8;
    let rs2 = ((inst >> 20) & 0x1F) as u8;
    let funct7 = ((inst >> 25) & 0x7F) as u8;

    match opcode {
        0x37 => Instruction::Lui {
            rd,
            imm: inst & 0xFFFF_F000,
        },
        0x17 => Instruction::Auipc {
            rd,
            imm: inst & 0xFFFF_F000,
        },
        0x6F => Instruction::Jal {
            rd,
            imm: imm_j(inst),
        },
        0x67 if funct3 == 0 => Instruction::Jalr {
            rd,
            rs1,
            imm: imm_i(inst),
        },
        0x63 => {
            let imm = imm_b(inst);
            match funct3 {
                0 => Instruction::Beq { rs1, rs2, imm },
                1 => Instruction::Bne { rs1, rs2, imm },
                4 => Instruction::Blt { rs1, rs2, imm },
                5 => Instruction::Bge { rs1, rs2, imm },
                6 => Instruction::Bltu { rs1, rs2, imm },
                7 => Instruction::Bgeu { rs1, rs2, imm },
                _ => Instruction::Unknown(inst),
            }
        }
        0x03 => {
            let imm = imm_i(inst);
            match funct3 {
                0 => Instruction::Lb { rd, rs1, imm },
                1 => Instruction::Lh { rd, rs1, imm },
                2 => Instruction::Lw { rd, rs1, imm },
                4 => Instruction::Lbu { rd, rs1, imm },
                5 => Instruction::Lhu { rd, rs1, imm },
                _ => Instruction::Unknown(inst),
            }
        }
        0x23 => {
            let imm = imm_s(inst);
            match funct3 {
                0 => Instruction::Sb { rs1, rs2, imm },
                1 => Instruction::Sh { rs1, rs2, imm },
                2 => Instruction::Sw { rs1, rs2, imm },
                _ => Instruction::Unknown(inst),
            }
        }
        0x13 => {
            let imm = imm_i(inst);
            let shamt = rs2;
            match (funct3, funct7) {
                (0, _) => Instruction::Addi { rd, rs1, imm },
                (2, _) => Instruction::Slti { rd, rs1, imm },
                // Immediate is sign-extended, then compared unsigned.
                (3, _) => Instruction::Sltiu { rd, rs1, imm },
                (4, _) => Instruction::Xori { rd, rs1, imm },
                (6, _) => Instruction::Ori { rd, rs1, imm },
                (7, _) => Instruction::Andi { rd, rs1, imm },
                (1, 0x00) => Instruction::Slli { rd, rs1, shamt },
                (5, 0x00) => Instruction::Srli { rd, rs1, shamt },
                (5, 0x20) => Instruction::Srai { rd, rs1, shamt },
                _ => Instruction::Unknown(inst),
            }
        }
        0x33 => match (funct7, funct3) {
            (0x00, 0) => Instruction::Add { rd, rs1, rs2 },
            (0x20, 0) => Instruction::Sub { rd, rs1, rs2 },
            (0x00, 1) => Instruction::Sll { rd, rs1, rs2 },
            (0x00, 2) => Instruction::Slt { rd, rs1, rs2 },
            (0x00, 3) => Instruction::Sltu { rd, rs1, rs2 },
            (0x00, 4) => Instruction::Xor { rd, rs1, rs2 },
            (0x00, 5) => Instruction::Srl { rd, rs1, rs2 },
            (0x20, 5) => Instruction::Sra { rd, rs1, rs2 },
            (0x00, 6) => Instruction::Or { rd, rs1, rs2 },
            (0x00, 7) => Instruction::And { rd, rs1, rs2 },
            (0x01, 0) => Instruction::Mul { rd, rs1, rs2 },
            (0x01, 1) => Instruction::Mulh { rd, rs1, rs2 },
            (0x01, 2) => Instruction::Mulhsu { rd, rs1, rs2 },
            (0x01, 3) => Instruction::Mulhu { rd, rs1, rs2 },
            (0x01, 4) => Instruction::Div { rd, rs1, rs2 },
            (0x01, 5) => Instruction::Divu { rd, rs1, rs2 },
            (0x01, 6) => Instruction::Rem { rd, rs1, rs2 },
            (0x01, 7) => Instruction::Remu { rd, rs1, rs2 },
            _ => Instruction::Unknown(inst),
        },
        // FENCE and FENCE.I
        0x0F if funct3 <= 1 => Instruction::Fence,
        0x73 => {
            let csr = (inst >> 20) as u16;
            match funct3 {
                0 if rd == 0 && rs1 == 0 => match inst >> 20 {
                    0x000 => Instruction::Ecall,
                    0x001 => Instruction::Ebreak,
                    0x302 => Instruction::Mret,
                    0x105 => Instruction::Wfi,
                    _ => Instruction::Unknown(inst),
                },
                1 => Instruction::Csrrw { rd, rs1, csr },
                2 => Instruction::Csrrs { rd, rs1, csr },
                3 => Instruction::Csrrc { rd, rs1, csr },
                5 => Instruction::Csrrwi { rd, imm: rs1, csr },
                6 => Instruction::Csrrsi { rd, imm: rs1, csr },
                7 => Instruction::Csrrci { rd, imm: rs1, csr },
                _ => Instruction::Unknown(inst),
            }
        }
        _ => Instruction::Unknown(inst),
    }
}
