// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::decoder::riscv::{decode_rv32, Instruction};
use crate::{Bus, Cpu, SimResult, SimulationError, SimulationObserver};
use std::sync::Arc;

const CSR_MSTATUS: u16 = 0x300;
const CSR_MISA: u16 = 0x301;
const CSR_MIE: u16 = 0x304;
const CSR_MTVEC: u16 = 0x305;
const CSR_MSCRATCH: u16 = 0x340;
const CSR_MEPC: u16 = 0x341;
const CSR_MCAUSE: u16 = 0x342;
const CSR_MTVAL: u16 = 0x343;
const CSR_MIP: u16 = 0x344;
const CSR_MCYCLE: u16 = 0xB00;
const CSR_MINSTRET: u16 = 0xB02;
const CSR_MCYCLEH: u16 = 0xB80;
const CSR_MINSTRETH: u16 = 0xB82;
const CSR_CYCLE: u16 = 0xC00;
const CSR_INSTRET: u16 = 0xC02;
const CSR_CYCLEH: u16 = 0xC80;
const CSR_INSTRETH: u16 = 0xC82;
const CSR_MHARTID: u16 = 0xF14;

/// RV32IM, machine mode only.
const MISA_RV32IM: u32 = (1 << 30) | (1 << 8) | (1 << 12);

/// Single-hart RV32IM core. Interrupts are never taken; `ebreak` and
/// `ecall` stop the simulation.
#[derive(Debug, Default)]
pub struct RiscV {
    pub x: [u32; 32],
    pub pc: u32,

    pub mstatus: u32,
    pub mie: u32,
    pub mip: u32,
    pub mtvec: u32,
    pub mscratch: u32,
    pub mepc: u32,
    pub mcause: u32,
    pub mtval: u32,

    /// Retired instructions; doubles as the cycle counter.
    pub instret: u64,
}

impl RiscV {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_reg(&self, n: u8) -> u32 {
        if n == 0 {
            0
        } else {
            self.x[n as usize]
        }
    }

    fn write_reg(&mut self, n: u8, val: u32) {
        if n != 0 {
            self.x[n as usize] = val;
        }
    }

    fn read_csr(&self, csr: u16) -> u32 {
        match csr {
            CSR_MSTATUS => self.mstatus,
            CSR_MISA => MISA_RV32IM,
            CSR_MIE => self.mie,
            CSR_MIP => self.mip,
            CSR_MTVEC => self.mtvec,
            CSR_MSCRATCH => self.mscratch,
            CSR_MEPC => self.mepc,
            CSR_MCAUSE => self.mcause,
            CSR_MTVAL => self.mtval,
            CSR_MCYCLE | CSR_MINSTRET | CSR_CYCLE | CSR_INSTRET => self.instret as u32,
            CSR_MCYCLEH | CSR_MINSTRETH | CSR_CYCLEH | CSR_INSTRETH => (self.instret >> 32) as u32,
            CSR_MHARTID => 0,
            _ => {
                tracing::trace!("Read of unimplemented CSR {:#x}", csr);
                0
            }
        }
    }

    fn write_csr(&mut self, csr: u16, val: u32) {
        match csr {
            // MIE, MPIE and MPP only
            CSR_MSTATUS => self.mstatus = val & 0x0000_1888,
            CSR_MIE => self.mie = val,
            CSR_MIP => self.mip = val,
            CSR_MTVEC => self.mtvec = val,
            CSR_MSCRATCH => self.mscratch = val,
            CSR_MEPC => self.mepc = val & !1,
            CSR_MCAUSE => self.mcause = val,
            CSR_MTVAL => self.mtval = val,
            _ => tracing::trace!("Write of unimplemented CSR {:#x} ignored", csr),
        }
    }

    /// Shared read-modify-write for the six CSR instructions. `write` is
    /// `None` when the instruction must not write (set/clear with zero).
    fn csr_op(&mut self, rd: u8, csr: u16, write: Option<u32>) {
        let old = self.read_csr(csr);
        if let Some(val) = write {
            self.write_csr(csr, val);
        }
        self.write_reg(rd, old);
    }

    fn load_addr(&self, rs1: u8, imm: i32) -> u64 {
        self.read_reg(rs1).wrapping_add(imm as u32) as u64
    }
}

fn mulh(a: u32, b: u32) -> u32 {
    ((a as i32 as i64 * b as i32 as i64) >> 32) as u32
}

fn mulhsu(a: u32, b: u32) -> u32 {
    ((a as i32 as i64).wrapping_mul(b as u64 as i64) >> 32) as u32
}

fn mulhu(a: u32, b: u32) -> u32 {
    ((a as u64 * b as u64) >> 32) as u32
}

fn div(a: u32, b: u32) -> u32 {
    let (a, b) = (a as i32, b as i32);
    if b == 0 {
        u32::MAX
    } else {
        a.wrapping_div(b) as u32
    }
}

fn divu(a: u32, b: u32) -> u32 {
    if b == 0 {
        u32::MAX
    } else {
        a / b
    }
}

fn rem(a: u32, b: u32) -> u32 {
    let (a, b) = (a as i32, b as i32);
    if b == 0 {
        a as u32
    } else {
        a.wrapping_rem(b) as u32
    }
}

fn remu(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        a % b
    }
}

impl Cpu for RiscV {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn step(
        &mut self,
        bus: &mut dyn Bus,
        observers: &[Arc<dyn SimulationObserver>],
    ) -> SimResult<()> {
        if self.pc & 3 != 0 {
            return Err(SimulationError::MemoryViolation(self.pc as u64));
        }
        let opcode = bus.read_u32(self.pc as u64)?;

        for observer in observers {
            observer.on_step_start(self.pc, opcode);
        }

        let instruction = decode_rv32(opcode);
        tracing::trace!(
            "PC={:#x}, Op={:#010x}, Instr={:?}",
            self.pc,
            opcode,
            instruction
        );

        let pc = self.pc;
        let mut next_pc = pc.wrapping_add(4);
        let branch = |taken: bool, imm: i32| {
            if taken {
                Some(pc.wrapping_add(imm as u32))
            } else {
                None
            }
        };

        match instruction {
            Instruction::Lui { rd, imm } => self.write_reg(rd, imm),
            Instruction::Auipc { rd, imm } => self.write_reg(rd, pc.wrapping_add(imm)),
            Instruction::Jal { rd, imm } => {
                self.write_reg(rd, next_pc);
                next_pc = pc.wrapping_add(imm as u32);
            }
            Instruction::Jalr { rd, rs1, imm } => {
                let target = self.read_reg(rs1).wrapping_add(imm as u32) & !1;
                self.write_reg(rd, next_pc);
                next_pc = target;
            }
            Instruction::Beq { rs1, rs2, imm } => {
                if let Some(t) = branch(self.read_reg(rs1) == self.read_reg(rs2), imm) {
                    next_pc = t;
                }
            }
            Instruction::Bne { rs1, rs2, imm } => {
                if let Some(t) = branch(self.read_reg(rs1) != self.read_reg(rs2), imm) {
                    next_pc = t;
                }
            }
            Instruction::Blt { rs1, rs2, imm } => {
                let taken = (self.read_reg(rs1) as i32) < (self.read_reg(rs2) as i32);
                if let Some(t) = branch(taken, imm) {
                    next_pc = t;
                }
            }
            Instruction::Bge { rs1, rs2, imm } => {
                let taken = (self.read_reg(rs1) as i32) >= (self.read_reg(rs2) as i32);
                if let Some(t) = branch(taken, imm) {
                    next_pc = t;
                }
            }
            Instruction::Bltu { rs1, rs2, imm } => {
                if let Some(t) = branch(self.read_reg(rs1) < self.read_reg(rs2), imm) {
                    next_pc = t;
                }
            }
            Instruction::Bgeu { rs1, rs2, imm } => {
                if let Some(t) = branch(self.read_reg(rs1) >= self.read_reg(rs2), imm) {
                    next_pc = t;
                }
            }
            Instruction::Lb { rd, rs1, imm } => {
                let val = bus.read_u8(self.load_addr(rs1, imm))? as i8;
                self.write_reg(rd, val as i32 as u32);
            }
            Instruction::Lh { rd, rs1, imm } => {
                let val = bus.read_u16(self.load_addr(rs1, imm))? as i16;
                self.write_reg(rd, val as i32 as u32);
            }
            Instruction::Lw { rd, rs1, imm } => {
                let val = bus.read_u32(self.load_addr(rs1, imm))?;
                self.write_reg(rd, val);
            }
            Instruction::Lbu { rd, rs1, imm } => {
                let val = bus.read_u8(self.load_addr(rs1, imm))?;
                self.write_reg(rd, val as u32);
            }
            Instruction::Lhu { rd, rs1, imm } => {
                let val = bus.read_u16(self.load_addr(rs1, imm))?;
                self.write_reg(rd, val as u32);
            }
            Instruction::Sb { rs1, rs2, imm } => {
                bus.write_u8(self.load_addr(rs1, imm), self.read_reg(rs2) as u8)?;
            }
            Instruction::Sh { rs1, rs2, imm } => {
                bus.write_u16(self.load_addr(rs1, imm), self.read_reg(rs2) as u16)?;
            }
            Instruction::Sw { rs1, rs2, imm } => {
                bus.write_u32(self.load_addr(rs1, imm), self.read_reg(rs2))?;
            }
            Instruction::Addi { rd, rs1, imm } => {
                self.write_reg(rd, self.read_reg(rs1).wrapping_add(imm as u32))
            }
            Instruction::Slti { rd, rs1, imm } => {
                self.write_reg(rd, ((self.read_reg(rs1) as i32) < imm) as u32)
            }
            Instruction::Sltiu { rd, rs1, imm } => {
                self.write_reg(rd, (self.read_reg(rs1) < imm as u32) as u32)
            }
            Instruction::Xori { rd, rs1, imm } => self.write_reg(rd, self.read_reg(rs1) ^ imm as u32),
            Instruction::Ori { rd, rs1, imm } => self.write_reg(rd, self.read_reg(rs1) | imm as u32),
            Instruction::Andi { rd, rs1, imm } => self.write_reg(rd, self.read_reg(rs1) & imm as u32),
            Instruction::Slli { rd, rs1, shamt } => self.write_reg(rd, self.read_reg(rs1) << shamt),
            Instruction::Srli { rd, rs1, shamt } => self.write_reg(rd, self.read_reg(rs1) >> shamt),
            Instruction::Srai { rd, rs1, shamt } => {
                self.write_reg(rd, ((self.read_reg(rs1) as i32) >> shamt) as u32)
            }
            Instruction::Add { rd, rs1, rs2 } => {
                self.write_reg(rd, self.read_reg(rs1).wrapping_add(self.read_reg(rs2)))
            }
            Instruction::Sub { rd, rs1, rs2 } => {
                self.write_reg(rd, self.read_reg(rs1).wrapping_sub(self.read_reg(rs2)))
            }
            Instruction::Sll { rd, rs1, rs2 } => {
                self.write_reg(rd, self.read_reg(rs1) << (self.read_reg(rs2) & 0x1F))
            }
            Instruction::Slt { rd, rs1, rs2 } => {
                let lt = (self.read_reg(rs1) as i32) < (self.read_reg(rs2) as i32);
                self.write_reg(rd, lt as u32)
            }
            Instruction::Sltu { rd, rs1, rs2 } => {
                self.write_reg(rd, (self.read_reg(rs1) < self.read_reg(rs2)) as u32)
            }
            Instruction::Xor { rd, rs1, rs2 } => {
                self.write_reg(rd, self.read_reg(rs1) ^ self.read_reg(rs2))
            }
            Instruction::Srl { rd, rs1, rs2 } => {
                self.write_reg(rd, self.read_reg(rs1) >> (self.read_reg(rs2) & 0x1F))
            }
            Instruction::Sra { rd, rs1, rs2 } => {
                let res = (self.read_reg(rs1) as i32) >> (self.read_reg(rs2) & 0x1F);
                self.write_reg(rd, res as u32)
            }
            Instruction::Or { rd, rs1, rs2 } => {
                self.write_reg(rd, self.read_reg(rs1) | self.read_reg(rs2))
            }
            Instruction::And { rd, rs1, rs2 } => {
                self.write_reg(rd, self.read_reg(rs1) & self.read_reg(rs2))
            }
            Instruction::Mul { rd, rs1, rs2 } => {
                self.write_reg(rd, self.read_reg(rs1).wrapping_mul(self.read_reg(rs2)))
            }
            Instruction::Mulh { rd, rs1, rs2 } => {
                self.write_reg(rd, mulh(self.read_reg(rs1), self.read_reg(rs2)))
            }
            Instruction::Mulhsu { rd, rs1, rs2 } => {
                self.write_reg(rd, mulhsu(self.read_reg(rs1), self.read_reg(rs2)))
            }
            Instruction::Mulhu { rd, rs1, rs2 } => {
                self.write_reg(rd, mulhu(self.read_reg(rs1), self.read_reg(rs2)))
            }
            Instruction::Div { rd, rs1, rs2 } => {
                self.write_reg(rd, div(self.read_reg(rs1), self.read_reg(rs2)))
            }
            Instruction::Divu { rd, rs1, rs2 } => {
                self.write_reg(rd, divu(self.read_reg(rs1), self.read_reg(rs2)))
            }
            Instruction::Rem { rd, rs1, rs2 } => {
                self.write_reg(rd, rem(self.read_reg(rs1), self.read_reg(rs2)))
            }
            Instruction::Remu { rd, rs1, rs2 } => {
                self.write_reg(rd, remu(self.read_reg(rs1), self.read_reg(rs2)))
            }
            // Single hart, in-order: nothing to order or wait for.
            Instruction::Fence | Instruction::Wfi => {}
            Instruction::Ecall | Instruction::Ebreak => {
                tracing::info!("{:?} at {:#x}, halting", instruction, pc);
                return Err(SimulationError::Halted(pc as u64));
            }
            Instruction::Mret => {
                // MIE = MPIE, MPIE = 1
                let mpie = (self.mstatus >> 7) & 1;
                self.mstatus = (self.mstatus & !(1 << 3)) | (mpie << 3) | (1 << 7);
                next_pc = self.mepc;
            }
            Instruction::Csrrw { rd, rs1, csr } => {
                let val = self.read_reg(rs1);
                self.csr_op(rd, csr, Some(val));
            }
            Instruction::Csrrs { rd, rs1, csr } => {
                let mask = self.read_reg(rs1);
                let write = (rs1 != 0).then(|| self.read_csr(csr) | mask);
                self.csr_op(rd, csr, write);
            }
            Instruction::Csrrc { rd, rs1, csr } => {
                let mask = self.read_reg(rs1);
                let write = (rs1 != 0).then(|| self.read_csr(csr) & !mask);
                self.csr_op(rd, csr, write);
            }
            Instruction::Csrrwi { rd, imm, csr } => self.csr_op(rd, csr, Some(imm as u32)),
            Instruction::Csrrsi { rd, imm, csr } => {
                let write = (imm != 0).then(|| self.read_csr(csr) | imm as u32);
                self.csr_op(rd, csr, write);
            }
            Instruction::Csrrci { rd, imm, csr } => {
                let write = (imm != 0).then(|| self.read_csr(csr) & !(imm as u32));
                self.csr_op(rd, csr, write);
            }
            Instruction::Unknown(inst) => {
                tracing::error!("Unknown instruction {:#010x} at {:#x}", inst, pc);
                return Err(SimulationError::DecodeError(pc as u64));
            }
        }

        self.pc = next_pc;
        self.instret += 1;
        Ok(())
    }

    fn set_pc(&mut self, val: u32) {
        self.pc = val;
    }

    fn get_pc(&self) -> u32 {
        self.pc
    }

    fn set_sp(&mut self, val: u32) {
        self.write_reg(2, val);
    }

    fn get_register(&self, id: u8) -> u32 {
        if id < 32 {
            self.read_reg(id)
        } else {
            0
        }
    }

    fn set_register(&mut self, id: u8, val: u32) {
        if id < 32 {
            self.write_reg(id, val);
        }
    }
}
