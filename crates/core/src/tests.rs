// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#[cfg(test)]
mod tests {
    use crate::bus::SystemBus;
    use crate::cpu::RiscV;
    use crate::memory::ProgramImage;
    use crate::metrics::PerformanceMetrics;
    use crate::transcript::heartbeat_cycles;
    use crate::{Cpu, Machine, SimulationError, StopReason};
    use std::sync::{Arc, Mutex};

    const EBREAK: u32 = 0x0010_0073;

    fn i_type(imm: i32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
        ((imm as u32 & 0xFFF) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
    }

    fn r_type(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32) -> u32 {
        (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | 0x33
    }

    fn s_type(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
        let imm = imm as u32;
        (((imm >> 5) & 0x7F) << 25)
            | (rs2 << 20)
            | (rs1 << 15)
            | (funct3 << 12)
            | ((imm & 0x1F) << 7)
            | 0x23
    }

    fn b_type(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
        let imm = imm as u32;
        (((imm >> 12) & 1) << 31)
            | (((imm >> 5) & 0x3F) << 25)
            | (rs2 << 20)
            | (rs1 << 15)
            | (funct3 << 12)
            | (((imm >> 1) & 0xF) << 8)
            | (((imm >> 11) & 1) << 7)
            | 0x63
    }

    fn lui(rd: u32, upper: u32) -> u32 {
        (upper & 0xFFFF_F000) | (rd << 7) | 0x37
    }

    fn jal(rd: u32, imm: i32) -> u32 {
        let imm = imm as u32;
        (((imm >> 20) & 1) << 31)
            | (((imm >> 1) & 0x3FF) << 21)
            | (((imm >> 11) & 1) << 20)
            | (((imm >> 12) & 0xFF) << 12)
            | (rd << 7)
            | 0x6F
    }

    fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
        i_type(imm, rs1, 0, rd, 0x13)
    }

    fn andi(rd: u32, rs1: u32, imm: i32) -> u32 {
        i_type(imm, rs1, 7, rd, 0x13)
    }

    fn slli(rd: u32, rs1: u32, shamt: i32) -> u32 {
        i_type(shamt, rs1, 1, rd, 0x13)
    }

    fn lw(rd: u32, rs1: u32, imm: i32) -> u32 {
        i_type(imm, rs1, 2, rd, 0x03)
    }

    fn sw(rs2: u32, rs1: u32, imm: i32) -> u32 {
        s_type(imm, rs2, rs1, 2)
    }

    fn beq(rs1: u32, rs2: u32, imm: i32) -> u32 {
        b_type(imm, rs2, rs1, 0)
    }

    fn machine_with(words: &[u32]) -> (Machine<RiscV>, Arc<Mutex<Vec<u8>>>) {
        let mut bus = SystemBus::new();
        let sink = Arc::new(Mutex::new(Vec::new()));
        bus.attach_uart_tx_sink(sink.clone(), false);
        let mut machine = Machine::new(RiscV::new(), bus);
        machine
            .load_firmware(&ProgramImage::from_words(0, words))
            .unwrap();
        (machine, sink)
    }

    #[test]
    fn test_encoders_match_known_words() {
        assert_eq!(addi(1, 0, 5), 0x0050_0093);
        assert_eq!(beq(1, 2, 8), 0x0020_8463);
        assert_eq!(sw(6, 5, 0), 0x0062_A023);
        assert_eq!(jal(0, -8), 0xFF9F_F06F);
    }

    #[test]
    fn test_load_sets_entry_and_stack() {
        let mut machine = Machine::new(RiscV::new(), SystemBus::new());
        let image = ProgramImage::from_words(0x40, &[EBREAK]);
        machine.load_firmware(&image).unwrap();
        assert_eq!(machine.cpu.get_pc(), 0x40);
        assert_eq!(machine.cpu.get_register(2), 0x1_0000);
    }

    #[test]
    fn test_load_outside_ram_fails() {
        let mut machine = Machine::new(RiscV::new(), SystemBus::new());
        let image = ProgramImage::from_words(0x2000_0000, &[EBREAK]);
        assert_eq!(
            machine.load_firmware(&image),
            Err(SimulationError::MemoryViolation(0x2000_0000))
        );
    }

    #[test]
    fn test_uart_polled_transmit() {
        let program = [
            lui(5, 0x1000_0000),
            addi(7, 0, b'H' as i32),
            lw(6, 5, 4),
            andi(6, 6, 4),
            beq(6, 0, -8),
            sw(7, 5, 0),
            addi(7, 0, b'i' as i32),
            lw(6, 5, 4),
            andi(6, 6, 4),
            beq(6, 0, -8),
            sw(7, 5, 0),
            EBREAK,
        ];
        let (mut machine, sink) = machine_with(&program);
        if let Some(uart) = machine.bus.uart_mut() {
            *uart = crate::peripherals::uart::Uart::with_latency(2);
            uart.set_sink(Some(sink.clone()), false);
        }

        let summary = machine.run(1_000);
        assert_eq!(summary.stop_reason, StopReason::Halt);
        assert_eq!(summary.error, Some(SimulationError::Halted(44)));
        assert_eq!(*sink.lock().unwrap(), b"Hi".to_vec());
        // Second byte had to wait out two busy polls.
        assert_eq!(machine.bus.uart().map(|u| u.status_polls()), Some(4));
    }

    #[test]
    fn test_switch_echo() {
        let program = [
            lui(5, 0x1000_1000),
            lw(6, 5, 0),
            lui(7, 0x0001_0000),
            addi(7, 7, -1),
            r_type(0, 7, 6, 7, 6), // and x6, x6, x7
            sw(6, 5, 8),
            EBREAK,
        ];
        let (mut machine, _sink) = machine_with(&program);
        machine.bus.set_switches(0x0001_BEEF);
        let summary = machine.run(100);
        assert_eq!(summary.stop_reason, StopReason::Halt);
        assert_eq!(summary.steps, 6);
        assert_eq!(machine.bus.led_history(), vec![0xBEEF]);
    }

    #[test]
    fn test_heartbeat_loop_hits_step_limit() {
        let program = [
            lui(5, 0x1000_1000),
            lui(7, 0x5000),
            addi(7, 7, 0x555),
            slli(6, 7, 1),
            sw(6, 5, 8),
            sw(7, 5, 8),
            jal(0, -8),
        ];
        let (mut machine, _sink) = machine_with(&program);
        let summary = machine.run(24);
        assert_eq!(summary.stop_reason, StopReason::MaxSteps);
        assert_eq!(summary.steps, 24);
        assert!(summary.error.is_none());

        let history = machine.bus.led_history();
        assert_eq!(history.len(), 14);
        assert_eq!(&history[..2], &[0xAAAA, 0x5555]);
        assert_eq!(heartbeat_cycles(&history), 7);

        // A second run continues where the first stopped.
        let more = machine.run(3);
        assert_eq!(more.steps, 3);
        assert_eq!(machine.steps, 27);
    }

    #[test]
    fn test_m_extension() {
        let program = [
            addi(1, 0, -7),
            addi(2, 0, 2),
            r_type(1, 2, 1, 4, 3), // div
            r_type(1, 2, 1, 6, 4), // rem
            r_type(1, 2, 1, 0, 5), // mul
            r_type(1, 0, 1, 5, 6), // divu by zero
            EBREAK,
        ];
        let (mut machine, _sink) = machine_with(&program);
        machine.run(100);
        assert_eq!(machine.cpu.get_register(3) as i32, -3);
        assert_eq!(machine.cpu.get_register(4) as i32, -1);
        assert_eq!(machine.cpu.get_register(5) as i32, -14);
        assert_eq!(machine.cpu.get_register(6), u32::MAX);
    }

    #[test]
    fn test_decode_error_stops_run() {
        let (mut machine, _sink) = machine_with(&[addi(1, 0, 1), 0xFFFF_FFFF]);
        let summary = machine.run(10);
        assert_eq!(summary.stop_reason, StopReason::DecodeError);
        assert_eq!(summary.error, Some(SimulationError::DecodeError(4)));
        assert_eq!(summary.steps, 1);
    }

    #[test]
    fn test_jump_outside_memory() {
        let program = [
            lui(5, 0x2000_0000),
            i_type(0, 5, 0, 0, 0x67), // jalr x0, 0(x5)
        ];
        let (mut machine, _sink) = machine_with(&program);
        let summary = machine.run(10);
        assert_eq!(summary.stop_reason, StopReason::MemoryViolation);
        assert_eq!(
            summary.error,
            Some(SimulationError::MemoryViolation(0x2000_0000))
        );
    }

    #[test]
    fn test_metrics_observer_counts_instructions() {
        let metrics = Arc::new(PerformanceMetrics::new());
        let mut bus = SystemBus::new();
        bus.attach_uart_tx_sink(Arc::new(Mutex::new(Vec::new())), false);
        let mut machine = Machine::new(RiscV::new(), bus);
        machine.observers.push(metrics.clone());
        machine
            .load_firmware(&ProgramImage::from_words(
                0,
                &[addi(1, 0, 1), addi(1, 1, 1), EBREAK],
            ))
            .unwrap();
        machine.run(10);
        // The halting ebreak is fetched too.
        assert_eq!(metrics.get_instructions(), 3);
        assert_eq!(machine.cpu.get_register(1), 2);
    }
}
