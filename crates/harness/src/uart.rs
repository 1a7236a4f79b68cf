// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::hex::hex_digits;
use crate::mmio::{IoBus, MemoryMap, UART_TX_READY};

/// Polled UART transmitter.
///
/// There is no timeout: if the device never reports ready, `send_byte` never
/// returns.
pub struct UartTx<'a, B: IoBus> {
    bus: &'a mut B,
    map: &'a MemoryMap,
}

impl<'a, B: IoBus> UartTx<'a, B> {
    pub fn new(bus: &'a mut B, map: &'a MemoryMap) -> Self {
        Self { bus, map }
    }

    pub fn send_byte(&mut self, byte: u8) {
        while self.bus.read32(self.map.uart_status) & UART_TX_READY == 0 {
            core::hint::spin_loop();
        }
        self.bus.write32(self.map.uart_data, byte as u32);
    }

    /// Send bytes up to (not including) the first NUL, or the whole string if
    /// there is none.
    pub fn send_string(&mut self, s: &str) {
        for byte in s.bytes().take_while(|&b| b != 0) {
            self.send_byte(byte);
        }
    }

    pub fn send_line(&mut self, s: &str) {
        self.send_string(s);
        self.send_string("\r\n");
    }

    /// Two decimal digits; only meaningful for 0..=99.
    pub fn send_decimal2(&mut self, value: u32) {
        self.send_byte(b'0' + (value / 10) as u8);
        self.send_byte(b'0' + (value % 10) as u8);
    }

    pub fn print_hex(&mut self, value: u32) {
        for digit in hex_digits(value) {
            self.send_byte(digit);
        }
    }
}

impl<B: IoBus> core::fmt::Write for UartTx<'_, B> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for byte in s.bytes() {
            self.send_byte(byte);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::testing::FakeBus;
    use core::fmt::Write;

    #[test]
    fn send_byte_waits_for_ready() {
        let mut bus = FakeBus::new();
        bus.busy_polls = 3;
        let map = MemoryMap::DEFAULT;
        {
            let mut tx = UartTx::new(&mut bus, &map);
            tx.send_byte(b'A');
            tx.send_byte(b'B');
        }
        assert_eq!(bus.tx, b"AB");
        // First byte: one ready poll. Second byte: three busy polls then ready.
        assert_eq!(bus.status_reads, 5);
    }

    #[test]
    fn send_string_stops_at_nul() {
        let mut bus = FakeBus::new();
        let map = MemoryMap::DEFAULT;
        UartTx::new(&mut bus, &map).send_string("ok\0ignored");
        assert_eq!(bus.tx_text(), "ok");
    }

    #[test]
    fn print_hex_emits_eight_digits() {
        let mut bus = FakeBus::new();
        let map = MemoryMap::DEFAULT;
        {
            let mut tx = UartTx::new(&mut bus, &map);
            tx.print_hex(0);
            tx.send_byte(b' ');
            tx.print_hex(0xDEAD_BEEF);
        }
        assert_eq!(bus.tx_text(), "00000000 DEADBEEF");
    }

    #[test]
    fn decimal2_zero_pads() {
        let mut bus = FakeBus::new();
        let map = MemoryMap::DEFAULT;
        {
            let mut tx = UartTx::new(&mut bus, &map);
            tx.send_decimal2(0);
            tx.send_decimal2(9);
            tx.send_decimal2(31);
        }
        assert_eq!(bus.tx_text(), "000931");
    }

    #[test]
    fn fmt_write_goes_through_uart() {
        let mut bus = FakeBus::new();
        let map = MemoryMap::DEFAULT;
        write!(UartTx::new(&mut bus, &map), "x={}", 42).unwrap();
        assert_eq!(bus.tx_text(), "x=42");
    }
}
