// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;

pub const SWITCH_OFFSET: u64 = 0x0;
pub const LED_OFFSET: u64 = 0x8;

/// Switch inputs and LED outputs of the demo board.
///
/// Every store to the LED register is kept in `history`, so a test can check
/// the echo write and the heartbeat that follows it.
#[derive(Debug, Default)]
pub struct Gpio {
    switches: u32,
    leds: u32,
    history: Vec<u32>,
}

impl Gpio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_switches(switches: u32) -> Self {
        Self {
            switches,
            ..Self::default()
        }
    }

    pub fn set_switches(&mut self, switches: u32) {
        self.switches = switches;
    }

    pub fn switches(&self) -> u32 {
        self.switches
    }

    pub fn leds(&self) -> u32 {
        self.leds
    }

    pub fn history(&self) -> &[u32] {
        &self.history
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset {
            SWITCH_OFFSET => self.switches,
            LED_OFFSET => self.leds,
            _ => 0,
        }
    }

    fn write_leds(&mut self, value: u32) {
        tracing::debug!("LEDs <- {:#06x}", value);
        self.leds = value;
        self.history.push(value);
    }
}

impl crate::Peripheral for Gpio {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let reg_val = self.read_reg(offset & !3);
        let shift = (offset % 4) * 8;
        Ok((reg_val >> shift) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        // Switches are input-only; byte stores to the LED register merge.
        if offset & !3 == LED_OFFSET {
            let shift = (offset % 4) * 8;
            let merged = (self.leds & !(0xFF << shift)) | ((value as u32) << shift);
            self.write_leds(merged);
        }
        Ok(())
    }

    fn read_u32(&self, offset: u64) -> SimResult<u32> {
        Ok(self.read_reg(offset))
    }

    fn write_u32(&mut self, offset: u64, value: u32) -> SimResult<()> {
        if offset == LED_OFFSET {
            self.write_leds(value);
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    #[test]
    fn switches_are_read_only() {
        let mut gpio = Gpio::with_switches(0x00AB_CDEF);
        gpio.write_u32(SWITCH_OFFSET, 0).unwrap();
        assert_eq!(gpio.read_u32(SWITCH_OFFSET).unwrap(), 0x00AB_CDEF);
        assert_eq!(gpio.read(SWITCH_OFFSET + 1).unwrap(), 0xCD);
        assert!(gpio.history().is_empty());
    }

    #[test]
    fn led_word_writes_are_recorded() {
        let mut gpio = Gpio::new();
        gpio.write_u32(LED_OFFSET, 0xAAAA).unwrap();
        gpio.write_u32(LED_OFFSET, 0x5555).unwrap();
        gpio.write_u32(LED_OFFSET, 0x5555).unwrap();
        assert_eq!(gpio.history(), &[0xAAAA, 0x5555, 0x5555]);
        assert_eq!(gpio.read_u32(LED_OFFSET).unwrap(), 0x5555);
    }

    #[test]
    fn led_byte_write_merges() {
        let mut gpio = Gpio::new();
        gpio.write_u32(LED_OFFSET, 0x1234).unwrap();
        gpio.write(LED_OFFSET + 1, 0xFF).unwrap();
        assert_eq!(gpio.leds(), 0xFF34);
        assert_eq!(gpio.history(), &[0x1234, 0xFF34]);
    }
}
