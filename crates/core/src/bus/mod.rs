// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::memory::LinearMemory;
use crate::peripherals::gpio::Gpio;
use crate::peripherals::uart::Uart;
use crate::{Peripheral, SimResult, SimulationError};
use selftest_config::{BoardDescriptor, GPIO_BLOCK_SIZE, UART_BLOCK_SIZE};
use selftest_harness::MemoryMap;
use std::sync::{Arc, Mutex};

pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn contains(&self, addr: u64, len: u64) -> bool {
        addr >= self.base && addr + len <= self.base + self.size
    }
}

/// RAM plus the UART and GPIO register blocks.
pub struct SystemBus {
    pub ram: LinearMemory,
    pub peripherals: Vec<PeripheralEntry>,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    /// The stock board: 64 KiB of RAM at 0, UART at 0x1000_0000, GPIO at
    /// 0x1000_1000.
    pub fn new() -> Self {
        let board = BoardDescriptor::default();
        let mut bus = Self {
            ram: LinearMemory::new(64 * 1024, board.ram.base),
            peripherals: Vec::new(),
        };
        bus.add_peripheral("uart", board.uart.base, UART_BLOCK_SIZE, Box::new(Uart::new()));
        bus.add_peripheral("gpio", board.gpio.base, GPIO_BLOCK_SIZE, Box::new(Gpio::new()));
        bus
    }

    pub fn from_config(board: &BoardDescriptor) -> anyhow::Result<Self> {
        board.validate()?;
        let ram_size = board.ram_size()?;

        let mut uart = Uart::with_latency(board.uart.tx_latency);
        uart.set_stuck(board.uart.stuck);

        let mut bus = Self {
            ram: LinearMemory::new(ram_size as usize, board.ram.base),
            peripherals: Vec::new(),
        };
        bus.add_peripheral("uart", board.uart.base, UART_BLOCK_SIZE, Box::new(uart));
        bus.add_peripheral(
            "gpio",
            board.gpio.base,
            GPIO_BLOCK_SIZE,
            Box::new(Gpio::with_switches(board.gpio.switches)),
        );

        tracing::info!(
            "Board '{}': RAM {:#x}+{:#x}, UART {:#x}, GPIO {:#x}",
            board.name,
            board.ram.base,
            ram_size,
            board.uart.base,
            board.gpio.base
        );
        Ok(bus)
    }

    pub fn add_peripheral(&mut self, name: &str, base: u64, size: u64, dev: Box<dyn Peripheral>) {
        tracing::debug!("Mapping peripheral '{}' at {:#x} ({:#x} bytes)", name, base, size);
        self.peripherals.push(PeripheralEntry {
            name: name.to_string(),
            base,
            size,
            dev,
        });
    }

    fn find<T: 'static>(&self) -> Option<(&PeripheralEntry, &T)> {
        self.peripherals.iter().find_map(|p| {
            let dev = p.dev.as_any()?.downcast_ref::<T>()?;
            Some((p, dev))
        })
    }

    fn find_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.peripherals
            .iter_mut()
            .find_map(|p| p.dev.as_any_mut()?.downcast_mut::<T>())
    }

    pub fn uart(&self) -> Option<&Uart> {
        self.find::<Uart>().map(|(_, uart)| uart)
    }

    pub fn uart_mut(&mut self) -> Option<&mut Uart> {
        self.find_mut::<Uart>()
    }

    pub fn gpio(&self) -> Option<&Gpio> {
        self.find::<Gpio>().map(|(_, gpio)| gpio)
    }

    pub fn gpio_mut(&mut self) -> Option<&mut Gpio> {
        self.find_mut::<Gpio>()
    }

    pub fn attach_uart_tx_sink(&mut self, sink: Arc<Mutex<Vec<u8>>>, echo_stdout: bool) {
        for p in &mut self.peripherals {
            let Some(any) = p.dev.as_any_mut() else {
                continue;
            };
            let Some(uart) = any.downcast_mut::<Uart>() else {
                continue;
            };
            uart.set_sink(Some(sink.clone()), echo_stdout);
        }
    }

    pub fn set_switches(&mut self, switches: u32) {
        if let Some(gpio) = self.gpio_mut() {
            gpio.set_switches(switches);
        }
    }

    /// Every value stored to the LED register, oldest first.
    pub fn led_history(&self) -> Vec<u32> {
        self.gpio()
            .map(|gpio| gpio.history().to_vec())
            .unwrap_or_default()
    }

    /// Register addresses as seen by the harness running on this bus.
    ///
    /// `None` when either register block sits outside the 32-bit address
    /// space the harness can reach.
    pub fn memory_map(&self) -> Option<MemoryMap> {
        let uart = self.find::<Uart>().map(|(p, _)| p.base);
        let gpio = self.find::<Gpio>().map(|(p, _)| p.base);
        match (uart, gpio) {
            (Some(uart), Some(gpio)) => {
                let reachable = |base: u64, size: u64| {
                    base.checked_add(size)
                        .filter(|end| *end <= 1 << 32)
                        .map(|_| base as u32)
                };
                Some(MemoryMap::from_bases(
                    reachable(uart, UART_BLOCK_SIZE)?,
                    reachable(gpio, GPIO_BLOCK_SIZE)?,
                ))
            }
            _ => Some(MemoryMap::DEFAULT),
        }
    }
}

impl crate::Bus for SystemBus {
    fn read_u8(&self, addr: u64) -> SimResult<u8> {
        if let Some(val) = self.ram.read_u8(addr) {
            return Ok(val);
        }

        for p in &self.peripherals {
            if p.contains(addr, 1) {
                return p.dev.read(addr - p.base);
            }
        }

        Err(SimulationError::MemoryViolation(addr))
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        if self.ram.write_u8(addr, value) {
            return Ok(());
        }

        for p in &mut self.peripherals {
            if p.contains(addr, 1) {
                return p.dev.write(addr - p.base, value);
            }
        }

        Err(SimulationError::MemoryViolation(addr))
    }

    fn read_u32(&self, addr: u64) -> SimResult<u32> {
        if addr % 4 == 0 {
            if let Some(p) = self.peripherals.iter().find(|p| p.contains(addr, 4)) {
                return p.dev.read_u32(addr - p.base);
            }
        }
        let b0 = self.read_u8(addr)? as u32;
        let b1 = self.read_u8(addr + 1)? as u32;
        let b2 = self.read_u8(addr + 2)? as u32;
        let b3 = self.read_u8(addr + 3)? as u32;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        if addr % 4 == 0 {
            if let Some(p) = self.peripherals.iter_mut().find(|p| p.contains(addr, 4)) {
                return p.dev.write_u32(addr - p.base, value);
            }
        }
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_u8(addr + i as u64, byte)?;
        }
        Ok(())
    }
}
