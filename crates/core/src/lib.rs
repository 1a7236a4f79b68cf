// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod cpu;
pub mod decoder;
pub mod memory;
pub mod metrics;
pub mod native;
pub mod peripherals;
pub mod transcript;

use std::any::Any;
use std::sync::Arc;

pub use selftest_config::StopReason;

mod tests;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Instruction decoding error at {0:#x}")]
    DecodeError(u64),
    #[error("Core halted at {0:#x}")]
    Halted(u64),
    #[error("Unsupported configuration: {0}")]
    Unsupported(String),
}

impl SimulationError {
    pub fn stop_reason(&self) -> StopReason {
        match self {
            SimulationError::MemoryViolation(_) => StopReason::MemoryViolation,
            SimulationError::DecodeError(_) => StopReason::DecodeError,
            SimulationError::Halted(_) | SimulationError::Unsupported(_) => StopReason::Halt,
        }
    }
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self) {}
    fn on_step_start(&self, _pc: u32, _opcode: u32) {}
    fn on_step_end(&self, _cycles: u32) {}
}

/// Trait representing a CPU architecture
pub trait Cpu {
    fn reset(&mut self);
    fn step(
        &mut self,
        bus: &mut dyn Bus,
        observers: &[Arc<dyn SimulationObserver>],
    ) -> SimResult<()>;
    fn set_pc(&mut self, val: u32);
    fn get_pc(&self) -> u32;
    fn set_sp(&mut self, val: u32);
    fn get_register(&self, id: u8) -> u32;
    fn set_register(&mut self, id: u8, val: u32);
}

/// Trait representing a memory-mapped peripheral.
///
/// Offsets are relative to the peripheral base. Word accesses default to four
/// little-endian byte accesses; registers with side effects override them so a
/// 32-bit store is seen as one event.
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;

    fn read_u32(&self, offset: u64) -> SimResult<u32> {
        let b0 = self.read(offset)? as u32;
        let b1 = self.read(offset + 1)? as u32;
        let b2 = self.read(offset + 2)? as u32;
        let b3 = self.read(offset + 3)? as u32;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    fn write_u32(&mut self, offset: u64, value: u32) -> SimResult<()> {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write(offset + i as u64, byte)?;
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// Trait representing the system bus
pub trait Bus {
    fn read_u8(&self, addr: u64) -> SimResult<u8>;
    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()>;

    fn read_u16(&self, addr: u64) -> SimResult<u16> {
        let b0 = self.read_u8(addr)? as u16;
        let b1 = self.read_u8(addr + 1)? as u16;
        // Little Endian
        Ok(b0 | (b1 << 8))
    }

    fn read_u32(&self, addr: u64) -> SimResult<u32> {
        let b0 = self.read_u8(addr)? as u32;
        let b1 = self.read_u8(addr + 1)? as u32;
        let b2 = self.read_u8(addr + 2)? as u32;
        let b3 = self.read_u8(addr + 3)? as u32;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8)?;
        self.write_u8(addr + 2, ((value >> 16) & 0xFF) as u8)?;
        self.write_u8(addr + 3, ((value >> 24) & 0xFF) as u8)?;
        Ok(())
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8)?;
        Ok(())
    }
}

/// How a bounded run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stop_reason: StopReason,
    pub steps: u64,
    pub error: Option<SimulationError>,
}

pub struct Machine<C: Cpu> {
    pub cpu: C,
    pub bus: bus::SystemBus,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
    pub steps: u64,
}

impl<C: Cpu> Machine<C> {
    pub fn new(cpu: C, bus: bus::SystemBus) -> Self {
        Self {
            cpu,
            bus,
            observers: Vec::new(),
            steps: 0,
        }
    }

    /// Copy the image into RAM and point the core at its entry. The stack
    /// pointer starts at the top of RAM, like the board's reset code.
    pub fn load_firmware(&mut self, image: &memory::ProgramImage) -> SimResult<()> {
        let mut loaded = 0usize;
        for segment in &image.segments {
            if self.bus.ram.load_from_segment(segment) {
                loaded += 1;
            } else {
                tracing::warn!(
                    "Failed to load segment at {:#x} - outside of memory map",
                    segment.start_addr
                );
            }
        }
        if loaded == 0 && !image.segments.is_empty() {
            return Err(SimulationError::MemoryViolation(image.segments[0].start_addr));
        }

        for observer in &self.observers {
            observer.on_simulation_start();
        }
        self.reset();
        self.cpu.set_pc(image.entry_point as u32);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.cpu.set_sp(self.bus.ram.end_addr() as u32);
        self.steps = 0;
    }

    pub fn step(&mut self) -> SimResult<()> {
        let res = self.cpu.step(&mut self.bus, &self.observers);
        if res.is_ok() {
            self.steps += 1;
            for observer in &self.observers {
                observer.on_step_end(1);
            }
        }
        res
    }

    /// Step until an error or `max_steps` instructions have retired.
    pub fn run(&mut self, max_steps: u64) -> RunSummary {
        let start = self.steps;
        let mut summary = RunSummary {
            stop_reason: StopReason::MaxSteps,
            steps: 0,
            error: None,
        };
        while self.steps - start < max_steps {
            if let Err(e) = self.step() {
                tracing::debug!("Run stopped after {} steps: {}", self.steps - start, e);
                summary.stop_reason = e.stop_reason();
                summary.error = Some(e);
                break;
            }
        }
        summary.steps = self.steps - start;
        for observer in &self.observers {
            observer.on_simulation_stop();
        }
        summary
    }
}
