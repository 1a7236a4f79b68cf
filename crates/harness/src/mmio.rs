// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::ptr;
use core::sync::atomic::{compiler_fence, Ordering};

/// Transmitter-ready bit in the UART status register.
pub const UART_TX_READY: u32 = 1 << 2;

/// Only the low 16 switches are wired to the LED bank.
pub const SWITCH_MASK: u32 = 0xFFFF;

/// LED patterns written alternately once the report is out.
pub const HEARTBEAT_PATTERNS: [u32; 2] = [0xAAAA, 0x5555];

/// Busy-wait count between heartbeat patterns.
pub const HEARTBEAT_DELAY: i32 = 100_000;

/// Word-wide access to device registers.
///
/// Implementations must not cache, merge or drop accesses: every call is one
/// load or store observed by the device.
pub trait IoBus {
    fn read32(&mut self, addr: u32) -> u32;
    fn write32(&mut self, addr: u32, value: u32);
}

impl<B: IoBus + ?Sized> IoBus for &mut B {
    fn read32(&mut self, addr: u32) -> u32 {
        (**self).read32(addr)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        (**self).write32(addr, value)
    }
}

/// Register addresses used by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMap {
    pub uart_data: u32,
    pub uart_status: u32,
    pub gpio_switch: u32,
    pub gpio_led: u32,
}

impl MemoryMap {
    pub const DEFAULT: Self = Self {
        uart_data: 0x1000_0000,
        uart_status: 0x1000_0004,
        gpio_switch: 0x1000_1000,
        gpio_led: 0x1000_1008,
    };

    /// Derive the map from the UART and GPIO block base addresses.
    pub const fn from_bases(uart_base: u32, gpio_base: u32) -> Self {
        Self {
            uart_data: uart_base,
            uart_status: uart_base + 0x4,
            gpio_switch: gpio_base,
            gpio_led: gpio_base + 0x8,
        }
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Volatile access to the physical address space.
#[derive(Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Every address later passed to [`IoBus::read32`] or [`IoBus::write32`]
    /// must be a 4-byte aligned device register that is valid to access for
    /// the whole lifetime of the returned value.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl IoBus for Mmio {
    fn read32(&mut self, addr: u32) -> u32 {
        compiler_fence(Ordering::SeqCst);
        // SAFETY: validity of `addr` is the contract of `Mmio::new`.
        let value = unsafe { ptr::read_volatile(addr as usize as *const u32) };
        compiler_fence(Ordering::SeqCst);
        value
    }

    fn write32(&mut self, addr: u32, value: u32) {
        compiler_fence(Ordering::SeqCst);
        // SAFETY: validity of `addr` is the contract of `Mmio::new`.
        unsafe { ptr::write_volatile(addr as usize as *mut u32, value) };
        compiler_fence(Ordering::SeqCst);
    }
}
