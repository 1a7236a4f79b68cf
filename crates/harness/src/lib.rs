// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Self-test harness for a bare-metal RISC-V core.
//!
//! The harness runs a fixed list of integer checks, reports every result over
//! a polled UART and then blinks the LED bank forever. Everything that touches
//! hardware goes through [`IoBus`], so the same code drives real MMIO on the
//! target and simulated devices on the host.

#![cfg_attr(not(test), no_std)]

pub mod checks;
pub mod delay;
pub mod hex;
pub mod mmio;
pub mod results;
pub mod state;
pub mod uart;

pub use delay::{BusyWait, Delay};
pub use mmio::{IoBus, MemoryMap, Mmio};
pub use results::{ResultBuffer, ResultsFull};
pub use state::{Harness, Pattern, State};
pub use uart::UartTx;
