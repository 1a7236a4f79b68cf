// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#![no_std]
#![no_main]

use panic_halt as _;
use riscv_rt::entry;
use selftest_harness::{BusyWait, Harness, Mmio};

#[entry]
fn main() -> ! {
    // SAFETY: the board decodes the UART and GPIO register blocks at the
    // addresses in `MemoryMap::DEFAULT`, and nothing else touches them.
    let bus = unsafe { Mmio::new() };

    Harness::new(bus, BusyWait).run()
}
