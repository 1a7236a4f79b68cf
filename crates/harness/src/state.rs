// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::hint::black_box;

use crate::checks;
use crate::delay::Delay;
use crate::mmio::{IoBus, MemoryMap, HEARTBEAT_DELAY, HEARTBEAT_PATTERNS, SWITCH_MASK};
use crate::results::ResultBuffer;
use crate::uart::UartTx;

pub const REPORT_TITLE: &str = "RISC-V CPU Test Results:";
pub const REPORT_RULE: &str = "========================";
pub const REPORT_DONE: &str = "All tests completed!";

/// LED heartbeat pattern about to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    High,
    Low,
}

impl Pattern {
    pub fn value(self) -> u32 {
        match self {
            Pattern::High => HEARTBEAT_PATTERNS[0],
            Pattern::Low => HEARTBEAT_PATTERNS[1],
        }
    }

    pub fn next(self) -> Self {
        match self {
            Pattern::High => Pattern::Low,
            Pattern::Low => Pattern::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing has run yet.
    Checks,
    /// Results are recorded and waiting to go out on the UART.
    Report,
    /// Terminal: blink forever.
    Heartbeat(Pattern),
}

/// Runs the checks, prints the report and then owns the LED bank forever.
pub struct Harness<B: IoBus, D: Delay> {
    bus: B,
    delay: D,
    map: MemoryMap,
    results: ResultBuffer,
    state: State,
}

impl<B: IoBus, D: Delay> Harness<B, D> {
    pub fn new(bus: B, delay: D) -> Self {
        Self::with_map(bus, delay, MemoryMap::DEFAULT)
    }

    pub fn with_map(bus: B, delay: D, map: MemoryMap) -> Self {
        Self {
            bus,
            delay,
            map,
            results: ResultBuffer::new(),
            state: State::Checks,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn results(&self) -> &ResultBuffer {
        &self.results
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_parts(self) -> (B, D, ResultBuffer) {
        (self.bus, self.delay, self.results)
    }

    /// Do the work of the current state and move to the next one.
    pub fn advance(&mut self) -> State {
        self.state = match self.state {
            State::Checks => {
                self.run_checks();
                State::Report
            }
            State::Report => {
                self.report();
                State::Heartbeat(Pattern::High)
            }
            State::Heartbeat(pattern) => {
                self.beat(pattern);
                State::Heartbeat(pattern.next())
            }
        };
        self.state
    }

    pub fn run(mut self) -> ! {
        loop {
            self.advance();
        }
    }

    fn run_checks(&mut self) {
        // Operands go through black_box so the core, not the compiler, does
        // the arithmetic.
        let r = &mut self.results;

        r.push(checks::add(black_box(5), black_box(3)) as u32);
        r.push(checks::add(black_box(100), black_box(-50)) as u32);

        r.push(checks::multiply(black_box(7), black_box(6)) as u32);
        r.push(checks::multiply(black_box(13), black_box(13)) as u32);

        r.push(checks::factorial(black_box(5)) as u32);
        r.push(checks::factorial(black_box(7)) as u32);

        r.push(checks::fibonacci(black_box(10)) as u32);
        r.push(checks::fibonacci(black_box(15)) as u32);

        let (all, low, high, one, wide) = (
            black_box(0xFFu32),
            black_box(0x0Fu32),
            black_box(0xF0u32),
            black_box(0x01u32),
            black_box(0x100u32),
        );
        r.push(all & low);
        r.push(all | high);
        r.push(all ^ low);
        r.push(one << black_box(8));
        r.push(wide >> black_box(4));

        let arr = black_box(checks::squares());
        r.push(arr[5] as u32);
        r.push(arr[9] as u32);

        for value in checks::pointer_walk(&arr) {
            r.push(value as u32);
        }

        r.push(checks::alternating_sum(black_box(20)) as u32);
        r.push(checks::dispatch_sum(black_box(5)) as u32);

        let echoed = self.echo_switches();
        self.results.push(echoed);
    }

    fn echo_switches(&mut self) -> u32 {
        let switches = self.bus.read32(self.map.gpio_switch) & SWITCH_MASK;
        self.bus.write32(self.map.gpio_led, switches);
        switches
    }

    fn report(&mut self) {
        let mut uart = UartTx::new(&mut self.bus, &self.map);
        uart.send_line(REPORT_TITLE);
        uart.send_line(REPORT_RULE);
        for (index, value) in self.results.iter().enumerate() {
            uart.send_string("Test ");
            uart.send_decimal2(index as u32);
            uart.send_string(": 0x");
            uart.print_hex(value);
            uart.send_string("\r\n");
        }
        uart.send_string("\r\n");
        uart.send_line(REPORT_DONE);
    }

    fn beat(&mut self, pattern: Pattern) {
        self.bus.write32(self.map.gpio_led, pattern.value());
        self.delay.delay(HEARTBEAT_DELAY);
    }
}
