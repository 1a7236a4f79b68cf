// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Running the harness on the host against the simulated devices.

use crate::bus::SystemBus;
use crate::{Bus, SimResult, SimulationError, StopReason};
use selftest_harness::{Delay, Harness, IoBus, ResultBuffer, State};

impl IoBus for SystemBus {
    fn read32(&mut self, addr: u32) -> u32 {
        match Bus::read_u32(self, addr as u64) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Native read failed: {}", e);
                0
            }
        }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        if let Err(e) = Bus::write_u32(self, addr as u64, value) {
            tracing::warn!("Native write failed: {}", e);
        }
    }
}

/// Records requested delays instead of spinning.
#[derive(Debug, Default)]
pub struct CountingDelay {
    pub calls: u64,
    pub total: u64,
}

impl Delay for CountingDelay {
    fn delay(&mut self, count: i32) {
        self.calls += 1;
        self.total += count.max(0) as u64;
    }
}

#[derive(Debug)]
pub struct NativeRun {
    pub transitions: u64,
    pub state: State,
    pub results: ResultBuffer,
    pub delay: CountingDelay,
    pub stop_reason: StopReason,
}

/// Run the checks, print the report, then take `beats` heartbeat steps.
pub fn run_native(bus: &mut SystemBus, beats: u64) -> SimResult<NativeRun> {
    run_native_until(bus, beats.saturating_add(2), |_| None)
}

/// Drive the harness state machine for at most `max_transitions` steps.
///
/// `should_stop` is asked before every transition and can end the run early
/// with its own stop reason. A stuck transmitter would spin the report step
/// forever on the host, so it is rejected up front.
pub fn run_native_until<F>(
    bus: &mut SystemBus,
    max_transitions: u64,
    mut should_stop: F,
) -> SimResult<NativeRun>
where
    F: FnMut(&SystemBus) -> Option<StopReason>,
{
    if bus.uart().is_some_and(|uart| uart.is_stuck()) {
        return Err(SimulationError::Unsupported(
            "native run with a stuck UART transmitter".to_string(),
        ));
    }

    let map = bus.memory_map().ok_or_else(|| {
        SimulationError::Unsupported(
            "device registers outside the 32-bit address space".to_string(),
        )
    })?;
    let mut harness = Harness::with_map(&mut *bus, CountingDelay::default(), map);
    let mut done = 0;
    let mut stop_reason = StopReason::MaxSteps;
    while done < max_transitions {
        if let Some(reason) = should_stop(&**harness.bus()) {
            stop_reason = reason;
            break;
        }
        let state = harness.advance();
        done += 1;
        tracing::debug!("Harness transition {} -> {:?}", done, state);
    }
    let state = harness.state();
    let (_, delay, results) = harness.into_parts();
    Ok(NativeRun {
        transitions: done,
        state,
        results,
        delay,
        stop_reason,
    })
}
