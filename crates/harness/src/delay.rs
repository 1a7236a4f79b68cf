// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::ptr;

/// Spin for roughly `count` iterations. Not a timing primitive.
///
/// The counter lives behind volatile accesses so the loop survives
/// optimisation. Non-positive counts return immediately.
pub fn delay(count: i32) {
    let mut counter = count;
    let cell = ptr::addr_of_mut!(counter);
    // SAFETY: `cell` points at a live local for the whole loop.
    unsafe {
        while ptr::read_volatile(cell) > 0 {
            let left = ptr::read_volatile(cell);
            ptr::write_volatile(cell, left - 1);
        }
    }
}

/// Pause between heartbeat patterns. Tests swap in a recording version.
pub trait Delay {
    fn delay(&mut self, count: i32);
}

/// The busy-wait loop used on hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusyWait;

impl Delay for BusyWait {
    fn delay(&mut self, count: i32) {
        delay(count);
    }
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn delay(&mut self, count: i32) {
        (**self).delay(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_wait_returns() {
        BusyWait.delay(1_000);
        BusyWait.delay(0);
        BusyWait.delay(-5);
    }
}
