// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use bitflags::bitflags;
use std::cell::Cell;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

pub const DATA_OFFSET: u64 = 0x0;
pub const STATUS_OFFSET: u64 = 0x4;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UartStatus: u32 {
        const TX_READY = 1 << 2;
    }
}

/// Transmit-only UART.
///
/// A store to the data register sends its low byte. After each byte the
/// status register reports busy for `tx_latency` polls; a stuck transmitter
/// never reports ready.
#[derive(Debug)]
pub struct Uart {
    tx_latency: u32,
    stuck: bool,
    busy_polls_left: Cell<u32>,
    status_polls: Cell<u64>,
    sink: Option<Arc<Mutex<Vec<u8>>>>,
    echo_stdout: bool,
    transmitted: u64,
}

impl Default for Uart {
    fn default() -> Self {
        Self::new()
    }
}

impl Uart {
    pub fn new() -> Self {
        Self {
            tx_latency: 0,
            stuck: false,
            busy_polls_left: Cell::new(0),
            status_polls: Cell::new(0),
            sink: None,
            echo_stdout: true,
            transmitted: 0,
        }
    }

    pub fn with_latency(tx_latency: u32) -> Self {
        Self {
            tx_latency,
            ..Self::new()
        }
    }

    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    pub fn is_stuck(&self) -> bool {
        self.stuck
    }

    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>, echo_stdout: bool) {
        self.sink = sink;
        self.echo_stdout = echo_stdout;
    }

    pub fn status(&self) -> UartStatus {
        if self.stuck || self.busy_polls_left.get() > 0 {
            UartStatus::empty()
        } else {
            UartStatus::TX_READY
        }
    }

    /// Number of status register reads so far.
    pub fn status_polls(&self) -> u64 {
        self.status_polls.get()
    }

    pub fn bytes_transmitted(&self) -> u64 {
        self.transmitted
    }

    fn poll_status(&self) -> u32 {
        self.status_polls.set(self.status_polls.get() + 1);
        let status = self.status();
        let left = self.busy_polls_left.get();
        if left > 0 {
            self.busy_polls_left.set(left - 1);
        }
        status.bits()
    }

    fn push_tx(&mut self, value: u8) {
        if !self.status().contains(UartStatus::TX_READY) {
            tracing::debug!("UART data written while transmitter busy: {:#04x}", value);
        }

        if let Some(sink) = &self.sink {
            if let Ok(mut guard) = sink.lock() {
                guard.push(value);
            }
        }

        if self.echo_stdout {
            print!("{}", value as char);
            let _ = io::stdout().flush();
        }

        self.transmitted += 1;
        self.busy_polls_left.set(self.tx_latency);
    }
}

impl crate::Peripheral for Uart {
    fn read(&self, offset: u64) -> SimResult<u8> {
        match offset {
            STATUS_OFFSET => Ok(self.poll_status() as u8),
            _ => Ok(0),
        }
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if offset == DATA_OFFSET {
            self.push_tx(value);
        }
        Ok(())
    }

    fn read_u32(&self, offset: u64) -> SimResult<u32> {
        match offset {
            STATUS_OFFSET => Ok(self.poll_status()),
            _ => Ok(0),
        }
    }

    fn write_u32(&mut self, offset: u64, value: u32) -> SimResult<()> {
        if offset == DATA_OFFSET {
            self.push_tx(value as u8);
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
