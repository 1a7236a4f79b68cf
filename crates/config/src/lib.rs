// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unsupported schema_version '{0}'. Supported versions: '1.0'")]
    UnsupportedSchema(String),
    #[error("Input 'firmware' path cannot be empty unless 'native' is set")]
    MissingFirmware,
    #[error("Limit 'max_steps' must be greater than zero")]
    ZeroMaxSteps,
    #[error("Invalid size format '{0}'")]
    InvalidSize(String),
    #[error("{0} region overlaps {1} region")]
    Overlap(&'static str, &'static str),
    #[error("{0} region {1:#x}+{2:#x} does not fit the 32-bit address space")]
    OutOfAddressSpace(&'static str, u64, u64),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MemoryRange {
    pub base: u64,
    pub size: String, // e.g. "64KiB"
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct UartConfig {
    pub base: u64,
    /// Not-ready status polls after every transmitted byte.
    #[serde(default)]
    pub tx_latency: u32,
    /// Transmitter never reports ready.
    #[serde(default)]
    pub stuck: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GpioConfig {
    pub base: u64,
    #[serde(default)]
    pub switches: u32,
}

/// Memory map and device behaviour of the board under simulation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BoardDescriptor {
    pub name: String,
    pub ram: MemoryRange,
    pub uart: UartConfig,
    pub gpio: GpioConfig,
}

impl Default for BoardDescriptor {
    fn default() -> Self {
        Self {
            name: "sample-cpu".to_string(),
            ram: MemoryRange {
                base: 0x0000_0000,
                size: "64KiB".to_string(),
            },
            uart: UartConfig {
                base: 0x1000_0000,
                tx_latency: 0,
                stuck: false,
            },
            gpio: GpioConfig {
                base: 0x1000_1000,
                switches: 0,
            },
        }
    }
}

/// Register block sizes of the on-board devices.
pub const UART_BLOCK_SIZE: u64 = 0x8;
pub const GPIO_BLOCK_SIZE: u64 = 0x10;

impl BoardDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open board descriptor at {:?}", path.as_ref()))?;
        let board: Self =
            serde_yaml::from_reader(f).context("Failed to parse Board Descriptor")?;
        board.validate()?;
        Ok(board)
    }

    pub fn ram_size(&self) -> Result<u64> {
        parse_size(&self.ram.size)
    }

    pub fn validate(&self) -> Result<()> {
        let ram = (self.ram.base, self.ram_size()?);
        let uart = (self.uart.base, UART_BLOCK_SIZE);
        let gpio = (self.gpio.base, GPIO_BLOCK_SIZE);

        for (name, region) in [("ram", ram), ("uart", uart), ("gpio", gpio)] {
            let fits = region
                .0
                .checked_add(region.1)
                .is_some_and(|end| end <= ADDRESS_SPACE_END);
            if !fits {
                return Err(ConfigError::OutOfAddressSpace(name, region.0, region.1).into());
            }
        }

        if overlaps(ram, uart) {
            return Err(ConfigError::Overlap("uart", "ram").into());
        }
        if overlaps(ram, gpio) {
            return Err(ConfigError::Overlap("gpio", "ram").into());
        }
        if overlaps(uart, gpio) {
            return Err(ConfigError::Overlap("gpio", "uart").into());
        }
        Ok(())
    }
}

/// First address past the 32-bit bus.
const ADDRESS_SPACE_END: u64 = 1 << 32;

// Both regions must already fit below `ADDRESS_SPACE_END`.
fn overlaps(a: (u64, u64), b: (u64, u64)) -> bool {
    a.0 < b.0 + b.1 && b.0 < a.0 + a.1
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TestInputs {
    #[serde(default)]
    pub firmware: Option<String>,
    #[serde(default)]
    pub board: Option<String>,
    /// Run the harness compiled for the host instead of a firmware image.
    #[serde(default)]
    pub native: bool,
    /// Overrides the board's switch bank.
    #[serde(default)]
    pub switches: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    /// Instructions for firmware runs, harness transitions for native runs.
    pub max_steps: u64,
    #[serde(default)]
    pub wall_time_ms: Option<u64>,
    #[serde(default)]
    pub max_uart_bytes: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxSteps,
    WallTime,
    MaxUartBytes,
    MemoryViolation,
    DecodeError,
    Halt,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartContainsAssertion {
    pub uart_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartRegexAssertion {
    pub uart_regex: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LedSequenceAssertion {
    /// Expected prefix of the LED write history.
    pub led_sequence: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ResultsAssertion {
    /// Expected values of the reported results, in index order.
    pub results: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatAssertion {
    pub heartbeat_cycles: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TestAssertion {
    UartContains(UartContainsAssertion),
    UartRegex(UartRegexAssertion),
    ExpectedStopReason(StopReasonAssertion),
    LedSequence(LedSequenceAssertion),
    Results(ResultsAssertion),
    HeartbeatCycles(HeartbeatAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    #[serde(default)]
    pub inputs: TestInputs,
    pub limits: TestLimits,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open test script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Test Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchema(self.schema_version.clone()).into());
        }

        let has_firmware = self
            .inputs
            .firmware
            .as_deref()
            .is_some_and(|f| !f.trim().is_empty());
        if !self.inputs.native && !has_firmware {
            return Err(ConfigError::MissingFirmware.into());
        }

        if self.limits.max_steps == 0 {
            return Err(ConfigError::ZeroMaxSteps.into());
        }

        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|_| ConfigError::InvalidSize(size_str.to_string()))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
