// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use selftest_config::{StopReason, TestAssertion, TestLimits};
use selftest_core::transcript::Report;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::error;

pub const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pass,
    Fail,
    Error,
}

#[derive(Debug, Serialize)]
pub struct AssertionResult {
    pub assertion: TestAssertion,
    pub passed: bool,
}

#[derive(Debug, Serialize, Default)]
pub struct TestConfig {
    pub script: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board: Option<PathBuf>,
    pub native: bool,
}

/// Contents of `result.json`.
#[derive(Debug, Serialize)]
pub struct TestResult {
    pub result_schema_version: &'static str,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    pub steps_executed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<TestLimits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub assertions: Vec<AssertionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_hash: Option<String>,
    pub led_history: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
    pub config: TestConfig,
}

impl TestResult {
    pub fn config_error(config: TestConfig, limits: Option<TestLimits>, message: String) -> Self {
        Self {
            result_schema_version: RESULT_SCHEMA_VERSION,
            status: Status::Error,
            stop_reason: None,
            steps_executed: 0,
            limits,
            message: Some(message),
            assertions: Vec::new(),
            firmware_hash: None,
            led_history: Vec::new(),
            report: None,
            config,
        }
    }
}

pub fn firmware_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write `result.json` and `uart.log` into `output_dir`. Failures are logged,
/// not returned: the exit code already carries the verdict.
pub fn write_outputs(output_dir: Option<&Path>, result: &TestResult, uart: &[u8]) {
    let Some(output_dir) = output_dir else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }

    let result_path = output_dir.join("result.json");
    match std::fs::File::create(&result_path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, result) {
                error!("Failed to write result.json: {}", e);
            }
        }
        Err(e) => error!("Failed to create result.json: {}", e),
    }

    let uart_path = output_dir.join("uart.log");
    if let Err(e) = std::fs::write(&uart_path, uart) {
        error!("Failed to write uart.log: {}", e);
    }
}
