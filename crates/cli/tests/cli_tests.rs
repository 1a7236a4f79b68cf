// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes "Hi" through the polled UART and stops on `ebreak`.
const HELLO_PROGRAM: [u32; 12] = [
    0x1000_02B7, // lui   x5, 0x10000
    0x0480_0393, // addi  x7, x0, 'H'
    0x0042_A303, // lw    x6, 4(x5)
    0x0043_7313, // andi  x6, x6, 4
    0xFE03_0CE3, // beq   x6, x0, -8
    0x0072_A023, // sw    x7, 0(x5)
    0x0690_0393, // addi  x7, x0, 'i'
    0x0042_A303,
    0x0043_7313,
    0xFE03_0CE3,
    0x0072_A023,
    0x0010_0073, // ebreak
];

fn temp_dir(prefix: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir()
        .join("selftest-cli-tests")
        .join(format!("{}-{}", prefix, nonce));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write temp file");
    path
}

/// Single-segment little-endian ELF32 image loaded at address 0.
fn write_hello_elf(dir: &Path) -> PathBuf {
    let code: Vec<u8> = HELLO_PROGRAM.iter().flat_map(|w| w.to_le_bytes()).collect();
    let mut elf = Vec::new();
    elf.extend_from_slice(&[0x7F, b'E', b'L', b'F', 1, 1, 1, 0]);
    elf.extend_from_slice(&[0; 8]);
    elf.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    elf.extend_from_slice(&243u16.to_le_bytes()); // EM_RISCV
    elf.extend_from_slice(&1u32.to_le_bytes());
    elf.extend_from_slice(&0u32.to_le_bytes()); // entry
    elf.extend_from_slice(&52u32.to_le_bytes()); // phoff
    elf.extend_from_slice(&0u32.to_le_bytes());
    elf.extend_from_slice(&0u32.to_le_bytes());
    for half in [52u16, 32, 1, 40, 0, 0] {
        elf.extend_from_slice(&half.to_le_bytes());
    }
    for field in [1u32, 84, 0, 0, code.len() as u32, code.len() as u32, 5, 4] {
        elf.extend_from_slice(&field.to_le_bytes());
    }
    elf.extend_from_slice(&code);

    let path = dir.join("hello.elf");
    std::fs::write(&path, elf).expect("Failed to write ELF");
    path
}

fn run_script(script: &Path, output_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_selftest"))
        .args([
            "test",
            "--script",
            script.to_str().unwrap(),
            "--no-uart-stdout",
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command")
}

fn read_result(output_dir: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(output_dir.join("result.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_native_script_passes() {
    let dir = temp_dir("native-pass");
    let script = write_file(
        &dir,
        "script.yaml",
        r#"
schema_version: "1.0"
inputs:
  native: true
  switches: 195
limits:
  max_steps: 6
assertions:
  - uart_contains: "All tests completed!"
  - uart_regex: "^RISC-V CPU Test Results:"
  - led_sequence: [195, 43690, 21845]
  - heartbeat_cycles: 2
  - expected_stop_reason: max_steps
"#,
    );
    let output_dir = dir.join("artifacts");

    let output = run_script(&script, &output_dir);
    assert_eq!(output.status.code(), Some(0));

    let result = read_result(&output_dir);
    assert_eq!(result["status"], "pass");
    assert_eq!(result["stop_reason"], "max_steps");
    assert_eq!(result["steps_executed"], 6);
    assert_eq!(result["config"]["native"], true);
    assert!(result.get("firmware_hash").is_none());
    assert_eq!(result["report"]["completed"], true);
    assert_eq!(result["report"]["entries"][20]["value"], 195);

    let uart = std::fs::read_to_string(output_dir.join("uart.log")).unwrap();
    assert!(uart.contains("Test 20: 0x000000C3\r\n"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_wide_switches_are_masked() {
    let dir = temp_dir("native-mask");
    let script = write_file(
        &dir,
        "script.yaml",
        r#"
schema_version: "1.0"
inputs:
  native: true
  switches: 0x1BEEF
limits:
  max_steps: 2
assertions:
  - uart_contains: "Test 20: 0x0000BEEF"
  - led_sequence: [48879]
"#,
    );
    let output_dir = dir.join("artifacts");

    let output = run_script(&script, &output_dir);
    assert_eq!(output.status.code(), Some(0));
    let result = read_result(&output_dir);
    assert_eq!(result["status"], "pass");
    assert_eq!(result["report"]["entries"][20]["value"], 0xBEEF);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_board_past_32_bits_exits_2() {
    let dir = temp_dir("high-board");
    write_file(
        &dir,
        "board.yaml",
        r#"
name: "high"
ram:
  base: 0x0
  size: "64KiB"
uart:
  base: 0x110000000
gpio:
  base: 0x10001000
"#,
    );
    let script = write_file(
        &dir,
        "script.yaml",
        r#"
schema_version: "1.0"
inputs:
  native: true
  board: "board.yaml"
limits:
  max_steps: 4
"#,
    );
    let output_dir = dir.join("artifacts");

    let output = run_script(&script, &output_dir);
    assert_eq!(output.status.code(), Some(2));
    let result = read_result(&output_dir);
    assert!(result["message"]
        .as_str()
        .unwrap()
        .contains("32-bit address space"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_failed_assertion_exits_1() {
    let dir = temp_dir("native-fail");
    let script = write_file(
        &dir,
        "script.yaml",
        r#"
schema_version: "1.0"
inputs:
  native: true
limits:
  max_steps: 4
assertions:
  - uart_contains: "Test 99:"
  - heartbeat_cycles: 1
"#,
    );
    let output_dir = dir.join("artifacts");

    let output = run_script(&script, &output_dir);
    assert_eq!(output.status.code(), Some(1));

    let result = read_result(&output_dir);
    assert_eq!(result["status"], "fail");
    assert_eq!(result["assertions"][0]["passed"], false);
    assert_eq!(result["assertions"][1]["passed"], true);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_unsupported_schema_exits_2() {
    let dir = temp_dir("bad-schema");
    let script = write_file(
        &dir,
        "script.yaml",
        r#"
schema_version: "2.0"
inputs:
  native: true
limits:
  max_steps: 4
"#,
    );
    let output_dir = dir.join("artifacts");

    let output = run_script(&script, &output_dir);
    assert_eq!(output.status.code(), Some(2));

    let result = read_result(&output_dir);
    assert_eq!(result["status"], "error");
    assert!(result["message"].as_str().unwrap().contains("schema_version"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_missing_firmware_exits_2() {
    let dir = temp_dir("no-firmware");
    let script = write_file(
        &dir,
        "script.yaml",
        r#"
schema_version: "1.0"
limits:
  max_steps: 4
"#,
    );
    let output = run_script(&script, &dir.join("artifacts"));
    assert_eq!(output.status.code(), Some(2));

    let absent = write_file(
        &dir,
        "absent.yaml",
        r#"
schema_version: "1.0"
inputs:
  firmware: "does-not-exist.elf"
limits:
  max_steps: 4
"#,
    );
    let output_dir = dir.join("absent-artifacts");
    let output = run_script(&absent, &output_dir);
    assert_eq!(output.status.code(), Some(2));
    let result = read_result(&output_dir);
    assert!(result["config"]["firmware"]
        .as_str()
        .unwrap()
        .ends_with("does-not-exist.elf"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_stuck_uart_native_exits_3() {
    let dir = temp_dir("stuck-uart");
    write_file(
        &dir,
        "board.yaml",
        r#"
name: "stuck"
ram:
  base: 0x0
  size: "64KiB"
uart:
  base: 0x10000000
  stuck: true
gpio:
  base: 0x10001000
"#,
    );
    let script = write_file(
        &dir,
        "script.yaml",
        r#"
schema_version: "1.0"
inputs:
  native: true
  board: "board.yaml"
limits:
  max_steps: 4
"#,
    );
    let output_dir = dir.join("artifacts");

    let output = run_script(&script, &output_dir);
    assert_eq!(output.status.code(), Some(3));
    let result = read_result(&output_dir);
    assert_eq!(result["status"], "error");
    assert!(result["config"]["board"]
        .as_str()
        .unwrap()
        .ends_with("board.yaml"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_uart_byte_limit_is_expected() {
    let dir = temp_dir("uart-limit");
    let script = write_file(
        &dir,
        "script.yaml",
        r#"
schema_version: "1.0"
inputs:
  native: true
limits:
  max_steps: 100
  max_uart_bytes: 1
assertions:
  - expected_stop_reason: max_uart_bytes
"#,
    );
    let output_dir = dir.join("artifacts");

    let output = run_script(&script, &output_dir);
    assert_eq!(output.status.code(), Some(0));
    let result = read_result(&output_dir);
    assert_eq!(result["stop_reason"], "max_uart_bytes");
    assert_eq!(result["steps_executed"], 2);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_unexpected_wall_time_stop_fails() {
    let dir = temp_dir("wall-time");
    let script = write_file(
        &dir,
        "script.yaml",
        r#"
schema_version: "1.0"
inputs:
  native: true
limits:
  max_steps: 100
  wall_time_ms: 0
"#,
    );
    let output_dir = dir.join("artifacts");

    let output = run_script(&script, &output_dir);
    assert_eq!(output.status.code(), Some(1));
    let result = read_result(&output_dir);
    assert_eq!(result["stop_reason"], "wall_time");
    assert_eq!(result["steps_executed"], 0);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_firmware_script_halts() {
    let dir = temp_dir("firmware");
    write_hello_elf(&dir);
    let script = write_file(
        &dir,
        "script.yaml",
        r#"
schema_version: "1.0"
inputs:
  firmware: "hello.elf"
limits:
  max_steps: 1000
assertions:
  - uart_contains: "Hi"
  - expected_stop_reason: halt
"#,
    );
    let output_dir = dir.join("artifacts");

    let output = run_script(&script, &output_dir);
    assert_eq!(output.status.code(), Some(0));

    let result = read_result(&output_dir);
    assert_eq!(result["status"], "pass");
    assert_eq!(result["stop_reason"], "halt");
    assert_eq!(result["firmware_hash"].as_str().unwrap().len(), 64);
    assert!(result.get("report").is_none());
    assert_eq!(
        std::fs::read_to_string(output_dir.join("uart.log")).unwrap(),
        "Hi"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_run_subcommand() {
    let dir = temp_dir("run");
    let elf = write_hello_elf(&dir);

    let output = Command::new(env!("CARGO_BIN_EXE_selftest"))
        .args(["run", "--firmware", elf.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Hi");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_native_subcommand_prints_report() {
    let output = Command::new(env!("CARGO_BIN_EXE_selftest"))
        .args(["native", "--switches", "0x00FF", "--beats", "2"])
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("RISC-V CPU Test Results:\r\n"));
    assert!(stdout.contains("Test 20: 0x000000FF\r\n"));
    assert!(stdout.ends_with("All tests completed!\r\n"));
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_selftest"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("RISC-V CPU self-test runner"));
}
