// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod outputs;

use clap::{Parser, Subcommand};
use selftest_config::{BoardDescriptor, StopReason, TestAssertion, TestLimits, TestScript};
use selftest_core::bus::SystemBus;
use selftest_core::cpu::RiscV;
use selftest_core::metrics::PerformanceMetrics;
use selftest_core::native::{run_native, run_native_until};
use selftest_core::transcript::{heartbeat_cycles, parse_report};
use selftest_core::{Cpu, Machine};
use selftest_harness::checks::check_group;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use outputs::{AssertionResult, Status, TestConfig, TestResult};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

// Guard against accidentally huge runs from CI misconfiguration.
const MAX_ALLOWED_STEPS: u64 = 500_000_000;

fn parse_u32(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value '{}': {}", s, e))
    } else {
        u32::from_str(trimmed).map_err(|e| format!("Invalid value '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "RISC-V CPU self-test runner", long_about = None)]
struct Cli {
    /// Enable instruction-level execution tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a self-test firmware image on the simulated board.
    Run(RunArgs),

    /// Run the harness built for the host against the simulated devices.
    Native(NativeArgs),

    /// Deterministic, CI-friendly runner mode driven by a test script (YAML).
    Test(TestArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the firmware ELF file
    #[arg(short, long)]
    firmware: PathBuf,

    /// Path to the board descriptor (YAML)
    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Switch bank value (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_u32)]
    switches: Option<u32>,

    /// Maximum number of instructions to execute
    #[arg(long, default_value = "5000000")]
    max_steps: u64,
}

#[derive(Parser, Debug)]
struct NativeArgs {
    /// Path to the board descriptor (YAML)
    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Switch bank value (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_u32)]
    switches: Option<u32>,

    /// Heartbeat patterns to write after the report
    #[arg(long, default_value = "4")]
    beats: u64,
}

#[derive(Parser, Debug)]
struct TestArgs {
    /// Path to the test script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Directory to write test artifacts (result.json, uart.log)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Disable UART stdout echo (still captured for assertions/artifacts)
    #[arg(long)]
    no_uart_stdout: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Run(args) => run_firmware(args),
        Commands::Native(args) => run_native_cmd(args),
        Commands::Test(args) => run_test(args),
    }
}

fn build_bus(board_path: Option<&Path>, switches: Option<u32>) -> anyhow::Result<SystemBus> {
    let mut bus = if let Some(path) = board_path {
        info!("Loading board descriptor: {:?}", path);
        let board = BoardDescriptor::from_file(path)?;
        SystemBus::from_config(&board)?
    } else {
        info!("Using default board");
        SystemBus::new()
    };
    if let Some(switches) = switches {
        bus.set_switches(switches);
    }
    Ok(bus)
}

fn new_machine(bus: SystemBus, metrics: &Arc<PerformanceMetrics>) -> Machine<RiscV> {
    let mut machine = Machine::new(RiscV::new(), bus);
    machine.observers.push(metrics.clone());
    machine
}

fn summarize_transcript(uart_tx: &Arc<Mutex<Vec<u8>>>, led_history: &[u32]) {
    let bytes = uart_tx.lock().map(|g| g.clone()).unwrap_or_default();
    let text = String::from_utf8_lossy(&bytes);
    match parse_report(&text) {
        Ok(report) => {
            for entry in &report.entries {
                debug!(
                    "Test {:02} [{}]: {:#010x}",
                    entry.index,
                    check_group(entry.index).unwrap_or("unknown"),
                    entry.value
                );
            }
            info!(
                "Report: {} results, completed: {}",
                report.entries.len(),
                report.completed
            );
        }
        Err(e) => warn!("No usable report in UART output: {}", e),
    }
    info!(
        "LED writes: {}, heartbeat cycles: {}",
        led_history.len(),
        heartbeat_cycles(led_history)
    );
}

fn run_firmware(args: RunArgs) -> ExitCode {
    let mut bus = match build_bus(args.board.as_deref(), args.switches) {
        Ok(bus) => bus,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let uart_tx = Arc::new(Mutex::new(Vec::new()));
    bus.attach_uart_tx_sink(uart_tx.clone(), true);

    info!("Loading firmware: {:?}", args.firmware);
    let program = match selftest_loader::load_elf(&args.firmware) {
        Ok(program) => program,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let metrics = Arc::new(PerformanceMetrics::new());
    let mut machine = new_machine(bus, &metrics);
    if let Err(e) = machine.load_firmware(&program) {
        error!("Failed to load firmware into memory: {}", e);
        return ExitCode::from(EXIT_RUNTIME_ERROR);
    }

    info!(
        "Starting simulation at PC={:#x}, SP={:#x}",
        machine.cpu.get_pc(),
        machine.cpu.get_register(2)
    );
    let summary = machine.run(args.max_steps);
    info!(
        "Stopped after {} steps: {:?} ({:.0} IPS)",
        summary.steps,
        summary.stop_reason,
        metrics.get_ips()
    );
    summarize_transcript(&uart_tx, &machine.bus.led_history());

    match summary.stop_reason {
        StopReason::MemoryViolation | StopReason::DecodeError => {
            if let Some(e) = &summary.error {
                error!("Simulation error: {}", e);
            }
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
        _ => ExitCode::from(EXIT_PASS),
    }
}

fn run_native_cmd(args: NativeArgs) -> ExitCode {
    let mut bus = match build_bus(args.board.as_deref(), args.switches) {
        Ok(bus) => bus,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let uart_tx = Arc::new(Mutex::new(Vec::new()));
    bus.attach_uart_tx_sink(uart_tx.clone(), true);

    match run_native(&mut bus, args.beats) {
        Ok(run) => {
            info!(
                "Native run: {} transitions, {} results, final state {:?}",
                run.transitions,
                run.results.len(),
                run.state
            );
            summarize_transcript(&uart_tx, &bus.led_history());
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn resolve_script_path(script_path: &Path, value: &str) -> PathBuf {
    let p = PathBuf::from(value);
    if p.is_absolute() {
        return p;
    }
    script_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(p)
}

/// Outcome of the execution phase of `selftest test`.
struct Execution {
    stop_reason: StopReason,
    steps: u64,
    runtime_error: Option<String>,
}

fn limit_hit(limits: &TestLimits, start: Instant, uart_tx: &Arc<Mutex<Vec<u8>>>) -> Option<StopReason> {
    if let Some(wall_time_ms) = limits.wall_time_ms {
        if start.elapsed().as_millis() >= wall_time_ms as u128 {
            return Some(StopReason::WallTime);
        }
    }
    if let Some(limit) = limits.max_uart_bytes {
        let current_len = uart_tx.lock().map(|g| g.len() as u64).unwrap_or(0);
        if current_len >= limit {
            return Some(StopReason::MaxUartBytes);
        }
    }
    None
}

fn execute_firmware(
    machine: &mut Machine<RiscV>,
    limits: &TestLimits,
    uart_tx: &Arc<Mutex<Vec<u8>>>,
) -> Execution {
    let start = Instant::now();
    let mut execution = Execution {
        stop_reason: StopReason::MaxSteps,
        steps: 0,
        runtime_error: None,
    };

    for step in 0..limits.max_steps {
        if let Some(reason) = limit_hit(limits, start, uart_tx) {
            execution.stop_reason = reason;
            break;
        }
        if let Err(e) = machine.step() {
            execution.stop_reason = e.stop_reason();
            if execution.stop_reason != StopReason::Halt {
                error!("Simulation error at step {}: {}", step, e);
                execution.runtime_error = Some(e.to_string());
            } else {
                info!("{}", e);
            }
            break;
        }
        execution.steps = step + 1;
    }
    execution
}

fn execute_native(bus: &mut SystemBus, limits: &TestLimits, uart_tx: &Arc<Mutex<Vec<u8>>>) -> Execution {
    let start = Instant::now();
    match run_native_until(bus, limits.max_steps, |_| limit_hit(limits, start, uart_tx)) {
        Ok(run) => Execution {
            stop_reason: run.stop_reason,
            steps: run.transitions,
            runtime_error: None,
        },
        Err(e) => {
            error!("{}", e);
            Execution {
                stop_reason: e.stop_reason(),
                steps: 0,
                runtime_error: Some(e.to_string()),
            }
        }
    }
}

fn evaluate(
    assertion: &TestAssertion,
    uart_text: &str,
    led_history: &[u32],
    stop_reason: StopReason,
) -> bool {
    match assertion {
        TestAssertion::UartContains(a) => uart_text.contains(&a.uart_contains),
        TestAssertion::UartRegex(a) => simple_regex_is_match(&a.uart_regex, uart_text),
        TestAssertion::ExpectedStopReason(a) => a.expected_stop_reason == stop_reason,
        TestAssertion::LedSequence(a) => led_history.starts_with(&a.led_sequence),
        TestAssertion::Results(a) => parse_report(uart_text)
            .map(|report| report.values() == a.results)
            .unwrap_or(false),
        TestAssertion::HeartbeatCycles(a) => heartbeat_cycles(led_history) >= a.heartbeat_cycles,
    }
}

fn config_error(args: &TestArgs, config: TestConfig, limits: Option<TestLimits>, msg: String) -> ExitCode {
    error!("{}", msg);
    let result = TestResult::config_error(config, limits, msg);
    outputs::write_outputs(args.output_dir.as_deref(), &result, &[]);
    ExitCode::from(EXIT_CONFIG_ERROR)
}

fn run_test(args: TestArgs) -> ExitCode {
    let mut config = TestConfig {
        script: args.script.clone(),
        ..TestConfig::default()
    };

    let script = match TestScript::from_file(&args.script) {
        Ok(s) => s,
        Err(e) => return config_error(&args, config, None, format!("{:#}", e)),
    };
    let limits = script.limits.clone();
    config.native = script.inputs.native;

    if limits.max_steps > MAX_ALLOWED_STEPS {
        let msg = format!(
            "max_steps {} exceeds MAX_ALLOWED_STEPS {}",
            limits.max_steps, MAX_ALLOWED_STEPS
        );
        return config_error(&args, config, Some(limits), msg);
    }

    config.board = script
        .inputs
        .board
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| resolve_script_path(&args.script, s));

    let mut bus = match build_bus(config.board.as_deref(), script.inputs.switches) {
        Ok(bus) => bus,
        Err(e) => return config_error(&args, config, Some(limits), format!("{:#}", e)),
    };
    let uart_tx = Arc::new(Mutex::new(Vec::new()));
    bus.attach_uart_tx_sink(uart_tx.clone(), !args.no_uart_stdout);

    let (execution, led_history, firmware_hash) = if script.inputs.native {
        info!("Running harness natively");
        let execution = execute_native(&mut bus, &limits, &uart_tx);
        (execution, bus.led_history(), None)
    } else {
        let firmware_path = match script
            .inputs
            .firmware
            .as_deref()
            .map(|s| resolve_script_path(&args.script, s))
        {
            Some(p) => p,
            None => {
                let msg = "Missing firmware path (set inputs.firmware in script)".to_string();
                return config_error(&args, config, Some(limits), msg);
            }
        };
        config.firmware = Some(firmware_path.clone());

        let firmware_bytes = match std::fs::read(&firmware_path) {
            Ok(b) => b,
            Err(e) => {
                let msg = format!("Failed to read firmware {:?}: {}", firmware_path, e);
                return config_error(&args, config, Some(limits), msg);
            }
        };
        let program = match selftest_loader::load_elf_bytes(&firmware_bytes) {
            Ok(program) => program,
            Err(e) => return config_error(&args, config, Some(limits), format!("{:#}", e)),
        };

        let metrics = Arc::new(PerformanceMetrics::new());
        let mut machine = new_machine(bus, &metrics);
        let execution = match machine.load_firmware(&program) {
            Ok(()) => execute_firmware(&mut machine, &limits, &uart_tx),
            Err(e) => {
                error!("Failed to load firmware into memory: {}", e);
                Execution {
                    stop_reason: e.stop_reason(),
                    steps: 0,
                    runtime_error: Some(e.to_string()),
                }
            }
        };
        info!(
            "Executed {} instructions ({:.0} IPS)",
            metrics.get_instructions(),
            metrics.get_ips()
        );
        (
            execution,
            machine.bus.led_history(),
            Some(outputs::firmware_hash(&firmware_bytes)),
        )
    };

    let uart_bytes = uart_tx.lock().map(|g| g.clone()).unwrap_or_default();
    let uart_text = String::from_utf8_lossy(&uart_bytes).to_string();

    let mut all_passed = true;
    let mut expected_stop_reason_matched = false;
    let mut assertion_results = Vec::new();
    for assertion in &script.assertions {
        let passed = evaluate(assertion, &uart_text, &led_history, execution.stop_reason);
        if matches!(assertion, TestAssertion::ExpectedStopReason(_)) && passed {
            expected_stop_reason_matched = true;
        }
        if !passed {
            all_passed = false;
            error!(
                "Assertion failed: {:?} (captured len={})",
                assertion,
                uart_text.len()
            );
        }
        assertion_results.push(AssertionResult {
            assertion: assertion.clone(),
            passed,
        });
    }

    let stop_requires_assertion = matches!(
        execution.stop_reason,
        StopReason::WallTime | StopReason::MaxUartBytes
    );
    let failed = !all_passed || (stop_requires_assertion && !expected_stop_reason_matched);
    let errored = execution.runtime_error.is_some() && !expected_stop_reason_matched;
    let status = if failed {
        Status::Fail
    } else if errored {
        Status::Error
    } else {
        Status::Pass
    };
    info!(
        "Test {:?}: stop reason {:?} after {} steps",
        status, execution.stop_reason, execution.steps
    );

    let result = TestResult {
        result_schema_version: outputs::RESULT_SCHEMA_VERSION,
        status,
        stop_reason: Some(execution.stop_reason),
        steps_executed: execution.steps,
        limits: Some(limits),
        message: execution.runtime_error,
        assertions: assertion_results,
        firmware_hash,
        led_history,
        report: parse_report(&uart_text).ok(),
        config,
    };
    outputs::write_outputs(args.output_dir.as_deref(), &result, &uart_bytes);

    match status {
        Status::Fail => ExitCode::from(EXIT_ASSERT_FAIL),
        Status::Error => ExitCode::from(EXIT_RUNTIME_ERROR),
        Status::Pass => ExitCode::from(EXIT_PASS),
    }
}

/// Minimal regex: `.`, `*`, `^` and `$`.
fn simple_regex_is_match(pattern: &str, text: &str) -> bool {
    fn char_eq(pat: char, ch: char) -> bool {
        pat == '.' || pat == ch
    }

    fn match_here(pat: &[char], text: &[char]) -> bool {
        if pat.is_empty() {
            return true;
        }
        if pat.len() >= 2 && pat[1] == '*' {
            return match_star(pat[0], &pat[2..], text);
        }
        if pat[0] == '$' && pat.len() == 1 {
            return text.is_empty();
        }
        if !text.is_empty() && char_eq(pat[0], text[0]) {
            return match_here(&pat[1..], &text[1..]);
        }
        false
    }

    fn match_star(ch: char, pat: &[char], text: &[char]) -> bool {
        let mut i = 0;
        loop {
            if match_here(pat, &text[i..]) {
                return true;
            }
            if i >= text.len() || !char_eq(ch, text[i]) {
                return false;
            }
            i += 1;
        }
    }

    let pat_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    if pat_chars.first() == Some(&'^') {
        return match_here(&pat_chars[1..], &text_chars);
    }

    (0..=text_chars.len()).any(|start| match_here(&pat_chars, &text_chars[start..]))
}
