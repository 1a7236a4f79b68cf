// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Reading the harness report back out of captured UART bytes.

use selftest_harness::mmio::HEARTBEAT_PATTERNS;
use selftest_harness::state::{REPORT_DONE, REPORT_RULE, REPORT_TITLE};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    #[error("report header '{}' not found", REPORT_TITLE)]
    MissingHeader,
    #[error("malformed report line {line_no}: {line:?}")]
    MalformedLine { line_no: usize, line: String },
    #[error("expected result index {expected:02}, found {found:02}")]
    OutOfOrder { expected: usize, found: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub index: usize,
    pub value: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub entries: Vec<ReportEntry>,
    /// The closing banner was seen.
    pub completed: bool,
}

impl Report {
    pub fn values(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.value).collect()
    }
}

/// Parse the report from a UART transcript.
///
/// Text before the header is skipped. A trailing line without its CRLF is
/// still in flight and is ignored, so a transcript cut off mid-report parses
/// as an incomplete report rather than an error.
pub fn parse_report(text: &str) -> Result<Report, TranscriptError> {
    let mut lines: Vec<&str> = text.split("\r\n").collect();
    // Last piece is either empty or unterminated.
    lines.pop();

    let start = lines
        .iter()
        .position(|l| *l == REPORT_TITLE)
        .ok_or(TranscriptError::MissingHeader)?;

    let mut report = Report::default();
    let mut body = lines.iter().enumerate().skip(start + 1);

    match body.next() {
        Some((_, l)) if *l == REPORT_RULE => {}
        Some((n, l)) => {
            return Err(TranscriptError::MalformedLine {
                line_no: n + 1,
                line: l.to_string(),
            })
        }
        None => return Ok(report),
    }

    let mut closing = false;
    for (n, line) in body {
        if closing {
            if *line == REPORT_DONE {
                report.completed = true;
                break;
            }
            return Err(TranscriptError::MalformedLine {
                line_no: n + 1,
                line: line.to_string(),
            });
        }
        if line.is_empty() {
            closing = true;
            continue;
        }

        let entry = parse_entry(line).ok_or_else(|| TranscriptError::MalformedLine {
            line_no: n + 1,
            line: line.to_string(),
        })?;
        let expected = report.entries.len();
        if entry.index != expected {
            return Err(TranscriptError::OutOfOrder {
                expected,
                found: entry.index,
            });
        }
        report.entries.push(entry);
    }

    Ok(report)
}

/// `Test NN: 0xHHHHHHHH`
fn parse_entry(line: &str) -> Option<ReportEntry> {
    let rest = line.strip_prefix("Test ")?;
    let (index, value) = rest.split_once(": 0x")?;
    if index.len() != 2 || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if value.len() != 8
        || !value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
    {
        return None;
    }
    Some(ReportEntry {
        index: index.parse().ok()?,
        value: u32::from_str_radix(value, 16).ok()?,
    })
}

/// Count complete high/low heartbeat cycles at the end of an LED history.
///
/// Walks back over the alternating tail of heartbeat patterns. The tail must
/// start on the high pattern, so a stray low pattern right after the switch
/// echo does not count.
pub fn heartbeat_cycles(history: &[u32]) -> usize {
    let [high, low] = HEARTBEAT_PATTERNS;
    let is_beat = |v: u32| v == high || v == low;

    let mut start = history.len();
    while start > 0 {
        let v = history[start - 1];
        if !is_beat(v) {
            break;
        }
        if start < history.len() && history[start] == v {
            break;
        }
        start -= 1;
    }
    while start < history.len() && history[start] != high {
        start += 1;
    }
    (history.len() - start) / 2
}
