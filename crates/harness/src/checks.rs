// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The integer workloads behind each check group.
//!
//! They are written to make the core execute the instruction mix the group is
//! named after (shift-and-add instead of `mul`, a real call stack for
//! factorial, a jump-table friendly `match`), not to be clever.

/// Check groups in execution order.
pub const CHECK_GROUPS: [&str; 10] = [
    "arithmetic",
    "multiplication",
    "factorial",
    "fibonacci",
    "bitwise",
    "array",
    "pointer",
    "conditional",
    "dispatch",
    "io-echo",
];

/// Results each group appends, parallel to `CHECK_GROUPS`.
const GROUP_RESULTS: [usize; 10] = [2, 2, 2, 2, 5, 2, 3, 1, 1, 1];

/// Name of the check group that produced result `index`.
pub fn check_group(index: usize) -> Option<&'static str> {
    let mut first = 0;
    for (name, count) in CHECK_GROUPS.iter().zip(GROUP_RESULTS) {
        if index < first + count {
            return Some(name);
        }
        first += count;
    }
    None
}

#[inline(never)]
pub fn add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

/// 32 rounds of shift-and-add.
#[inline(never)]
pub fn multiply(a: i32, b: i32) -> i32 {
    let mut result: i32 = 0;
    let mut a = a;
    let mut b = b;
    for _ in 0..32 {
        if b & 1 != 0 {
            result = result.wrapping_add(a);
        }
        a = a.wrapping_shl(1);
        b >>= 1;
    }
    result
}

#[inline(never)]
pub fn factorial(n: i32) -> i32 {
    if n <= 1 {
        return 1;
    }
    n.wrapping_mul(factorial(n - 1))
}

#[inline(never)]
pub fn fibonacci(n: i32) -> i32 {
    if n <= 1 {
        return n;
    }
    let (mut a, mut b) = (0i32, 1i32);
    for _ in 2..=n {
        let next = a.wrapping_add(b);
        a = b;
        b = next;
    }
    b
}

/// `arr[i] = i * i` for `i` in `0..10`.
pub fn squares() -> [i32; 10] {
    let mut arr = [0i32; 10];
    for (i, slot) in arr.iter_mut().enumerate() {
        let i = i as i32;
        *slot = i * i;
    }
    arr
}

/// Read through a cursor that starts at `arr[0]`, moves by one, then by four.
pub fn pointer_walk(arr: &[i32]) -> [i32; 3] {
    let mut cursor = arr;
    let first = cursor[0];
    cursor = &cursor[1..];
    let second = cursor[0];
    cursor = &cursor[4..];
    [first, second, cursor[0]]
}

/// Add even indices, subtract odd ones, over `0..n`.
pub fn alternating_sum(n: i32) -> i32 {
    let mut result = 0i32;
    for i in 0..n {
        if i % 2 == 0 {
            result += i;
        } else {
            result -= i;
        }
    }
    result
}

/// Accumulate a per-case weight over `0..n`; every case past 3 weighs 16.
pub fn dispatch_sum(n: i32) -> i32 {
    let mut result = 0i32;
    for i in 0..n {
        result += match i {
            0 => 1,
            1 => 2,
            2 => 4,
            3 => 8,
            _ => 16,
        };
    }
    result
}
