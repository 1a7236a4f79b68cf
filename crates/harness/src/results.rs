// RV Self-Test - RISC-V CPU Diagnostic Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// Number of result slots.
pub const RESULT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("result buffer full ({} slots)", RESULT_CAPACITY)]
pub struct ResultsFull;

/// Append-only results; the slot index is the check sequence number.
#[derive(Debug, Clone)]
pub struct ResultBuffer {
    slots: [u32; RESULT_CAPACITY],
    len: usize,
}

impl Default for ResultBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultBuffer {
    pub const fn new() -> Self {
        Self {
            slots: [0; RESULT_CAPACITY],
            len: 0,
        }
    }

    pub fn try_push(&mut self, value: u32) -> Result<usize, ResultsFull> {
        let index = self.len;
        let slot = self.slots.get_mut(index).ok_or(ResultsFull)?;
        *slot = value;
        self.len += 1;
        Ok(index)
    }

    /// Append a result. Running out of slots is a bug in the check list.
    pub fn push(&mut self, value: u32) -> usize {
        match self.try_push(value) {
            Ok(index) => index,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.as_slice().get(index).copied()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.slots[..self.len]
    }

    pub fn iter(&self) -> core::iter::Copied<core::slice::Iter<'_, u32>> {
        self.as_slice().iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut buf = ResultBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.push(8), 0);
        assert_eq!(buf.push(50), 1);
        assert_eq!(buf.iter().collect::<Vec<_>>(), vec![8, 50]);
        assert_eq!(buf.get(1), Some(50));
        assert_eq!(buf.get(2), None);
    }

    #[test]
    fn refuses_past_capacity() {
        let mut buf = ResultBuffer::new();
        for i in 0..RESULT_CAPACITY as u32 {
            buf.try_push(i).unwrap();
        }
        assert_eq!(buf.len(), RESULT_CAPACITY);
        assert_eq!(buf.try_push(99), Err(ResultsFull));
        assert_eq!(buf.len(), RESULT_CAPACITY);
    }
}
