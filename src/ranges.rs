//! # Range Calculator
//!
//! Splits `[0, total_len)` into periods of `chunk_size + recurrence_size`
//! samples. Both the valid and the duplicated spans come from the same
//! [`periods`] walk so they can never disagree on a boundary.

use crate::model::Range;

/// One period of the corruption pattern, clipped to the channel length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub index: u64,
    pub start: u64,
    pub valid: Range,
    /// Empty when the channel ends inside the valid part.
    pub recurrence: Range,
}

#[derive(Debug, Clone)]
pub struct PeriodIter {
    chunk_size: u64,
    recurrence_size: u64,
    total_len: u64,
    start: u64,
    index: u64,
}

impl Iterator for PeriodIter {
    type Item = Period;

    fn next(&mut self) -> Option<Period> {
        if self.chunk_size == 0 || self.start >= self.total_len {
            return None;
        }

        let start = self.start;
        let valid_end = start.saturating_add(self.chunk_size).min(self.total_len);
        let recurrence_end = valid_end
            .saturating_add(self.recurrence_size)
            .min(self.total_len);

        let period = Period {
            index: self.index,
            start,
            valid: Range::new(start, valid_end - start),
            recurrence: Range::new(valid_end, recurrence_end - valid_end),
        };

        self.start = start.saturating_add(self.chunk_size + self.recurrence_size);
        self.index += 1;
        Some(period)
    }
}

pub fn periods(chunk_size: u64, recurrence_size: u64, total_len: u64) -> PeriodIter {
    PeriodIter {
        chunk_size,
        recurrence_size,
        total_len,
        start: 0,
        index: 0,
    }
}

/// Spans of good data, in offset order.
pub fn valid_ranges(chunk_size: u64, recurrence_size: u64, total_len: u64) -> Vec<Range> {
    periods(chunk_size, recurrence_size, total_len)
        .map(|p| p.valid)
        .collect()
}

/// Spans of duplicated data, in offset order. Zero-length spans are skipped.
pub fn invalid_ranges(chunk_size: u64, recurrence_size: u64, total_len: u64) -> Vec<Range> {
    periods(chunk_size, recurrence_size, total_len)
        .map(|p| p.recurrence)
        .filter(|r| !r.is_empty())
        .collect()
}

/// Number of samples left once every duplicated span is dropped.
pub fn repaired_len(chunk_size: u64, recurrence_size: u64, total_len: u64) -> u64 {
    periods(chunk_size, recurrence_size, total_len)
        .map(|p| p.valid.length)
        .sum()
}
