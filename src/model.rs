//! # Corruption Model
//!
//! Types describing the periodic recurrence pattern and the spans it
//! produces inside a channel.

use serde::Serialize;

/// Raw operator input. Values are signed so that nonsensical input can be
/// reported by the parameter checks instead of being rejected by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairParams {
    pub chunk_size: i64,
    pub recurrence_size: i64,
    pub recurrence_distance: i64,
}

/// Validated corruption model: `chunk_size` good samples followed by
/// `recurrence_size` samples copied from `recurrence_distance` samples back,
/// repeating until the end of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorruptionModel {
    chunk_size: u64,
    recurrence_size: u64,
    recurrence_distance: u64,
}

impl CorruptionModel {
    /// Only the parameter checks construct models; see [`crate::checks::check_params`].
    pub(crate) fn new(chunk_size: u64, recurrence_size: u64, recurrence_distance: u64) -> Self {
        debug_assert!(chunk_size > 0);
        debug_assert!(recurrence_size <= chunk_size);
        Self {
            chunk_size,
            recurrence_size,
            recurrence_distance,
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn recurrence_size(&self) -> u64 {
        self.recurrence_size
    }

    pub fn recurrence_distance(&self) -> u64 {
        self.recurrence_distance
    }

    pub fn period(&self) -> u64 {
        self.chunk_size + self.recurrence_size
    }
}

/// Half-open span `[offset, offset + length)` of sample indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub offset: u64,
    pub length: u64,
}

impl Range {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}
