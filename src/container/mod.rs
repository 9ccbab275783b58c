//! # Container Module
//!
//! Capability traits through which the repair core reads channels and
//! writes repaired segments. The core never holds file state beyond a
//! single call into these traits.

pub mod memory;
pub mod segfile;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Range;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid container: {0}")]
    Format(String),
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelKey),
    #[error(
        "read of {length} samples at offset {offset} overruns channel {channel} of length {channel_len}"
    )]
    RangeOverrun {
        channel: ChannelKey,
        offset: u64,
        length: u64,
        channel_len: u64,
    },
    #[error("channel {channel} holds {expected} samples, got {found}")]
    TypeMismatch {
        channel: ChannelKey,
        expected: SampleType,
        found: SampleType,
    },
}

/// Element type of a channel. Samples are stored little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl SampleType {
    pub fn width(self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::I16 => 2,
            SampleType::I32 | SampleType::F32 => 4,
            SampleType::I64 | SampleType::F64 => 8,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleType::U8 => "u8",
            SampleType::I16 => "i16",
            SampleType::I32 => "i32",
            SampleType::I64 => "i64",
            SampleType::F32 => "f32",
            SampleType::F64 => "f64",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub group: String,
    pub channel: String,
}

impl ChannelKey {
    pub fn new(group: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/'{}'/'{}'", self.group, self.channel)
    }
}

/// Contiguous run of samples in their little-endian encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    dtype: SampleType,
    bytes: Vec<u8>,
}

impl SampleBuffer {
    pub fn from_bytes(dtype: SampleType, bytes: Vec<u8>) -> Result<Self, ContainerError> {
        if bytes.len() % dtype.width() != 0 {
            return Err(ContainerError::Format(format!(
                "{} bytes is not a whole number of {dtype} samples",
                bytes.len()
            )));
        }
        Ok(Self { dtype, bytes })
    }

    pub fn empty(dtype: SampleType) -> Self {
        Self {
            dtype,
            bytes: Vec::new(),
        }
    }

    pub fn from_f64(values: &[f64]) -> Self {
        Self {
            dtype: SampleType::F64,
            bytes: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    pub fn from_i32(values: &[i32]) -> Self {
        Self {
            dtype: SampleType::I32,
            bytes: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    pub fn dtype(&self) -> SampleType {
        self.dtype
    }

    pub fn len(&self) -> u64 {
        (self.bytes.len() / self.dtype.width()) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_samples(&self) -> Samples<'_> {
        Samples {
            dtype: self.dtype,
            bytes: &self.bytes,
        }
    }

    /// Samples `[offset, offset + length)` as a borrowed view.
    pub fn slice(&self, offset: u64, length: u64) -> Option<Samples<'_>> {
        Some(Samples {
            dtype: self.dtype,
            bytes: self.sample_bytes(offset, length)?,
        })
    }

    /// Moves the samples of `ranges` to the front of the buffer, in order, and
    /// drops everything else. `ranges` must be sorted and disjoint. Returns the
    /// first range that does not fit, leaving the buffer untouched.
    pub fn compact(&mut self, ranges: &[Range]) -> Result<(), Range> {
        let len = self.len();
        let overruns = |r: &&Range| r.offset.checked_add(r.length).is_none_or(|end| end > len);
        if let Some(bad) = ranges.iter().find(overruns) {
            return Err(*bad);
        }
        let width = self.dtype.width();
        let mut write = 0usize;
        for range in ranges {
            let start = range.offset as usize * width;
            let count = range.length as usize * width;
            self.bytes.copy_within(start..start + count, write);
            write += count;
        }
        self.bytes.truncate(write);
        Ok(())
    }

    /// Bytes of samples `[offset, offset + length)`.
    pub fn sample_bytes(&self, offset: u64, length: u64) -> Option<&[u8]> {
        let width = self.dtype.width() as u64;
        let start = offset.checked_mul(width)? as usize;
        let end = offset.checked_add(length)?.checked_mul(width)? as usize;
        self.bytes.get(start..end)
    }

    pub fn append(&mut self, other: Samples<'_>) -> Result<(), ContainerError> {
        if other.dtype != self.dtype {
            return Err(ContainerError::Format(format!(
                "cannot append {} samples to a {} buffer",
                other.dtype, self.dtype
            )));
        }
        self.bytes.extend_from_slice(other.bytes);
        Ok(())
    }

    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        if self.dtype != SampleType::F64 {
            return None;
        }
        Some(
            self.bytes
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        )
    }

    pub fn to_i32_vec(&self) -> Option<Vec<i32>> {
        if self.dtype != SampleType::I32 {
            return None;
        }
        Some(
            self.bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }
}

/// Borrowed run of samples, usually a slice of a [`SampleBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct Samples<'a> {
    dtype: SampleType,
    bytes: &'a [u8],
}

impl<'a> Samples<'a> {
    pub fn dtype(&self) -> SampleType {
        self.dtype
    }

    pub fn len(&self) -> u64 {
        (self.bytes.len() / self.dtype.width()) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn to_buffer(&self) -> SampleBuffer {
        SampleBuffer {
            dtype: self.dtype,
            bytes: self.bytes.to_vec(),
        }
    }
}

/// Read access to the channels of one container.
pub trait ChannelSource {
    /// Group names in container order.
    fn group_names(&self) -> Vec<String>;
    /// Channel names of `group` in container order.
    fn channel_names(&self, group: &str) -> Vec<String>;
    fn channel_len(&self, key: &ChannelKey) -> Result<u64, ContainerError>;
    /// Fails with [`ContainerError::RangeOverrun`] rather than clamping.
    fn read(&self, key: &ChannelKey, offset: u64, length: u64) -> Result<SampleBuffer, ContainerError>;
}

/// Append-only destination for repaired data.
pub trait SegmentSink {
    fn write_segment(&mut self, key: &ChannelKey, samples: Samples<'_>) -> Result<(), ContainerError>;
}

/// Every channel holding at least one sample, in group then channel order.
pub fn populated_channels(source: &dyn ChannelSource) -> Result<Vec<ChannelKey>, ContainerError> {
    let mut keys = Vec::new();
    for group in source.group_names() {
        for channel in source.channel_names(&group) {
            let key = ChannelKey::new(group.clone(), channel);
            if source.channel_len(&key)? > 0 {
                keys.push(key);
            }
        }
    }
    Ok(keys)
}

/// Length of the longest channel, 0 for a container without channels.
pub fn max_channel_len(source: &dyn ChannelSource) -> Result<u64, ContainerError> {
    let mut max_len = 0u64;
    for group in source.group_names() {
        for channel in source.channel_names(&group) {
            let key = ChannelKey::new(group.clone(), channel);
            max_len = max_len.max(source.channel_len(&key)?);
        }
    }
    Ok(max_len)
}

pub(crate) fn check_bounds(
    key: &ChannelKey,
    offset: u64,
    length: u64,
    channel_len: u64,
) -> Result<(), ContainerError> {
    match offset.checked_add(length) {
        Some(end) if end <= channel_len => Ok(()),
        _ => Err(ContainerError::RangeOverrun {
            channel: key.clone(),
            offset,
            length,
            channel_len,
        }),
    }
}
