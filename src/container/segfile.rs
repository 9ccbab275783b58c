//! # Segment Container
//!
//! On-disk container made of appended segments. Each segment is
//!
//! ```text
//! b"RSEG" | header_len: u32 LE | JSON header | sample data
//! ```
//!
//! where the header lists `(group, channel, dtype, count)` entries and the
//! data holds each entry's samples back to back, little-endian. Opening a
//! container only walks the headers; samples are fetched with positioned
//! reads on demand.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::container::{
    ChannelKey, ChannelSource, ContainerError, SampleBuffer, SampleType, Samples, SegmentSink,
    check_bounds,
};

pub const SEGMENT_MAGIC: &[u8; 4] = b"RSEG";
pub const CONTAINER_EXTENSION: &str = "seg";
const MAX_HEADER_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct SegmentHeader {
    channels: Vec<SegmentEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SegmentEntry {
    group: String,
    channel: String,
    dtype: SampleType,
    count: u64,
}

#[derive(Debug, Clone, Copy)]
struct Piece {
    file_offset: u64,
    first_sample: u64,
    count: u64,
}

#[derive(Debug)]
struct ChannelIndex {
    name: String,
    dtype: SampleType,
    len: u64,
    pieces: Vec<Piece>,
}

#[derive(Debug)]
struct GroupIndex {
    name: String,
    channels: Vec<ChannelIndex>,
}

pub struct SegmentFileReader {
    path: PathBuf,
    file: File,
    groups: Vec<GroupIndex>,
    segments: u64,
    #[cfg(not(unix))]
    lock: std::sync::Mutex<()>,
}

impl std::fmt::Debug for SegmentFileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentFileReader")
            .field("path", &self.path)
            .field("groups", &self.groups.len())
            .field("segments", &self.segments)
            .finish()
    }
}

impl SegmentFileReader {
    pub fn open(path: &Path) -> Result<Self, ContainerError> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = Self {
            path: path.to_path_buf(),
            file,
            groups: Vec::new(),
            segments: 0,
            #[cfg(not(unix))]
            lock: std::sync::Mutex::new(()),
        };

        let mut pos = 0u64;
        while pos < file_len {
            if file_len - pos < 8 {
                return Err(ContainerError::Format(format!(
                    "truncated segment prefix at byte {pos}"
                )));
            }
            let mut prefix = [0u8; 8];
            reader.read_exact_at(&mut prefix, pos)?;
            if &prefix[0..4] != SEGMENT_MAGIC {
                return Err(ContainerError::Format(format!(
                    "missing segment magic at byte {pos}"
                )));
            }
            let header_len = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);
            if header_len > MAX_HEADER_LEN || u64::from(header_len) > file_len - pos - 8 {
                return Err(ContainerError::Format(format!(
                    "segment header at byte {pos} is {header_len} bytes"
                )));
            }

            let mut header_bytes = vec![0u8; header_len as usize];
            reader.read_exact_at(&mut header_bytes, pos + 8)?;
            let header: SegmentHeader = serde_json::from_slice(&header_bytes)
                .map_err(|e| ContainerError::Format(format!("segment header at byte {pos}: {e}")))?;

            let mut data_pos = pos + 8 + u64::from(header_len);
            for entry in header.channels {
                let bytes = entry
                    .count
                    .checked_mul(entry.dtype.width() as u64)
                    .ok_or_else(|| ContainerError::Format("segment sample count overflows".into()))?;
                reader.register(&entry, data_pos)?;
                data_pos = data_pos.saturating_add(bytes);
            }
            if data_pos > file_len {
                return Err(ContainerError::Format(format!(
                    "segment at byte {pos} is truncated"
                )));
            }
            reader.segments += 1;
            pos = data_pos;
        }

        debug!(
            "opened {} ({} segments, {} groups)",
            path.display(),
            reader.segments,
            reader.groups.len()
        );
        Ok(reader)
    }

    pub fn segment_count(&self) -> u64 {
        self.segments
    }

    pub fn channel_type(&self, key: &ChannelKey) -> Result<SampleType, ContainerError> {
        Ok(self.lookup(key)?.dtype)
    }

    fn register(&mut self, entry: &SegmentEntry, file_offset: u64) -> Result<(), ContainerError> {
        let group_idx = match self.groups.iter().position(|g| g.name == entry.group) {
            Some(idx) => idx,
            None => {
                self.groups.push(GroupIndex {
                    name: entry.group.clone(),
                    channels: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        let channels = &mut self.groups[group_idx].channels;
        let channel = match channels.iter().position(|c| c.name == entry.channel) {
            Some(idx) => &mut channels[idx],
            None => {
                channels.push(ChannelIndex {
                    name: entry.channel.clone(),
                    dtype: entry.dtype,
                    len: 0,
                    pieces: Vec::new(),
                });
                let last = channels.len() - 1;
                &mut channels[last]
            }
        };

        if channel.dtype != entry.dtype {
            return Err(ContainerError::TypeMismatch {
                channel: ChannelKey::new(entry.group.clone(), entry.channel.clone()),
                expected: channel.dtype,
                found: entry.dtype,
            });
        }
        if entry.count > 0 {
            channel.pieces.push(Piece {
                file_offset,
                first_sample: channel.len,
                count: entry.count,
            });
            channel.len += entry.count;
        }
        Ok(())
    }

    fn lookup(&self, key: &ChannelKey) -> Result<&ChannelIndex, ContainerError> {
        self.groups
            .iter()
            .find(|g| g.name == key.group)
            .and_then(|g| g.channels.iter().find(|c| c.name == key.channel))
            .ok_or_else(|| ContainerError::UnknownChannel(key.clone()))
    }

    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<(), ContainerError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_exact_at(buf, offset)?;
            Ok(())
        }
        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let _guard = self
                .lock
                .lock()
                .map_err(|_| ContainerError::Format("reader lock poisoned".into()))?;
            let mut f = &self.file;
            f.seek(SeekFrom::Start(offset))?;
            f.read_exact(buf)?;
            Ok(())
        }
    }
}

impl ChannelSource for SegmentFileReader {
    fn group_names(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.name.clone()).collect()
    }

    fn channel_names(&self, group: &str) -> Vec<String> {
        self.groups
            .iter()
            .find(|g| g.name == group)
            .map(|g| g.channels.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    fn channel_len(&self, key: &ChannelKey) -> Result<u64, ContainerError> {
        Ok(self.lookup(key)?.len)
    }

    fn read(&self, key: &ChannelKey, offset: u64, length: u64) -> Result<SampleBuffer, ContainerError> {
        let channel = self.lookup(key)?;
        check_bounds(key, offset, length, channel.len)?;

        let width = channel.dtype.width() as u64;
        let mut bytes = vec![0u8; (length * width) as usize];
        let end = offset + length;
        let first = channel
            .pieces
            .partition_point(|p| p.first_sample + p.count <= offset);

        for piece in &channel.pieces[first..] {
            if piece.first_sample >= end {
                break;
            }
            let from = offset.max(piece.first_sample);
            let to = end.min(piece.first_sample + piece.count);
            let file_pos = piece.file_offset + (from - piece.first_sample) * width;
            let dst = &mut bytes[((from - offset) * width) as usize..((to - offset) * width) as usize];
            self.read_exact_at(dst, file_pos)?;
        }

        SampleBuffer::from_bytes(channel.dtype, bytes)
    }
}

/// Appends one single-channel segment per [`SegmentSink::write_segment`] call.
pub struct SegmentFileWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    segments: u64,
}

impl SegmentFileWriter {
    pub fn create(path: &Path) -> Result<Self, ContainerError> {
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            segments: 0,
        })
    }

    /// Flushes and syncs the container; returns the number of segments written.
    pub fn finish(mut self) -> Result<u64, ContainerError> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        Ok(self.segments)
    }
}

impl SegmentSink for SegmentFileWriter {
    fn write_segment(&mut self, key: &ChannelKey, samples: Samples<'_>) -> Result<(), ContainerError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ContainerError::Format("writer already finished".into()))?;

        let header = SegmentHeader {
            channels: vec![SegmentEntry {
                group: key.group.clone(),
                channel: key.channel.clone(),
                dtype: samples.dtype(),
                count: samples.len(),
            }],
        };
        let header_bytes = serde_json::to_vec(&header)
            .map_err(|e| ContainerError::Format(format!("segment header: {e}")))?;
        let header_len = u32::try_from(header_bytes.len())
            .map_err(|_| ContainerError::Format("segment header too large".into()))?;

        writer.write_all(SEGMENT_MAGIC)?;
        writer.write_all(&header_len.to_le_bytes())?;
        writer.write_all(&header_bytes)?;
        writer.write_all(samples.as_bytes())?;
        self.segments += 1;
        Ok(())
    }
}

impl Drop for SegmentFileWriter {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = writer.flush() {
                warn!("failed to flush {}: {err}", self.path.display());
            }
        }
    }
}
