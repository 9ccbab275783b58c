//! # Reconstruction Engine
//!
//! Copies the valid ranges of each channel into the output sink while never
//! holding more than the memory budget of one channel at a time. Valid ranges
//! are compacted inside the read buffer and written straight from it. The valid
//! range list is bisected until every fragment's source span fits the
//! budget; ranges are never split, so a range larger than the budget is read
//! on its own.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::container::{
    ChannelKey, ChannelSource, ContainerError, SampleBuffer, SegmentSink, populated_channels,
};
use crate::model::{CorruptionModel, Range};
use crate::ranges::valid_ranges;

/// A source span read in one go plus the valid ranges it yields, relative to
/// `source_start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub source_start: u64,
    pub source_end: u64,
    pub ranges: Vec<Range>,
}

impl Fragment {
    fn covering(ranges: &[Range], source_start: u64, source_end: u64) -> Self {
        Self {
            source_start,
            source_end,
            ranges: ranges
                .iter()
                .map(|r| Range::new(r.offset - source_start, r.length))
                .collect(),
        }
    }

    pub fn span_len(&self) -> u64 {
        self.source_end - self.source_start
    }

    pub fn output_len(&self) -> u64 {
        self.ranges.iter().map(|r| r.length).sum()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconstructOptions {
    /// Upper bound on the bytes of one channel held in memory.
    pub memory_budget: u64,
    /// Upper bound on the bytes of one written segment; `None` writes one
    /// segment per fragment. Segments never span fragments.
    pub segment_target: Option<u64>,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            memory_budget: 1024 * 1024 * 1024,
            segment_target: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconstructStats {
    pub channels: u64,
    pub samples_in: u64,
    pub samples_out: u64,
    pub fragments: u64,
    pub segments: u64,
}

impl ReconstructStats {
    fn absorb(&mut self, other: &ReconstructStats) {
        self.channels += other.channels;
        self.samples_in += other.samples_in;
        self.samples_out += other.samples_out;
        self.fragments += other.fragments;
        self.segments += other.segments;
    }
}

/// Bisects `valid` by range count until each part's source span fits
/// `memory_budget`. Fragments come back in offset order.
pub fn plan_fragments(valid: &[Range], bytes_per_sample: u64, memory_budget: u64) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    if valid.is_empty() {
        return fragments;
    }

    let mut pending = vec![(0usize, valid.len())];
    while let Some((lo, hi)) = pending.pop() {
        let start = valid[lo].offset;
        let end = valid[hi - 1].end();
        let span_bytes = (end - start).saturating_mul(bytes_per_sample);

        if span_bytes <= memory_budget || hi - lo == 1 {
            if span_bytes > memory_budget {
                warn!(
                    "range at offset {start} needs {span_bytes} bytes, over the {memory_budget} byte budget"
                );
            }
            fragments.push(Fragment::covering(&valid[lo..hi], start, end));
        } else {
            let mid = lo + (hi - lo) / 2;
            pending.push((mid, hi));
            pending.push((lo, mid));
        }
    }
    fragments
}

/// Writes the compacted `data` of one fragment to `sink`. Whole ranges are
/// batched into a segment until the next one would push it past `target`
/// bytes; without a target the fragment is one segment. Segments borrow from
/// `data`. Returns the number of segments written.
fn write_segments(
    sink: &mut dyn SegmentSink,
    key: &ChannelKey,
    data: &SampleBuffer,
    ranges: &[Range],
    target: Option<u64>,
) -> Result<u64, ContainerError> {
    let width = data.dtype().width() as u64;
    let mut written = 0u64;
    let mut start = 0u64;
    let mut pending = 0u64;
    for range in ranges {
        if let Some(target) = target {
            if pending > 0 && (pending + range.length).saturating_mul(width) > target {
                emit_segment(sink, key, data, start, pending)?;
                written += 1;
                start += pending;
                pending = 0;
            }
        }
        pending += range.length;
    }
    if pending > 0 {
        emit_segment(sink, key, data, start, pending)?;
        written += 1;
    }
    Ok(written)
}

fn emit_segment(
    sink: &mut dyn SegmentSink,
    key: &ChannelKey,
    data: &SampleBuffer,
    start: u64,
    count: u64,
) -> Result<(), ContainerError> {
    let piece = data.slice(start, count).ok_or_else(|| {
        ContainerError::Format(format!("segment at {start} outside the repaired buffer of {key}"))
    })?;
    debug!("writing segment of {count} samples to {key}");
    sink.write_segment(key, piece)
}

/// Streams the `valid` ranges of one channel into `sink`. Each fragment is
/// read into one buffer, compacted in place and written from that buffer, so
/// no more than one fragment's span of this channel is held at a time.
pub fn reconstruct_channel(
    source: &dyn ChannelSource,
    key: &ChannelKey,
    valid: &[Range],
    options: &ReconstructOptions,
    sink: &mut dyn SegmentSink,
) -> Result<ReconstructStats, ContainerError> {
    let total_len = source.channel_len(key)?;
    let mut stats = ReconstructStats {
        channels: 1,
        samples_in: total_len,
        ..ReconstructStats::default()
    };
    if total_len == 0 || valid.is_empty() {
        return Ok(stats);
    }

    let bytes_per_sample = source.read(key, 0, 1)?.byte_len() as u64;
    let fragments = if total_len.saturating_mul(bytes_per_sample) <= options.memory_budget {
        vec![Fragment::covering(valid, 0, total_len)]
    } else {
        plan_fragments(valid, bytes_per_sample, options.memory_budget)
    };
    debug!(
        "{key}: {} valid ranges in {} fragments",
        valid.len(),
        fragments.len()
    );

    for fragment in &fragments {
        let mut data = source.read(key, fragment.source_start, fragment.span_len())?;
        data.compact(&fragment.ranges)
            .map_err(|range| ContainerError::RangeOverrun {
                channel: key.clone(),
                offset: fragment.source_start + range.offset,
                length: range.length,
                channel_len: fragment.source_end,
            })?;
        stats.samples_out += data.len();
        stats.segments += write_segments(sink, key, &data, &fragment.ranges, options.segment_target)?;
    }

    stats.fragments = fragments.len() as u64;
    Ok(stats)
}

/// Repairs every populated channel of `source` into `sink`, in container order.
pub fn reconstruct(
    source: &dyn ChannelSource,
    model: &CorruptionModel,
    options: &ReconstructOptions,
    sink: &mut dyn SegmentSink,
) -> Result<ReconstructStats, ContainerError> {
    let mut total = ReconstructStats::default();
    for key in populated_channels(source)? {
        let len = source.channel_len(&key)?;
        let valid = valid_ranges(model.chunk_size(), model.recurrence_size(), len);
        let stats = reconstruct_channel(source, &key, &valid, options, sink)?;
        info!(
            "{key}: kept {} of {} samples in {} segments",
            stats.samples_out, stats.samples_in, stats.segments
        );
        total.absorb(&stats);
    }
    Ok(total)
}
