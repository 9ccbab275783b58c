//! Shared fixtures for the integration tests: synthetic containers built by
//! inserting recurrences into known clean data.

#![allow(dead_code)]

use std::path::Path;

use recurfix::container::segfile::{SegmentFileReader, SegmentFileWriter};
use recurfix::container::{ChannelKey, ChannelSource, SampleBuffer, SegmentSink};
use recurfix::model::RepairParams;
use recurfix::pipeline::RepairOptions;

pub const GROUP: &str = "Untitled";

/// Inserts `rec` samples copied from `distance` back after every chunk of
/// `clean` except the last.
pub fn corrupt<T: Copy>(clean: &[T], chunk: usize, rec: usize, distance: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(clean.len() * 2);
    for (idx, piece) in clean.chunks(chunk).enumerate() {
        out.extend_from_slice(piece);
        if (idx + 1) * chunk < clean.len() {
            for _ in 0..rec {
                out.push(out[out.len() - distance]);
            }
        }
    }
    out
}

pub fn example_params() -> RepairParams {
    RepairParams {
        chunk_size: 6,
        recurrence_size: 2,
        recurrence_distance: 3,
    }
}

pub fn example_options() -> RepairOptions {
    RepairOptions {
        consistency_sample_size: 10,
        seed: Some(3),
        ..RepairOptions::default()
    }
}

/// Writes channels interleaved, `per_segment` samples of each channel per round.
pub fn write_container(path: &Path, channels: &[(&str, &str, SampleBuffer)], per_segment: u64) {
    let mut writer = SegmentFileWriter::create(path).expect("create container");
    for (group, channel, samples) in channels.iter().filter(|(_, _, s)| s.is_empty()) {
        writer
            .write_segment(&ChannelKey::new(*group, *channel), samples.as_samples())
            .expect("segment");
    }

    let longest = channels.iter().map(|(_, _, b)| b.len()).max().unwrap_or(0);
    let mut start = 0u64;
    while start < longest {
        for (group, channel, samples) in channels {
            if start >= samples.len() {
                continue;
            }
            let n = per_segment.min(samples.len() - start);
            let piece = samples.slice(start, n).expect("slice");
            writer
                .write_segment(&ChannelKey::new(*group, *channel), piece)
                .expect("segment");
        }
        start += per_segment;
    }
    writer.finish().expect("finish container");
}

pub fn clean_a() -> Vec<i32> {
    (1..=15).collect()
}

/// Four populated channels of 19 samples (15 clean) plus one empty channel.
pub fn write_example_container(path: &Path) {
    let a = corrupt(&clean_a(), 6, 2, 3);
    let b: Vec<f64> = corrupt(&(1..=15).map(|v| f64::from(v) * 0.5).collect::<Vec<_>>(), 6, 2, 3);
    let c = corrupt(&(1..=15).map(|v| v * v).collect::<Vec<i32>>(), 6, 2, 3);
    let d: Vec<f64> = corrupt(&(1..=15).map(|v| -f64::from(v)).collect::<Vec<_>>(), 6, 2, 3);
    write_container(
        path,
        &[
            (GROUP, "D", SampleBuffer::from_f64(&d)),
            (GROUP, "C", SampleBuffer::from_i32(&c)),
            (GROUP, "B", SampleBuffer::from_f64(&b)),
            (GROUP, "A", SampleBuffer::from_i32(&a)),
            (GROUP, "E", SampleBuffer::from_i32(&[])),
        ],
        5,
    );
}

pub fn read_i32(path: &Path, group: &str, channel: &str) -> Vec<i32> {
    let reader = SegmentFileReader::open(path).expect("open output");
    let key = ChannelKey::new(group, channel);
    let len = reader.channel_len(&key).expect("channel length");
    reader
        .read(&key, 0, len)
        .expect("read channel")
        .to_i32_vec()
        .expect("i32 channel")
}

pub fn read_f64(path: &Path, group: &str, channel: &str) -> Vec<f64> {
    let reader = SegmentFileReader::open(path).expect("open output");
    let key = ChannelKey::new(group, channel);
    let len = reader.channel_len(&key).expect("channel length");
    reader
        .read(&key, 0, len)
        .expect("read channel")
        .to_f64_vec()
        .expect("f64 channel")
}
