//! # Repair Report
//!
//! One record per repaired container, written as JSON lines or CSV.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::model::CorruptionModel;
use crate::reconstruct::ReconstructStats;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairRecord {
    pub source: String,
    pub output: String,
    pub chunk_size: u64,
    pub recurrence_size: u64,
    pub recurrence_distance: u64,
    pub channels: u64,
    pub samples_in: u64,
    pub samples_out: u64,
    pub fragments: u64,
    pub segments: u64,
    pub sha256: String,
    pub md5: String,
    pub repaired_at: DateTime<Utc>,
}

impl RepairRecord {
    pub fn new(
        source: &Path,
        output: &Path,
        model: &CorruptionModel,
        stats: &ReconstructStats,
        sha256: String,
        md5: String,
    ) -> Self {
        Self {
            source: source.to_string_lossy().to_string(),
            output: output.to_string_lossy().to_string(),
            chunk_size: model.chunk_size(),
            recurrence_size: model.recurrence_size(),
            recurrence_distance: model.recurrence_distance(),
            channels: stats.channels,
            samples_in: stats.samples_in,
            samples_out: stats.samples_out,
            fragments: stats.fragments,
            segments: stats.segments,
            sha256,
            md5,
            repaired_at: Utc::now(),
        }
    }
}

/// SHA-256 and MD5 of a file, hex encoded.
pub fn file_digests(path: &Path) -> std::io::Result<(String, String)> {
    let mut file = File::open(path)?;
    let mut sha = Sha256::new();
    let mut md5 = md5::Context::new();
    let mut buf = vec![0u8; 8 * 1024 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        sha.update(&buf[..n]);
        md5.consume(&buf[..n]);
    }
    Ok((hex::encode(sha.finalize()), format!("{:x}", md5.compute())))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Jsonl,
    Csv,
}

pub trait ReportSink {
    fn record(&mut self, record: &RepairRecord) -> Result<(), ReportError>;
    fn flush(&mut self) -> Result<(), ReportError>;
}

pub struct JsonlReport {
    writer: BufWriter<File>,
}

impl JsonlReport {
    pub fn new(path: &Path) -> Result<Self, ReportError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl ReportSink for JsonlReport {
    fn record(&mut self, record: &RepairRecord) -> Result<(), ReportError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ReportError> {
        self.writer.flush()?;
        Ok(())
    }
}

pub struct CsvReport {
    writer: csv::Writer<File>,
}

impl CsvReport {
    /// Appends to an existing report without repeating the header row.
    pub fn new(path: &Path) -> Result<Self, ReportError> {
        let has_rows = path.metadata().map(|m| m.len() > 0).unwrap_or(false);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(!has_rows)
            .from_writer(file);
        Ok(Self { writer })
    }
}

impl ReportSink for CsvReport {
    fn record(&mut self, record: &RepairRecord) -> Result<(), ReportError> {
        self.writer.serialize(record)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ReportError> {
        self.writer.flush()?;
        Ok(())
    }
}

pub fn build_report(kind: ReportKind, path: &Path) -> Result<Box<dyn ReportSink>, ReportError> {
    match kind {
        ReportKind::Jsonl => Ok(Box::new(JsonlReport::new(path)?)),
        ReportKind::Csv => Ok(Box::new(CsvReport::new(path)?)),
    }
}
