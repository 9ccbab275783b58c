//! # Precondition Checks
//!
//! Cheap guards every run passes through before validation and repair.
//! Each check returns the checked value or the first failure; chains
//! short-circuit through `?`, so later checks never run after a failure.

use std::path::{Path, PathBuf};

use crate::container::{ChannelSource, max_channel_len, populated_channels};
use crate::container::segfile::SegmentFileReader;
use crate::error::{FixError, ParameterFault, PathFault};
use crate::model::{CorruptionModel, RepairParams};

pub fn check_recurrence_not_greater_than_chunk(params: RepairParams) -> Result<RepairParams, FixError> {
    if params.recurrence_size > params.chunk_size {
        return Err(FixError::ParameterInvalid(ParameterFault::RecurrenceGreaterThanChunk));
    }
    Ok(params)
}

pub fn check_recurrence_nonnegative(params: RepairParams) -> Result<RepairParams, FixError> {
    if params.recurrence_size < 0 {
        return Err(FixError::ParameterInvalid(ParameterFault::RecurrenceNegative));
    }
    Ok(params)
}

pub fn check_chunk_positive(params: RepairParams) -> Result<RepairParams, FixError> {
    if params.chunk_size <= 0 {
        return Err(FixError::ParameterInvalid(ParameterFault::ChunkNonpositive));
    }
    Ok(params)
}

pub fn check_distance_positive(params: RepairParams) -> Result<RepairParams, FixError> {
    if params.recurrence_distance <= 0 {
        return Err(FixError::ParameterInvalid(ParameterFault::DistanceNonpositive));
    }
    Ok(params)
}

/// Runs every parameter check in order and builds the model.
pub fn check_params(params: RepairParams) -> Result<CorruptionModel, FixError> {
    let params = check_recurrence_not_greater_than_chunk(params)?;
    let params = check_recurrence_nonnegative(params)?;
    let params = check_chunk_positive(params)?;
    let params = check_distance_positive(params)?;
    Ok(CorruptionModel::new(
        params.chunk_size as u64,
        params.recurrence_size as u64,
        params.recurrence_distance as u64,
    ))
}

/// Input must be an existing container or directory.
pub fn check_input_path(path: &Path) -> Result<PathBuf, FixError> {
    if !path.exists() {
        return Err(FixError::PathInvalid(PathFault::SourceMissing(path.to_path_buf())));
    }
    if path.is_dir() || SegmentFileReader::open(path).is_ok() {
        return Ok(path.to_path_buf());
    }
    Err(FixError::PathInvalid(PathFault::NotAContainer(path.to_path_buf())))
}

pub fn check_dir_not_empty(path: &Path) -> Result<PathBuf, FixError> {
    let mut entries = std::fs::read_dir(path)?;
    if entries.next().is_none() {
        return Err(FixError::PathInvalid(PathFault::DirEmpty(path.to_path_buf())));
    }
    Ok(path.to_path_buf())
}

/// The folder the output will be written into must already exist.
pub fn check_export_path(path: &Path) -> Result<PathBuf, FixError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(FixError::PathInvalid(PathFault::OutputDirMissing(parent.to_path_buf())));
    }
    Ok(path.to_path_buf())
}

pub fn open_container(path: &Path) -> Result<SegmentFileReader, FixError> {
    if !path.exists() {
        return Err(FixError::PathInvalid(PathFault::SourceMissing(path.to_path_buf())));
    }
    SegmentFileReader::open(path)
        .map_err(|_| FixError::PathInvalid(PathFault::NotAContainer(path.to_path_buf())))
}

/// Every populated channel must hold the same number of samples; returns it.
pub fn check_same_length(source: &dyn ChannelSource) -> Result<u64, FixError> {
    let mut shared: Option<u64> = None;
    for key in populated_channels(source)? {
        let len = source.channel_len(&key)?;
        match shared {
            None => shared = Some(len),
            Some(expected) if expected != len => {
                return Err(FixError::LengthMismatch {
                    channel: key,
                    expected,
                    found: len,
                });
            }
            Some(_) => {}
        }
    }
    Ok(shared.unwrap_or(0))
}

pub fn check_positive_length(source: &dyn ChannelSource) -> Result<u64, FixError> {
    let len = max_channel_len(source)?;
    if len == 0 {
        return Err(FixError::DataLengthInvalid);
    }
    Ok(len)
}

/// Shared channel length of a container that passed every file check.
pub fn check_source(source: &dyn ChannelSource) -> Result<u64, FixError> {
    check_same_length(source)?;
    check_positive_length(source)
}
