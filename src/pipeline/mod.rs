//! # Pipeline Module
//!
//! Runs one container through the precondition checks and the consistency
//! validator (`prepare_file`), then rewrites it without the recurrences
//! (`export_file`). Batch orchestration over folders lives in [`batch`].

pub mod batch;

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::checks::{check_params, check_source, open_container};
use crate::container::segfile::SegmentFileWriter;
use crate::error::FixError;
use crate::model::{CorruptionModel, RepairParams};
use crate::reconstruct::{ReconstructOptions, ReconstructStats, reconstruct};
use crate::report::{RepairRecord, file_digests};
use crate::validate::validate_seeded;

pub use batch::{corrected_file_name, default_export_path, run};

pub const DEFAULT_SAMPLE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct RepairOptions {
    pub consistency_sample_size: usize,
    pub reconstruct: ReconstructOptions,
    /// Seeds the validator; `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            consistency_sample_size: DEFAULT_SAMPLE_SIZE,
            reconstruct: ReconstructOptions::default(),
            seed: None,
        }
    }
}

/// A container that passed every check and whose model was confirmed. Holds
/// no open file; [`export_file`] reopens the container.
#[derive(Debug, Clone)]
pub struct PreparedFile {
    pub path: PathBuf,
    pub model: CorruptionModel,
    pub channel_len: u64,
}

/// Parameter checks, container checks and consistency validation, stopping
/// at the first failure.
pub fn prepare_file(
    params: RepairParams,
    path: &Path,
    options: &RepairOptions,
) -> Result<PreparedFile, FixError> {
    let model = check_params(params)?;
    let container = open_container(path)?;
    let channel_len = check_source(&container)?;

    if options.consistency_sample_size == 0 {
        warn!("consistency sample size is 0; {} is not validated", path.display());
    }
    let model = validate_seeded(
        &model,
        &container,
        channel_len,
        options.consistency_sample_size,
        options.seed,
    )?
    .into_result()?;

    info!("{} matches the corruption model", path.display());
    Ok(PreparedFile {
        path: path.to_path_buf(),
        model,
        channel_len,
    })
}

/// Writes the repaired container to `output`. Data goes to a `.partial`
/// sibling first and is renamed only once every channel is written; any
/// failure removes the partial file. When the digests of the renamed output
/// cannot be computed the output is removed too, so an error never leaves a
/// repaired file behind.
pub fn export_file(
    prepared: &PreparedFile,
    output: &Path,
    options: &RepairOptions,
) -> Result<RepairRecord, FixError> {
    let partial = partial_path(output);
    let written = write_repaired(prepared, &partial, &options.reconstruct)
        .and_then(|stats| fs::rename(&partial, output).map(|()| stats).map_err(FixError::from));
    let stats = match written {
        Ok(stats) => stats,
        Err(err) => {
            discard(&partial);
            return Err(err);
        }
    };

    let (sha256, md5) = match file_digests(output) {
        Ok(digests) => digests,
        Err(err) => {
            discard(output);
            return Err(err.into());
        }
    };
    info!(
        "wrote {} ({} of {} samples kept per channel)",
        output.display(),
        stats.samples_out / stats.channels.max(1),
        prepared.channel_len
    );
    Ok(RepairRecord::new(
        &prepared.path,
        output,
        &prepared.model,
        &stats,
        sha256,
        md5,
    ))
}

fn write_repaired(
    prepared: &PreparedFile,
    partial: &Path,
    options: &ReconstructOptions,
) -> Result<ReconstructStats, FixError> {
    let container = open_container(&prepared.path)?;
    let mut writer = SegmentFileWriter::create(partial)?;
    let stats = reconstruct(&container, &prepared.model, options, &mut writer)?;
    writer.finish()?;
    Ok(stats)
}

fn discard(path: &Path) {
    if !path.is_file() {
        return;
    }
    if let Err(err) = fs::remove_file(path) {
        warn!("could not remove {}: {err}", path.display());
    }
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".partial");
    output.with_file_name(name)
}
