//! # Batch Orchestration
//!
//! A folder is repaired in two passes: every container is prepared and
//! validated first, and only then is any output written. A bad file late in
//! the folder therefore leaves no repaired outputs behind.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::checks::{check_dir_not_empty, check_export_path, check_input_path};
use crate::container::segfile::CONTAINER_EXTENSION;
use crate::error::FixError;
use crate::model::RepairParams;
use crate::pipeline::{RepairOptions, export_file, prepare_file};
use crate::report::RepairRecord;

const CORRECTED_SUFFIX: &str = "_corrected";

/// `<parent>/<stem>_corrected.seg` for a file, `<parent>/<name>_corrected` for a folder.
pub fn default_export_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let parent = input.parent().unwrap_or_else(|| Path::new(""));
    let target = parent.join(format!("{stem}{CORRECTED_SUFFIX}"));
    if input.is_dir() {
        target
    } else {
        target.with_extension(CONTAINER_EXTENSION)
    }
}

/// Name of a folder entry's repaired copy.
pub fn corrected_file_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    format!("{stem}{CORRECTED_SUFFIX}.{CONTAINER_EXTENSION}")
}

fn with_container_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(CONTAINER_EXTENSION)
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, FixError> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

/// Repairs `input` (a container or a folder of containers) into `output`,
/// or next to the input when no output is given.
pub fn run(
    input: &Path,
    output: Option<&Path>,
    params: RepairParams,
    options: &RepairOptions,
) -> Result<Vec<RepairRecord>, FixError> {
    let input = check_input_path(input)?;
    let export = match output {
        Some(path) => path.to_path_buf(),
        None => default_export_path(&input),
    };
    let export = check_export_path(&export)?;

    if !input.is_dir() {
        let export = with_container_extension(export);
        let prepared = prepare_file(params, &input, options)?;
        return Ok(vec![export_file(&prepared, &export, options)?]);
    }

    check_dir_not_empty(&input)?;
    let entries = sorted_entries(&input)?;
    let total = entries.len();

    let mut prepared = Vec::with_capacity(total);
    for (idx, path) in entries.iter().enumerate() {
        info!("preprocess file {} of {total} at {}", idx + 1, path.display());
        prepared.push(prepare_file(params, path, options)?);
    }

    if !export.exists() {
        fs::create_dir(&export)?;
    }

    let mut records = Vec::with_capacity(total);
    for (idx, file) in prepared.iter().enumerate() {
        info!("fix file {} of {total} at {}", idx + 1, file.path.display());
        let target = export.join(corrected_file_name(&file.path));
        records.push(export_file(file, &target, options)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrected_names() {
        assert_eq!(corrected_file_name(Path::new("/data/run1.seg")), "run1_corrected.seg");
        let file_default = default_export_path(Path::new("/nonexistent/run1.seg"));
        assert_eq!(file_default, PathBuf::from("/nonexistent/run1_corrected.seg"));
    }

    #[test]
    fn explicit_output_gets_container_extension() {
        assert_eq!(
            with_container_extension(PathBuf::from("/tmp/output")),
            PathBuf::from("/tmp/output.seg")
        );
        assert_eq!(
            with_container_extension(PathBuf::from("/tmp/output.bin")),
            PathBuf::from("/tmp/output.bin")
        );
    }

    #[test]
    fn folder_default_keeps_no_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("batch");
        fs::create_dir(&input).expect("mkdir");
        assert_eq!(default_export_path(&input), dir.path().join("batch_corrected"));
    }
}
