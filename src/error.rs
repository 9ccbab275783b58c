use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::container::{ChannelKey, ContainerError};
use crate::validate::Rejection;

/// Which operator parameter was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterFault {
    RecurrenceGreaterThanChunk,
    RecurrenceNegative,
    ChunkNonpositive,
    DistanceNonpositive,
}

impl ParameterFault {
    pub fn code(self) -> &'static str {
        match self {
            ParameterFault::RecurrenceGreaterThanChunk => "RECURRENCE_GREATER_THAN_CHUNK",
            ParameterFault::RecurrenceNegative => "RECURRENCE_NEGATIVE",
            ParameterFault::ChunkNonpositive => "CHUNK_NONPOSITIVE",
            ParameterFault::DistanceNonpositive => "DISTANCE_NONPOSITIVE",
        }
    }
}

impl fmt::Display for ParameterFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ParameterFault::RecurrenceGreaterThanChunk => "recurrence size is greater than chunk size",
            ParameterFault::RecurrenceNegative => "recurrence size is negative",
            ParameterFault::ChunkNonpositive => "chunk size is not positive",
            ParameterFault::DistanceNonpositive => "recurrence distance is not positive",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathFault {
    /// Input is neither a readable container nor a directory.
    NotAContainer(PathBuf),
    SourceMissing(PathBuf),
    OutputDirMissing(PathBuf),
    DirEmpty(PathBuf),
}

impl PathFault {
    pub fn code(&self) -> &'static str {
        match self {
            PathFault::NotAContainer(_) => "PATH_NOT_CONTAINER_OR_DIR",
            PathFault::SourceMissing(_) => "SOURCE_NONEXISTENT",
            PathFault::OutputDirMissing(_) => "EXPORT_DIR_NONEXISTENT",
            PathFault::DirEmpty(_) => "DIR_EMPTY",
        }
    }
}

impl fmt::Display for PathFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathFault::NotAContainer(p) => {
                write!(f, "{} is neither a container nor a folder", p.display())
            }
            PathFault::SourceMissing(p) => write!(f, "{} does not exist", p.display()),
            PathFault::OutputDirMissing(p) => {
                write!(f, "export folder {} does not exist", p.display())
            }
            PathFault::DirEmpty(p) => write!(f, "folder {} is empty", p.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum FixError {
    #[error("invalid parameter: {0}")]
    ParameterInvalid(ParameterFault),
    #[error("length of data is not positive")]
    DataLengthInvalid,
    #[error("channels have different lengths: {channel} has {found} samples, expected {expected}")]
    LengthMismatch {
        channel: ChannelKey,
        expected: u64,
        found: u64,
    },
    #[error("values in channels do not repeat as expected: {0}")]
    ModelRejected(Rejection),
    #[error("invalid path: {0}")]
    PathInvalid(PathFault),
    #[error("container error: {0}")]
    Container(#[from] ContainerError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FixError {
    /// Stable identifier of the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            FixError::ParameterInvalid(fault) => fault.code(),
            FixError::DataLengthInvalid => "DATALENGTH_NONPOSITIVE",
            FixError::LengthMismatch { .. } => "LENGTH_MISMATCH",
            FixError::ModelRejected(_) => "MODEL_REJECTED",
            FixError::PathInvalid(fault) => fault.code(),
            FixError::Container(ContainerError::RangeOverrun { .. }) => "RANGE_OVERRUN",
            FixError::Container(_) => "CONTAINER",
            FixError::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fault_has_a_description_and_code() {
        for fault in [
            ParameterFault::RecurrenceGreaterThanChunk,
            ParameterFault::RecurrenceNegative,
            ParameterFault::ChunkNonpositive,
            ParameterFault::DistanceNonpositive,
        ] {
            let err = FixError::ParameterInvalid(fault);
            assert!(!err.to_string().is_empty());
            assert_eq!(err.code(), fault.code());
        }
    }

    #[test]
    fn range_overrun_has_its_own_code() {
        let err = FixError::from(ContainerError::RangeOverrun {
            channel: ChannelKey::new("g", "c"),
            offset: 4,
            length: 2,
            channel_len: 5,
        });
        assert_eq!(err.code(), "RANGE_OVERRUN");
        assert!(err.to_string().contains("overruns"));
    }
}
