//! # Consistency Validator
//!
//! Confirms, by sampling duplicated ranges at random, that the supplied
//! corruption model explains the data before anything is rewritten. A
//! sampled range passes when
//!
//! - it equals its origin `recurrence_distance` samples earlier in every
//!   populated channel, and
//! - the sample just before or just after it differs from the matching
//!   sample around the origin, so the match is not an artefact of a
//!   constant or fully repeating neighbourhood.
//!
//! One failing range rejects the model for the whole file.

use std::fmt;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::container::{ChannelKey, ChannelSource, ContainerError, populated_channels};
use crate::error::FixError;
use crate::model::{CorruptionModel, Range};
use crate::ranges::invalid_ranges;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The presumed duplicate differs from its presumed origin.
    DuplicateMismatch { channel: ChannelKey },
    /// Neither the before nor the after neighbours tell duplicate and origin apart.
    AmbiguousBoundaries,
    /// The origin would start before the first sample.
    OriginOutOfBounds,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub range: Range,
    pub reason: RejectReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (offset, length) = (self.range.offset, self.range.length);
        match &self.reason {
            RejectReason::DuplicateMismatch { channel } => write!(
                f,
                "{length} samples at offset {offset} in {channel} do not match their origin"
            ),
            RejectReason::AmbiguousBoundaries => write!(
                f,
                "neighbours of the {length} samples at offset {offset} repeat as well"
            ),
            RejectReason::OriginOutOfBounds => write!(
                f,
                "origin of the {length} samples at offset {offset} lies outside the channel"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Consistent(CorruptionModel),
    Inconsistent(Rejection),
}

impl ValidationOutcome {
    pub fn is_consistent(&self) -> bool {
        matches!(self, ValidationOutcome::Consistent(_))
    }

    pub fn into_result(self) -> Result<CorruptionModel, FixError> {
        match self {
            ValidationOutcome::Consistent(model) => Ok(model),
            ValidationOutcome::Inconsistent(rejection) => Err(FixError::ModelRejected(rejection)),
        }
    }
}

/// Samples up to `sample_size` distinct duplicated ranges and checks each one.
pub fn validate<R: Rng + ?Sized>(
    model: &CorruptionModel,
    source: &dyn ChannelSource,
    total_len: u64,
    sample_size: usize,
    rng: &mut R,
) -> Result<ValidationOutcome, ContainerError> {
    let channels = populated_channels(source)?;
    let candidates = invalid_ranges(model.chunk_size(), model.recurrence_size(), total_len);
    let amount = sample_size.min(candidates.len());
    info!(
        "checking {amount} of {} recurrences across {} channels",
        candidates.len(),
        channels.len()
    );

    for idx in rand::seq::index::sample(rng, candidates.len(), amount).iter() {
        let range = candidates[idx];
        if let Some(reason) = check_recurrence(source, &channels, model, total_len, range)? {
            debug!(
                "recurrence at offset {} (length {}) rejected: {:?}",
                range.offset, range.length, reason
            );
            return Ok(ValidationOutcome::Inconsistent(Rejection { range, reason }));
        }
    }
    Ok(ValidationOutcome::Consistent(*model))
}

/// Like [`validate`], drawing from a seeded `StdRng` when a seed is given.
pub fn validate_seeded(
    model: &CorruptionModel,
    source: &dyn ChannelSource,
    total_len: u64,
    sample_size: usize,
    seed: Option<u64>,
) -> Result<ValidationOutcome, ContainerError> {
    match seed {
        Some(seed) => {
            let mut rng = StdRng::seed_from_u64(seed);
            validate(model, source, total_len, sample_size, &mut rng)
        }
        None => validate(model, source, total_len, sample_size, &mut rand::thread_rng()),
    }
}

fn check_recurrence(
    source: &dyn ChannelSource,
    channels: &[ChannelKey],
    model: &CorruptionModel,
    total_len: u64,
    range: Range,
) -> Result<Option<RejectReason>, ContainerError> {
    let origin = match range.offset.checked_sub(model.recurrence_distance()) {
        Some(origin) if origin + range.length <= total_len => origin,
        _ => return Ok(Some(RejectReason::OriginOutOfBounds)),
    };

    for key in channels {
        let duplicate = source.read(key, range.offset, range.length)?;
        let original = source.read(key, origin, range.length)?;
        if duplicate != original {
            return Ok(Some(RejectReason::DuplicateMismatch {
                channel: key.clone(),
            }));
        }
    }

    let before = neighbours_differ(
        source,
        channels,
        total_len,
        range.offset.checked_sub(1),
        origin.checked_sub(1),
    )?;
    if before == Some(true) {
        return Ok(None);
    }
    let after = neighbours_differ(
        source,
        channels,
        total_len,
        Some(range.end()),
        Some(origin + range.length),
    )?;
    if after == Some(true) {
        return Ok(None);
    }
    Ok(Some(RejectReason::AmbiguousBoundaries))
}

/// `None` when either index lies outside the channel.
fn neighbours_differ(
    source: &dyn ChannelSource,
    channels: &[ChannelKey],
    total_len: u64,
    duplicate_idx: Option<u64>,
    origin_idx: Option<u64>,
) -> Result<Option<bool>, ContainerError> {
    let (Some(d), Some(o)) = (duplicate_idx, origin_idx) else {
        return Ok(None);
    };
    if d >= total_len || o >= total_len {
        return Ok(None);
    }
    for key in channels {
        if source.read(key, d, 1)? != source.read(key, o, 1)? {
            return Ok(Some(true));
        }
    }
    Ok(Some(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::check_params;
    use crate::container::SampleBuffer;
    use crate::container::memory::MemoryContainer;
    use crate::model::RepairParams;

    // [1,2,3,4,5,6,4,5,7,8,9,10,11,12,10,11,13,14,15]
    fn corrupted() -> Vec<i32> {
        vec![1, 2, 3, 4, 5, 6, 4, 5, 7, 8, 9, 10, 11, 12, 10, 11, 13, 14, 15]
    }

    fn model(chunk_size: i64, recurrence_size: i64, recurrence_distance: i64) -> CorruptionModel {
        check_params(RepairParams {
            chunk_size,
            recurrence_size,
            recurrence_distance,
        })
        .expect("model")
    }

    fn container(values: &[i32]) -> MemoryContainer {
        let doubled: Vec<f64> = values.iter().map(|v| f64::from(*v) * 2.0).collect();
        MemoryContainer::new()
            .with_channel("Untitled", "A", SampleBuffer::from_i32(values))
            .with_channel("Untitled", "B", SampleBuffer::from_f64(&doubled))
    }

    fn run(model: &CorruptionModel, values: &[i32]) -> ValidationOutcome {
        let mem = container(values);
        validate_seeded(model, &mem, values.len() as u64, 100, Some(7)).expect("validate")
    }

    #[test]
    fn accepts_matching_model() {
        let m = model(6, 2, 3);
        assert_eq!(run(&m, &corrupted()), ValidationOutcome::Consistent(m));
    }

    #[test]
    fn rejects_wrong_recurrence_size() {
        let outcome = run(&model(6, 3, 3), &corrupted());
        assert!(matches!(
            outcome,
            ValidationOutcome::Inconsistent(Rejection {
                reason: RejectReason::DuplicateMismatch { .. },
                ..
            })
        ));
    }

    #[test]
    fn rejects_mutated_duplicate() {
        let mut values = corrupted();
        values[15] = 99;
        let outcome = run(&model(6, 2, 3), &values);
        let ValidationOutcome::Inconsistent(rejection) = outcome else {
            panic!("mutated fixture accepted");
        };
        assert_eq!(rejection.range, Range::new(14, 2));
        assert!(matches!(rejection.reason, RejectReason::DuplicateMismatch { .. }));
        let err = ValidationOutcome::Inconsistent(rejection).into_result().unwrap_err();
        assert_eq!(err.code(), "MODEL_REJECTED");
    }

    #[test]
    fn rejects_constant_channel() {
        let values = vec![5; 19];
        let outcome = run(&model(6, 2, 3), &values);
        assert!(matches!(
            outcome,
            ValidationOutcome::Inconsistent(Rejection {
                reason: RejectReason::AmbiguousBoundaries,
                ..
            })
        ));
    }

    #[test]
    fn each_range_needs_its_own_distinct_neighbour() {
        // second recurrence: before pair (idx 13, idx 10) and after pair (idx 16, idx 13) both equal
        let mut values = corrupted();
        values[10] = 12;
        values[16] = 12;
        let outcome = run(&model(6, 2, 3), &values);
        let ValidationOutcome::Inconsistent(rejection) = outcome else {
            panic!("ambiguous fixture accepted");
        };
        assert_eq!(rejection.range, Range::new(14, 2));
        assert_eq!(rejection.reason, RejectReason::AmbiguousBoundaries);
    }

    #[test]
    fn one_distinct_neighbour_is_enough() {
        let mut values = corrupted();
        values[10] = 12;
        assert!(run(&model(6, 2, 3), &values).is_consistent());
    }

    #[test]
    fn trailing_recurrence_without_after_neighbour() {
        let values = &corrupted()[..16];
        assert!(run(&model(6, 2, 3), values).is_consistent());
    }

    #[test]
    fn origin_before_first_sample() {
        // only the recurrence at offset 6 fits in the first 12 samples
        let outcome = run(&model(6, 2, 7), &corrupted()[..12]);
        assert!(matches!(
            outcome,
            ValidationOutcome::Inconsistent(Rejection {
                reason: RejectReason::OriginOutOfBounds,
                ..
            })
        ));
    }

    #[test]
    fn nothing_to_sample_is_consistent() {
        let m = model(8, 3, 3);
        assert!(run(&m, &[1, 2, 3]).is_consistent());
        let mem = container(&corrupted());
        let outcome = validate_seeded(&m, &mem, 19, 0, None).expect("validate");
        assert!(outcome.is_consistent());
    }

    #[test]
    fn mismatch_in_any_channel_rejects() {
        let values = corrupted();
        let mut other: Vec<f64> = values.iter().map(|v| f64::from(*v)).collect();
        other[7] = -1.0;
        let mem = MemoryContainer::new()
            .with_channel("Untitled", "A", SampleBuffer::from_i32(&values))
            .with_channel("Other", "B", SampleBuffer::from_f64(&other));
        let outcome = validate_seeded(&model(6, 2, 3), &mem, 19, 10, None).expect("validate");
        let ValidationOutcome::Inconsistent(rejection) = outcome else {
            panic!("mismatch accepted");
        };
        assert_eq!(
            rejection.reason,
            RejectReason::DuplicateMismatch {
                channel: ChannelKey::new("Other", "B")
            }
        );
    }
}
