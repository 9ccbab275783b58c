//! # recurfix
//!
//! Repairs measurement containers in which the acquisition device
//! periodically re-wrote a run of already-recorded samples instead of new
//! ones. Given the corruption model (chunk size, recurrence size and
//! recurrence distance) the crate
//!
//! 1. checks the parameters and the container,
//! 2. confirms by random sampling that the model explains the data, and
//! 3. streams the good chunks of every channel into a new container under a
//!    per-channel memory budget.
//!
//! ```rust
//! use recurfix::checks::check_params;
//! use recurfix::container::{ChannelKey, SampleBuffer};
//! use recurfix::container::memory::MemoryContainer;
//! use recurfix::model::RepairParams;
//! use recurfix::reconstruct::{ReconstructOptions, reconstruct};
//! use recurfix::validate::validate_seeded;
//!
//! let model = check_params(RepairParams {
//!     chunk_size: 6,
//!     recurrence_size: 2,
//!     recurrence_distance: 3,
//! })
//! .unwrap();
//!
//! let corrupted = [1, 2, 3, 4, 5, 6, 4, 5, 7, 8, 9, 10, 11, 12, 10, 11, 13, 14, 15];
//! let source = MemoryContainer::new().with_channel("Untitled", "A", SampleBuffer::from_i32(&corrupted));
//!
//! let outcome = validate_seeded(&model, &source, 19, 10, Some(1)).unwrap();
//! assert!(outcome.is_consistent());
//!
//! let mut repaired = MemoryContainer::new();
//! reconstruct(&source, &model, &ReconstructOptions::default(), &mut repaired).unwrap();
//! let key = ChannelKey::new("Untitled", "A");
//! assert_eq!(
//!     repaired.channel(&key).and_then(|b| b.to_i32_vec()),
//!     Some((1..=15).collect::<Vec<i32>>())
//! );
//! ```

pub mod checks;
pub mod cli;
pub mod config;
pub mod container;
pub mod error;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod ranges;
pub mod reconstruct;
pub mod report;
pub mod validate;
