//! The job engine.
//!
//! Turns an analyze settings document plus a directory of images into a
//! persisted result database: per-(image, tile, channel) processing
//! ([`processor`]), cross-channel steps ([`steps`]), the three-axis
//! concurrency budget ([`budget`]) and the scheduler with its progress
//! and state machine ([`scheduler`]).

pub mod budget;
pub mod context;
pub mod persist;
pub mod processor;
pub mod scheduler;
pub mod steps;

pub use budget::{Axis, ThreadingSettings, calc_threading};
pub use context::{ImageEntry, PipelineContext, SessionFactory};
pub use scheduler::{Job, JobConfig, JobState, Scheduler};

/// Above this decoded byte footprint a resolution is processed tile by
/// tile instead of being loaded whole.
pub const MAX_IMAGE_SIZE_BYTES_TO_LOAD_AT_ONCE: u64 = 71_680_768;

/// Composite tile edge lengths in pixels.
pub const COMPOSITE_TILE_WIDTH: u32 = 2048;
pub const COMPOSITE_TILE_HEIGHT: u32 = 2048;

/// Overlap ratio above which a detection counts as a reference spot.
pub const REFERENCE_SPOT_MIN_INTERSECTION: f64 = 0.7;
