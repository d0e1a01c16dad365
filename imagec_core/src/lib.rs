//! Shared vocabulary of the imagec engine.
//!
//! This crate holds everything the other members need to agree on:
//! channel indices and measure-channel ids, validity bitsets, the
//! declarative [`settings`] model, the [`error`] taxonomy, the job
//! [`progress`] counter, [`profiling`] spans and [`system`] resource
//! probing.

pub mod error;
pub mod profiling;
pub mod progress;
pub mod settings;
pub mod stop;
pub mod system;
pub mod types;

pub use error::EngineError;
pub use progress::Progress;
pub use stop::StopToken;
pub use types::{
	ChannelIndex, ChannelValidity, MeasureChannel, MeasureChannelId, ObjectValidity, Stats, ValidityFlags, WellPosition,
};
