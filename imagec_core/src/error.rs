//! The engine wide error taxonomy.
//!
//! Per-work-item failures are converted into one of these values,
//! logged at WARN and summarised; a job keeps running through them.
//! Only database and pre-start errors escalate to the job level.

use crate::types::ChannelIndex;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
	/// Settings failed validation. Fatal before start.
	#[error("invalid configuration {path:?}: {reason}")]
	ConfigInvalid { path: PathBuf, reason: String },

	/// The reader rejected the file. The image is skipped, the job
	/// continues.
	#[error("unsupported image format: {0:?}")]
	UnsupportedFormat(PathBuf),

	/// IO failure while reading pixels; retried once before the image
	/// is skipped.
	#[error("reading {path:?} failed: {reason}")]
	ReadFailed { path: PathBuf, reason: String },

	/// Inference or threshold failure for one tile. The image-channel
	/// is recorded as invalidated.
	#[error("detector failed on channel {channel}: {reason}")]
	DetectorFailed { channel: ChannelIndex, reason: String },

	/// The threshold detector's safety valve tripped.
	#[error("too many objects in tile {0}, looks like noise")]
	TooManyObjects(u16),

	/// Fatal; transitions the job to ERROR.
	#[error("database {op} failed: {reason}")]
	DatabaseError { op: String, reason: String },

	/// The opened database was written by an incompatible version.
	#[error("database schema version {found} does not match expected {expected}")]
	DatabaseSchemaMismatch { found: u32, expected: u32 },

	/// The budget formula could not fit a single worker into RAM.
	#[error("insufficient system resources to run the job")]
	InsufficientResources,

	/// `start` was called while a job is active.
	#[error("a job is already running")]
	JobAlreadyRunning,

	/// Cooperative stop; not a failure.
	#[error("cancelled")]
	Cancelled,
}

impl EngineError {
	/// Process exit code for the CLI surface.
	pub fn exit_code(&self) -> i32 {
		match self {
			EngineError::ConfigInvalid { .. } | EngineError::JobAlreadyRunning => 2,
			EngineError::UnsupportedFormat(_) | EngineError::ReadFailed { .. } => 3,
			EngineError::DatabaseError { .. } | EngineError::DatabaseSchemaMismatch { .. } => 4,
			EngineError::DetectorFailed { .. } | EngineError::TooManyObjects(_) | EngineError::InsufficientResources => 5,
			EngineError::Cancelled => 130,
		}
	}

	/// True if this error may only fail a single work item, not the
	/// whole job.
	pub fn is_per_item(&self) -> bool {
		matches!(
			self,
			EngineError::UnsupportedFormat(_)
				| EngineError::ReadFailed { .. }
				| EngineError::DetectorFailed { .. }
				| EngineError::TooManyObjects(_)
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exit_codes() {
		assert_eq!(
			EngineError::ConfigInvalid {
				path: PathBuf::from("a.json"),
				reason: "bad".into()
			}
			.exit_code(),
			2
		);
		assert_eq!(EngineError::ReadFailed { path: PathBuf::new(), reason: String::new() }.exit_code(), 3);
		assert_eq!(EngineError::Cancelled.exit_code(), 130);
	}

	#[test]
	fn per_item_classification() {
		assert!(EngineError::TooManyObjects(3).is_per_item());
		assert!(!EngineError::DatabaseError { op: "insert".into(), reason: String::new() }.is_per_item());
		assert!(!EngineError::Cancelled.is_per_item());
	}
}
