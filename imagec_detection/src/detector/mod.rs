//! The two detector families behind one `forward` contract.

mod model;
mod threshold;

pub use model::{InferenceOutput, InferenceSession, ModelDetector, PrototypeMasks};
pub use threshold::ThresholdDetector;

use crate::DetectionResponse;
use imagec_core::{EngineError, StopToken, types::ChannelIndex};
use imagec_image::Raster;

/// Tagged variant over the detector configurations. Both arms stay
/// separately constructible and testable.
pub enum Detector {
	Threshold(ThresholdDetector),
	Model(ModelDetector),
}

impl Detector {
	/// Runs detection for one tile. `src` is the preprocessed plane,
	/// `original` the unprocessed pixels used for intensity sampling.
	pub fn forward(
		&self,
		src: &Raster,
		original: &Raster,
		channel: ChannelIndex,
		stop: &StopToken,
	) -> Result<DetectionResponse, EngineError> {
		if stop.is_stopped() {
			return Err(EngineError::Cancelled);
		}
		match self {
			Detector::Threshold(detector) => detector.forward(src, original, channel),
			Detector::Model(detector) => detector.forward(src, original, channel, stop),
		}
	}
}

impl std::fmt::Debug for Detector {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Detector::Threshold(_) => write!(f, "Detector::Threshold"),
			Detector::Model(_) => write!(f, "Detector::Model"),
		}
	}
}
